use std::collections::hash_map::RandomState;
use std::collections::{HashMap, HashSet};
use std::hash::{BuildHasher, Hasher};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaChaRng;

use onoffsketch::{OnOff, OnOffError};

#[derive(Debug, PartialEq)]
struct PassThroughHasher(u64);

impl Hasher for PassThroughHasher {
    #[inline]
    fn finish(&self) -> u64 {
        self.0
    }

    #[inline]
    fn write(&mut self, _: &[u8]) {}

    #[inline]
    fn write_u64(&mut self, i: u64) {
        self.0 = i;
    }
}

#[derive(Debug, PartialEq, Eq)]
struct PassThroughHasherBuilder;

impl BuildHasher for PassThroughHasherBuilder {
    type Hasher = PassThroughHasher;

    fn build_hasher(&self) -> Self::Hasher {
        PassThroughHasher(0)
    }
}

#[test]
fn test_memory_budget() {
    let oo: OnOff<u64, u32, RandomState, 8> =
        OnOff::new(1 << 16, RandomState::new()).unwrap();

    assert!(oo.buckets() > 0);
    assert!(oo.memory_usage() <= 1 << 16);

    let oo: Result<OnOff<u64, u32, RandomState, 8>, OnOffError> =
        OnOff::new(16, RandomState::new());

    assert_eq!(oo.err(), Some(OnOffError::InvalidMemory));
    assert_eq!(
        OnOffError::InvalidMemory.to_string(),
        "memory budget too small for a single bucket."
    );
}

#[test]
fn test_touches_within_window_count_once() {
    let mut rng = ChaChaRng::seed_from_u64(42);

    let mut oo: OnOff<u64, u32, RandomState, 4> =
        OnOff::new(1 << 12, RandomState::new()).unwrap();

    let items: Vec<u64> = (0..500).collect();

    for _ in 0..20 {
        let before: HashMap<u64, u32> =
            items.iter().map(|item| (*item, oo.query(item))).collect();

        for _ in 0..5000 {
            oo.insert(&items[rng.gen_range(0usize, items.len())]);
        }

        // Newly admitted items inherit a counter, tracked ones move by one.
        for item in items.iter().filter(|item| before[*item] > 0) {
            assert!(oo.query(item) <= before[item] + 1);
        }

        oo.new_window();
    }
}

#[test]
fn test_unseen_items_query_zero() {
    let mut rng = ChaChaRng::seed_from_u64(3);

    let mut oo: OnOff<u64, u32, RandomState, 4> =
        OnOff::new(1 << 12, RandomState::new()).unwrap();

    for _ in 0..30 {
        for _ in 0..1000 {
            oo.insert(&rng.gen_range(0u64, 10_000u64));
        }
        oo.new_window();
    }

    assert!((10_000..20_000u64).all(|item| oo.query(&item) == 0));

    let tracked: HashSet<u64> = oo.iter().map(|(item, _)| *item).collect();

    assert_eq!(tracked.len(), oo.iter().count());

    assert!((0..10_000u64)
        .filter(|item| !tracked.contains(item))
        .all(|item| oo.query(&item) == 0));
}

#[test]
fn test_exact_without_collisions() {
    let mut oo: OnOff<u64, u32, PassThroughHasherBuilder, 4> =
        OnOff::with_buckets(64, PassThroughHasherBuilder {}).unwrap();

    let mut windows = vec![0u32; 64];

    for window in 0..40 {
        for item in 0..64u64 {
            if window % (item % 5 + 1) == 0 {
                oo.insert(&item);
                oo.insert(&item);

                windows[item as usize] += 1;
            }
        }
        oo.new_window();
    }

    for item in 0..64u64 {
        assert_eq!(oo.query(&item), windows[item as usize]);
    }
}

#[test]
fn test_persistent_items_survive_noise() {
    let mut rng = ChaChaRng::seed_from_u64(11);

    let mut oo: OnOff<u64, u32, PassThroughHasherBuilder, 4> =
        OnOff::with_buckets(16, PassThroughHasherBuilder {}).unwrap();

    for _ in 0..40 {
        for item in 0..16u64 {
            oo.insert(&item);
        }

        for _ in 0..20 {
            oo.insert(&rng.gen_range(1_000u64, 1_000_000u64));
        }

        oo.new_window();
    }

    for item in 0..16u64 {
        assert_eq!(oo.query(&item), 40);
    }

    let mut persistent: Vec<u64> =
        oo.persistent(40).map(|(item, _)| *item).collect();

    persistent.sort();

    assert_eq!(persistent, (0..16).collect::<Vec<u64>>());
}
