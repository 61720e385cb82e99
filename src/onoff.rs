use std::convert::TryFrom;
use std::hash::{BuildHasher, Hash, Hasher};
use std::mem;

use num_traits::ops::saturating::SaturatingAdd;
use num_traits::{CheckedAdd, Unsigned};
use serde::{Deserialize, Serialize};

use crate::bitset::BitSet;
use crate::OnOffError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Slot<K, C> {
    item:    Option<K>,
    counter: C,
}

/// An On-Off sketch with `SLOTS` slots per bucket.
///
/// Every bucket keeps up to `SLOTS` items with their persistence counters
/// and a threshold. A new item may only take over a slot whose counter equals
/// the threshold, inheriting that counter, so reported values overestimate an
/// item's persistence by at most the threshold at the time it was admitted.
/// Each bucket performs at most one replacement or threshold escalation per
/// window.
///
/// Windows are delimited by calling [`OnOff::new_window`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(
    try_from = "RawOnOff<K, C, S>",
    bound(
        deserialize = "K: Deserialize<'de>, C: Deserialize<'de>, S: Deserialize<'de>"
    )
)]
pub struct OnOff<K, C, S, const SLOTS: usize>
where
    K: Hash + Eq,
    C: Copy + PartialOrd + Unsigned + SaturatingAdd,
    S: BuildHasher,
{
    length:     usize,
    slots:      Vec<Slot<K, C>>,
    thresholds: Vec<C>,
    touched:    BitSet,
    escalated:  BitSet,
    builder:    S,
}

/// Serialized form of [`OnOff`], checked against `SLOTS` before use.
#[derive(Deserialize)]
pub struct RawOnOff<K, C, S> {
    length:     usize,
    slots:      Vec<Slot<K, C>>,
    thresholds: Vec<C>,
    touched:    BitSet,
    escalated:  BitSet,
    builder:    S,
}

impl<K, C, S, const SLOTS: usize> TryFrom<RawOnOff<K, C, S>>
    for OnOff<K, C, S, SLOTS>
where
    K: Hash + Eq,
    C: Copy + PartialOrd + Unsigned + SaturatingAdd,
    S: BuildHasher,
{
    type Error = OnOffError;

    fn try_from(raw: RawOnOff<K, C, S>) -> Result<Self, OnOffError> {
        let capacity = match raw.length.checked_mul(SLOTS) {
            Some(capacity) if capacity > 0 => capacity,
            _ => return Err(OnOffError::InvalidDimensions),
        };

        if raw.slots.len() != capacity
            || raw.thresholds.len() != raw.length
            || raw.touched.len() != capacity
            || raw.escalated.len() != raw.length
        {
            return Err(OnOffError::InvalidDimensions);
        }

        Ok(OnOff {
            length:     raw.length,
            slots:      raw.slots,
            thresholds: raw.thresholds,
            touched:    raw.touched,
            escalated:  raw.escalated,
            builder:    raw.builder,
        })
    }
}

impl<K, C, S, const SLOTS: usize> OnOff<K, C, S, SLOTS>
where
    K: Hash + Eq,
    C: Copy + PartialOrd + Unsigned + SaturatingAdd,
    S: BuildHasher,
{
    /// Creates a sketch with as many buckets as fit in `memory` bytes.
    ///
    /// A bucket costs its slots, its threshold and one flag bit per slot plus
    /// one for the threshold. Flag bits are committed in whole words, so the
    /// result never uses more than `memory` bytes.
    pub fn new(memory: usize, builder: S) -> Result<Self, OnOffError> {
        if SLOTS < 1 {
            return Err(OnOffError::InvalidDimensions);
        }

        let bucket = (mem::size_of::<Slot<K, C>>() * SLOTS
            + mem::size_of::<C>()) as f64
            + (SLOTS + 1) as f64 / 8.0;

        let mut length = (memory as f64 / bucket) as usize;

        while length > 0 && Self::footprint(length) > memory {
            length -= 1;
        }

        if length < 1 {
            return Err(OnOffError::InvalidMemory);
        }

        Self::with_buckets(length, builder)
    }

    pub fn with_buckets(length: usize, builder: S) -> Result<Self, OnOffError> {
        let capacity = match length.checked_mul(SLOTS) {
            Some(capacity) if capacity > 0 => capacity,
            _ => return Err(OnOffError::InvalidDimensions),
        };

        let sketch = OnOff {
            length:     length,
            slots:      (0..capacity)
                .map(|_| Slot {
                    item:    None,
                    counter: C::zero(),
                })
                .collect(),
            thresholds: vec![C::zero(); length],
            touched:    BitSet::new(capacity),
            escalated:  BitSet::new(length),
            builder:    builder,
        };

        tracing::debug!(
            buckets = length,
            slots = SLOTS,
            memory = sketch.memory_usage(),
            "created on-off sketch"
        );

        Ok(sketch)
    }

    /// Records an occurrence of `item` in the current window.
    ///
    /// Counters saturate at the maximum value of `C`.
    pub fn insert(&mut self, item: &K)
    where
        K: Clone,
    {
        let pos = self.position(item);

        if let Some(index) = self.find(pos, item) {
            if !self.touched.set_n_get(index) {
                let slot = &mut self.slots[index];

                slot.counter = slot.counter.saturating_add(&C::one());
            }
            return;
        }

        if self.escalated.get(pos) {
            return;
        }

        match self.candidate(pos) {
            Some(index) => {
                let counter =
                    self.slots[index].counter.saturating_add(&C::one());

                self.replace(pos, index, item, counter);
            },
            None => {
                self.thresholds[pos] =
                    self.thresholds[pos].saturating_add(&C::one());

                self.escalated.set(pos);
            },
        }
    }

    pub fn query(&self, item: &K) -> C {
        let pos = self.position(item);

        self.find(pos, item)
            .map(|index| self.slots[index].counter)
            .unwrap_or_else(C::zero)
    }

    /// Starts a new window. Counters, items and thresholds are kept.
    pub fn new_window(&mut self) {
        self.touched.clear();
        self.escalated.clear();

        tracing::trace!(buckets = self.length, "started new window");
    }

    /// Iterates over the tracked items and their counters.
    pub fn iter(&self) -> impl Iterator<Item = (&K, C)> + '_ {
        self.slots
            .iter()
            .filter_map(|slot| slot.item.as_ref().map(|i| (i, slot.counter)))
    }

    /// Iterates over the tracked items seen in at least `min` windows.
    pub fn persistent(&self, min: C) -> impl Iterator<Item = (&K, C)> + '_ {
        self.iter().filter(move |(_, counter)| *counter >= min)
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(|slot| slot.item.is_none())
    }

    pub fn buckets(&self) -> usize {
        self.length
    }

    pub fn slots(&self) -> usize {
        SLOTS
    }

    /// Bytes committed by the slots, the thresholds and both flag arrays.
    pub fn memory_usage(&self) -> usize {
        self.slots.len() * mem::size_of::<Slot<K, C>>()
            + self.thresholds.len() * mem::size_of::<C>()
            + self.touched.memory_usage()
            + self.escalated.memory_usage()
    }

    fn footprint(length: usize) -> usize {
        length * SLOTS * mem::size_of::<Slot<K, C>>()
            + length * mem::size_of::<C>()
            + BitSet::memory_for(length * SLOTS)
            + BitSet::memory_for(length)
    }

    #[inline]
    fn position(&self, item: &K) -> usize {
        let mut hasher = self.builder.build_hasher();

        item.hash(&mut hasher);

        (hasher.finish() % self.length as u64) as usize
    }

    fn find(&self, pos: usize, item: &K) -> Option<usize> {
        let base = pos * SLOTS;

        self.slots[base..base + SLOTS]
            .iter()
            .position(|slot| slot.item.as_ref() == Some(item))
            .map(|i| base + i)
    }

    // First slot of the bucket whose counter sits at the threshold.
    fn candidate(&self, pos: usize) -> Option<usize> {
        let base = pos * SLOTS;
        let threshold = self.thresholds[pos];

        self.slots[base..base + SLOTS]
            .iter()
            .position(|slot| slot.counter == threshold)
            .map(|i| base + i)
    }

    fn replace(&mut self, pos: usize, index: usize, item: &K, counter: C)
    where
        K: Clone,
    {
        let slot = &mut self.slots[index];

        slot.item = Some(item.clone());
        slot.counter = counter;

        self.touched.set(index);
        self.escalated.set(pos);
    }
}

impl<K, C, S, const SLOTS: usize> OnOff<K, C, S, SLOTS>
where
    K: Hash + Eq,
    C: Copy + PartialOrd + Unsigned + SaturatingAdd + CheckedAdd,
    S: BuildHasher,
{
    /// Same as [`OnOff::insert`] but fails instead of saturating. The sketch
    /// is left unchanged on overflow.
    pub fn insert_checked(&mut self, item: &K) -> Result<(), OnOffError>
    where
        K: Clone,
    {
        let pos = self.position(item);

        if let Some(index) = self.find(pos, item) {
            if !self.touched.get(index) {
                let counter = self.slots[index]
                    .counter
                    .checked_add(&C::one())
                    .ok_or(OnOffError::CounterOverflow)?;

                self.slots[index].counter = counter;
                self.touched.set(index);
            }
            return Ok(());
        }

        if self.escalated.get(pos) {
            return Ok(());
        }

        match self.candidate(pos) {
            Some(index) => {
                let counter = self.slots[index]
                    .counter
                    .checked_add(&C::one())
                    .ok_or(OnOffError::CounterOverflow)?;

                self.replace(pos, index, item, counter);
            },
            None => {
                self.thresholds[pos] = self.thresholds[pos]
                    .checked_add(&C::one())
                    .ok_or(OnOffError::CounterOverflow)?;

                self.escalated.set(pos);
            },
        }

        Ok(())
    }
}

impl<K, C, S, const SLOTS: usize> Drop for OnOff<K, C, S, SLOTS>
where
    K: Hash + Eq,
    C: Copy + PartialOrd + Unsigned + SaturatingAdd,
    S: BuildHasher,
{
    fn drop(&mut self) {
        tracing::debug!(memory = self.memory_usage(), "dropped on-off sketch");
    }
}
