use std::mem;

use bitvec::order::Lsb0;
use bitvec::vec::BitVec;
use serde::{Deserialize, Serialize};

/// A fixed-length set of flags, all initially clear.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BitSet {
    bits: BitVec<u64, Lsb0>,
}

impl BitSet {
    pub fn new(len: usize) -> Self {
        BitSet {
            bits: BitVec::repeat(false, len),
        }
    }

    #[inline]
    pub fn get(&self, index: usize) -> bool {
        self.bits[index]
    }

    #[inline]
    pub fn set(&mut self, index: usize) {
        self.bits.set(index, true);
    }

    /// Sets the bit at `index` and returns its previous value.
    #[inline]
    pub fn set_n_get(&mut self, index: usize) -> bool {
        self.bits.replace(index, true)
    }

    pub fn clear(&mut self) {
        self.bits.fill(false);
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    /// Bytes held by the backing words.
    pub fn memory_usage(&self) -> usize {
        self.bits.as_raw_slice().len() * mem::size_of::<u64>()
    }

    /// Bytes a set of `len` flags commits.
    pub fn memory_for(len: usize) -> usize {
        (len + 63) / 64 * mem::size_of::<u64>()
    }
}
