//! Implementations of the On-Off sketch data structure for finding
//! persistent items in data streams.
//!
//! An item's *persistence* is the number of distinct time windows it has
//! appeared in. On-Off estimates it within a fixed memory budget: each bucket
//! tracks a handful of items with Space-Saving style replacement, and per-slot
//! flags that are switched *on* at the first touch in a window and *off* at
//! the next window make repeated touches within one window count once.
//! Originally, it was proposed by Y. Zhang et al. in *On-Off Sketch: A Fast
//! and Accurate Sketch on Persistence.*
//!
//! Current implementations:
//!
//! * [`OnOff`]

use std::error;
use std::fmt::{self, Display};

mod bitset;
mod onoff;

pub use bitset::BitSet;
pub use onoff::OnOff;

#[derive(Debug, PartialEq)]
pub enum OnOffError {
    CounterOverflow,
    InvalidMemory,
    InvalidDimensions,
}

impl Display for OnOffError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OnOffError::CounterOverflow => "counter overflow.".fmt(f),
            OnOffError::InvalidMemory => {
                "memory budget too small for a single bucket.".fmt(f)
            },
            OnOffError::InvalidDimensions => "invalid dimensions.".fmt(f),
        }
    }
}

impl error::Error for OnOffError {}
