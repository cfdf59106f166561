//! Logical time.
//!
//! Staleness is never judged with the wall clock. Instead, every modification
//! of a pipeline object and every data transfer is stamped with a value drawn
//! from a process-wide [`LogicalClock`], which only ever moves forward.
//!
//! This module provides:
//!
//! * [`Timestamp`]: a logical timestamp,
//! * [`LogicalClock`]: the process-wide source of fresh timestamps,
//! * [`TimeStamp`]: a per-object record of its last modification time.
//!
//! # Examples
//!
//! ```
//! use pipeport::time::{Timestamp, TimeStamp};
//!
//! let mut stamp = TimeStamp::new();
//! assert_eq!(stamp.get(), Timestamp::ZERO);
//!
//! let time = stamp.modified_after(Timestamp::new(41)).unwrap();
//! assert!(time > Timestamp::new(41));
//! assert_eq!(stamp.get(), time);
//! ```

mod clock;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use clock::{LogicalClock, TimeStamp};

/// A logical timestamp.
///
/// Timestamps are totally ordered; a larger value denotes a later event.
/// [`Timestamp::ZERO`] is never returned by the [`LogicalClock`] and therefore
/// stands for "never modified".
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    /// The timestamp that predates all others.
    pub const ZERO: Self = Self(0);

    /// Size in bytes of the fixed-size wire representation.
    pub const ENCODED_LEN: usize = 8;

    /// Creates a timestamp from a raw value.
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw value.
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the fixed-size, big-endian wire representation.
    pub const fn to_be_bytes(self) -> [u8; Self::ENCODED_LEN] {
        self.0.to_be_bytes()
    }

    /// Decodes a timestamp from its fixed-size wire representation.
    pub const fn from_be_bytes(bytes: [u8; Self::ENCODED_LEN]) -> Self {
        Self(u64::from_be_bytes(bytes))
    }
}

impl From<u64> for Timestamp {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}
