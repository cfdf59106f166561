use std::sync::atomic::{AtomicU64, Ordering};

use super::Timestamp;

/// Last value handed out by the process-wide logical clock.
static GLOBAL_TIME: AtomicU64 = AtomicU64::new(0);

/// The process-wide logical clock.
///
/// All objects of a process share a single counter, so timestamps taken from
/// different objects can be compared with one another.
#[derive(Copy, Clone, Debug, Default)]
pub struct LogicalClock;

impl LogicalClock {
    /// Returns a fresh timestamp, strictly greater than all timestamps
    /// previously returned by this clock.
    ///
    /// The clock saturates at the largest representable timestamp. Only local
    /// modifications advance it, so this bound is never reached in practice.
    pub fn tick() -> Timestamp {
        // Ordering: the counter carries no data besides itself, so relaxed
        // read-modify-write operations are enough to keep it unique and
        // increasing.
        let previous = GLOBAL_TIME
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |t| t.checked_add(1))
            .unwrap_or(u64::MAX);

        Timestamp::new(previous.saturating_add(1))
    }

    /// Returns the last timestamp handed out, without advancing the clock.
    pub fn now() -> Timestamp {
        Timestamp::new(GLOBAL_TIME.load(Ordering::Relaxed))
    }
}

/// The last modification time of an object.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct TimeStamp {
    time: Timestamp,
}

impl TimeStamp {
    /// Creates a time stamp that was never modified.
    pub const fn new() -> Self {
        Self {
            time: Timestamp::ZERO,
        }
    }

    /// Marks the object as modified now.
    pub fn modified(&mut self) -> Timestamp {
        self.time = LogicalClock::tick();

        self.time
    }

    /// Marks the object as modified now, with a time that is strictly greater
    /// than both the previous time of this stamp and `floor`.
    ///
    /// The process-wide clock is not raised to `floor`, so a remote value
    /// only affects this stamp. Returns `None`, leaving the stamp unchanged,
    /// if no such time can be represented.
    pub fn modified_after(&mut self, floor: Timestamp) -> Option<Timestamp> {
        let next = floor.max(self.time).as_u64().checked_add(1)?;
        self.time = LogicalClock::tick().max(Timestamp::new(next));

        Some(self.time)
    }

    /// Returns the last modification time.
    pub fn get(&self) -> Timestamp {
        self.time
    }
}
