//! Time utilities for StoreFX.

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;

/// A timestamp (always UTC).
pub type Timestamp = DateTime<Utc>;

/// Get the current timestamp.
pub fn now() -> Timestamp {
    Utc::now()
}

/// Whole minutes from `now` until `then`, or `None` if `then` is not in the future.
pub fn whole_minutes_until(now: Timestamp, then: Timestamp) -> Option<i64> {
    if then <= now {
        return None;
    }
    Some((then - now).num_minutes())
}

/// Source of "now" for exchange table resolution and cache expiry.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        now()
    }
}

/// Manually driven clock for tests and simulations.
#[derive(Debug)]
pub struct FixedClock {
    instant: RwLock<Timestamp>,
}

impl FixedClock {
    /// Create a clock stopped at `instant`.
    pub fn new(instant: Timestamp) -> Self {
        Self {
            instant: RwLock::new(instant),
        }
    }

    /// Move the clock to `instant`.
    pub fn set(&self, instant: Timestamp) {
        *self.instant.write() = instant;
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut instant = self.instant.write();
        *instant = *instant + by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        *self.instant.read()
    }
}
