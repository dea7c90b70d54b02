//! Clock / TTL authority.
//!
//! Every phase transition is time-gated against a [`Clock`]. Production
//! code uses [`SystemClock`]; tests and simulations drive a [`ManualClock`].

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::RwLock;

use crate::{Result, RfqError};

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for tests and replay.
#[derive(Debug)]
pub struct ManualClock {
    now: RwLock<DateTime<Utc>>,
}

impl ManualClock {
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(start),
        }
    }

    /// Start at the current wall-clock time.
    #[must_use]
    pub fn starting_now() -> Self {
        Self::new(Utc::now())
    }

    /// Set the current time.
    pub fn set(&self, time: DateTime<Utc>) {
        *self.now.write() = time;
    }

    /// Advance time. Saturates at the maximum representable instant.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.write();
        *now = add_ttl(*now, by).unwrap_or(DateTime::<Utc>::MAX_UTC);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read()
    }
}

/// `start + ttl`, failing instead of panicking on overflow.
pub fn add_ttl(start: DateTime<Utc>, ttl: Duration) -> Result<DateTime<Utc>> {
    TimeDelta::from_std(ttl)
        .ok()
        .and_then(|delta| start.checked_add_signed(delta))
        .ok_or(RfqError::ArithmeticOverflow)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances() {
        let start = Utc::now();
        let clock = ManualClock::new(start);
        assert_eq!(clock.now(), start);

        clock.advance(Duration::from_secs(61));
        assert_eq!(clock.now(), start + TimeDelta::seconds(61));
    }

    #[test]
    fn manual_clock_set() {
        let clock = ManualClock::starting_now();
        let target = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap();
        clock.set(target);
        assert_eq!(clock.now(), target);
    }

    #[test]
    fn add_ttl_overflow_is_an_error() {
        let err = add_ttl(DateTime::<Utc>::MAX_UTC, Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, RfqError::ArithmeticOverflow));
    }

    #[test]
    fn system_clock_is_monotonic_enough() {
        let a = SystemClock.now();
        let b = SystemClock.now();
        assert!(b >= a);
    }
}
