//! Injectable clock port.
//!
//! `Payment` and `Subscription` mutators take `now: DateTime<Utc>` as an
//! explicit parameter rather than calling `Utc::now()` internally, so the
//! aggregates stay pure and trivially testable. Use cases and reconcilers
//! that need "the current time" as a collaborator (rather than a value
//! threaded in by their own caller) go through this port instead of calling
//! `Utc::now()` directly, so a whole reconciler sweep can be driven by one
//! fixed `now` in tests.

use chrono::{DateTime, Utc};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The real clock, backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A fixed clock for deterministic tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_always_returns_the_same_instant() {
        let now = Utc::now();
        let clock = FixedClock(now);
        assert_eq!(clock.now(), now);
        assert_eq!(clock.now(), now);
    }
}
