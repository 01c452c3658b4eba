//! Software watchdog for the main loop
//!
//! Fed once per completed sample cycle. If the loop stops completing
//! cycles, [`Watchdog::check`] reports [`TelemetryError::WatchdogExpired`]
//! and the caller restarts the device.

use crate::errors::{TelemetryError, TelemetryResult};
use crate::time::Timestamp;

/// Deadline timer
#[derive(Debug, Clone, Copy)]
pub struct Watchdog {
    timeout_ms: u64,
    last_fed: Timestamp,
}

impl Watchdog {
    /// Armed watchdog, first deadline `timeout_ms` after `now`
    pub const fn new(timeout_ms: u64, now: Timestamp) -> Self {
        Self { timeout_ms, last_fed: now }
    }

    /// Push the deadline out
    pub fn feed(&mut self, now: Timestamp) {
        self.last_fed = now;
    }

    /// Fails once `timeout_ms` has passed since the last feed
    pub fn check(&self, now: Timestamp) -> TelemetryResult<()> {
        if now.saturating_sub(self.last_fed) > self.timeout_ms {
            return Err(TelemetryError::WatchdogExpired { last_fed: self.last_fed, now });
        }
        Ok(())
    }

    /// Milliseconds left before expiry
    pub fn remaining(&self, now: Timestamp) -> u64 {
        self.deadline().saturating_sub(now)
    }

    /// Time of expiry
    pub fn deadline(&self) -> Timestamp {
        self.last_fed.saturating_add(self.timeout_ms)
    }

    /// Time of the last feed
    pub fn last_fed(&self) -> Timestamp {
        self.last_fed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expires_after_timeout() {
        let dog = Watchdog::new(1_000, 0);
        assert!(dog.check(1_000).is_ok());
        assert_eq!(
            dog.check(1_001),
            Err(TelemetryError::WatchdogExpired { last_fed: 0, now: 1_001 })
        );
    }

    #[test]
    fn feeding_moves_deadline() {
        let mut dog = Watchdog::new(1_000, 0);
        dog.feed(900);
        assert!(dog.check(1_800).is_ok());
        assert_eq!(dog.remaining(1_400), 500);
        assert_eq!(dog.remaining(5_000), 0);
    }
}
