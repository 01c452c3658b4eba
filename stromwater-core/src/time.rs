//! Time sources for the scheduling loop
//!
//! The scheduler itself only ever sees a [`Timestamp`] passed to `tick`;
//! these sources are what the main loop reads that timestamp from.
//! - Monotonic clock (milliseconds since boot)
//! - Mock clock (tests and simulations)

use core::cell::Cell;

/// Timestamp in milliseconds since device boot
pub type Timestamp = u64;

/// Source of time for the main loop
pub trait TimeSource {
    /// Get current timestamp in milliseconds
    fn now(&self) -> Timestamp;

    /// Check if this source provides wall clock time (vs monotonic)
    fn is_wall_clock(&self) -> bool;
}

/// Monotonic clock anchored at construction (requires std)
#[cfg(feature = "std")]
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    start: std::time::Instant,
}

#[cfg(feature = "std")]
impl MonotonicClock {
    /// Start counting from now
    pub fn new() -> Self {
        Self { start: std::time::Instant::now() }
    }
}

#[cfg(feature = "std")]
impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "std")]
impl TimeSource for MonotonicClock {
    fn now(&self) -> Timestamp {
        self.start.elapsed().as_millis() as Timestamp
    }

    fn is_wall_clock(&self) -> bool {
        false
    }
}

/// Manually advanced clock for tests
///
/// Interior mutability lets a test hold `&MockTimeSource` while the code
/// under test reads it.
#[derive(Debug, Default)]
pub struct MockTimeSource {
    now: Cell<Timestamp>,
}

impl MockTimeSource {
    /// Create at a fixed start time
    pub fn new(start: Timestamp) -> Self {
        Self { now: Cell::new(start) }
    }

    /// Jump to an absolute time
    pub fn set(&self, timestamp: Timestamp) {
        self.now.set(timestamp);
    }

    /// Move forward by `ms`
    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get().saturating_add(ms));
    }
}

impl TimeSource for MockTimeSource {
    fn now(&self) -> Timestamp {
        self.now.get()
    }

    fn is_wall_clock(&self) -> bool {
        false
    }
}

/// Cadence tracker for one periodic action
///
/// Fires on the first poll, then every `interval_ms`. A late poll does not
/// cause a burst of catch-up firings.
#[derive(Debug, Clone, Copy)]
pub struct Interval {
    interval_ms: u64,
    last: Option<Timestamp>,
}

impl Interval {
    /// New interval that is immediately due
    pub const fn new(interval_ms: u64) -> Self {
        Self { interval_ms, last: None }
    }

    /// True (and re-armed) when the interval has elapsed
    pub fn poll(&mut self, now: Timestamp) -> bool {
        if self.is_due(now) {
            self.last = Some(now);
            true
        } else {
            false
        }
    }

    /// Check without re-arming
    pub fn is_due(&self, now: Timestamp) -> bool {
        match self.last {
            None => true,
            Some(last) => now.saturating_sub(last) >= self.interval_ms,
        }
    }

    /// Re-arm from `now` without firing
    pub fn restart(&mut self, now: Timestamp) {
        self.last = Some(now);
    }

    /// Make the next poll fire
    pub fn reset(&mut self) {
        self.last = None;
    }
}
