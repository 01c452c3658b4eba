//! Time-Related Constants
//!
//! Cadences for the publish scheduler. All values in milliseconds.

// ===== TIME UNIT CONVERSIONS =====

/// Milliseconds per second.
pub const MS_PER_SECOND: u64 = 1000;

/// Milliseconds per minute.
pub const MS_PER_MINUTE: u64 = 60 * MS_PER_SECOND;

// ===== CADENCES =====

/// Sensor sampling interval.
pub const SENSOR_READ_INTERVAL_MS: u64 = 1000;

/// Telemetry publish interval.
pub const PUBLISH_INTERVAL_MS: u64 = 5000;

/// Heartbeat interval.
pub const HEARTBEAT_INTERVAL_MS: u64 = 30_000;

// ===== NETWORK =====

/// Delay between reconnect attempts.
pub const RECONNECT_DELAY_MS: u64 = 10_000;

/// Upper bound for a single blocking network operation.
pub const NETWORK_TIMEOUT_MS: u64 = 30_000;

/// Degraded mode clears itself after this long. `None` in the config
/// disables the timer and leaves only the explicit reset.
pub const DEGRADED_RESET_MS: u64 = 10 * MS_PER_MINUTE;

// ===== WATCHDOG =====

/// Loop must complete a sampling cycle within this window.
pub const WATCHDOG_TIMEOUT_MS: u64 = MS_PER_MINUTE;
