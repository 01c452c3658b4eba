//! Fixed Capacities
//!
//! Every per-channel and per-cycle collection is a `heapless` container
//! with one of these capacities, so RAM use is known at link time.

/// Configured channels per station.
///
/// The shipped layout uses 8 (level, 3x voltage, 3x current, temperature).
pub const MAX_CHANNELS: usize = 16;

/// Upper bound for the moving average window.
pub const MAX_FILTER_WINDOW: usize = 16;

/// Alerts held between two publishes. Oldest are dropped on overflow.
pub const MAX_PENDING_ALERTS: usize = 32;

/// Length of an inline channel identifier.
pub const MAX_CHANNEL_ID_LEN: usize = 15;

/// Current channels evaluated together for phase imbalance.
pub const PHASES: usize = 3;
