//! Core telemetry engine for StromWater pump stations
//!
//! Turns raw ADC counts from the station's analog front end into calibrated,
//! filtered readings, raises edge-triggered alerts, drives the pumps when
//! automatic control is enabled and hands a telemetry record to a publish
//! transport on a fixed cadence.
//!
//! Key constraints:
//! - Single cooperative loop, no threads and no locks
//! - Fixed-capacity state per channel, no allocation in the sampling path
//! - Only a stalled loop (watchdog expiry) is fatal
//!
//! ```no_run
//! use stromwater_core::{DeviceConfig, PublishScheduler};
//! # use stromwater_core::traits::{Transport, SensorSource, PumpActuator};
//! # fn wire<T: Transport, S: SensorSource, P: PumpActuator>(t: T, s: S, p: P) {
//! let config = DeviceConfig::default();
//! let mut scheduler = PublishScheduler::new(&config, t, s, p);
//!
//! // Called from the main loop with a monotonic millisecond clock
//! if let Err(fatal) = scheduler.tick(1_000) {
//!     // Watchdog expired - restart the device
//! }
//! # }
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]
#![warn(missing_docs)]

extern crate alloc;

#[macro_use]
mod macros;

pub mod alert;
pub mod buffer;
pub mod calibration;
pub mod channel;
pub mod config;
pub mod constants;
pub mod errors;
pub mod filter;
pub mod pump;
pub mod scheduler;
pub mod telemetry;
pub mod time;
pub mod traits;
pub mod watchdog;

// Public API
pub use alert::{AlertEvaluator, AlertEvent, AlertLevel, PhaseImbalanceMonitor};
pub use calibration::{CalibratedSample, CalibrationMapper};
pub use channel::{ChannelId, ChannelKind};
pub use config::{ChannelConfig, DeviceConfig};
pub use errors::{TelemetryError, TelemetryResult};
pub use filter::{FilterOutcome, OutlierFilter};
pub use pump::{PumpController, PumpId, PumpStates};
pub use scheduler::{ConnectionState, PublishScheduler, SchedulerStats, TickReport};
pub use telemetry::{Heartbeat, Reading, TelemetryAssembler, TelemetryRecord};
pub use watchdog::Watchdog;

/// Crate version reported in heartbeats
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_exists() {
        assert!(!VERSION.is_empty());
    }
}
