//! Error Types for the Acquisition and Publish Loop
//!
//! ## Design Philosophy
//!
//! Errors are small, `Copy` and carry only inline data (`&'static str` for
//! reasons) so they can be returned from the sampling path and stored in
//! counters without allocation.
//!
//! ## Error Categories
//!
//! ### Absorbed locally
//! - `SensorOutOfRange`: reading clamped into the calibration window
//! - `FilterRejection`: spike discarded, previous output reused
//! - `SensorFault`: ADC read failed, channel reported as unavailable
//!
//! ### Retried
//! - `TransportDisconnected`: publish path lost its connection
//! - `ReconnectExhausted`: retry budget spent, node runs local-only
//!
//! ### Fatal
//! - `WatchdogExpired`: the main loop stopped completing cycles
//!
//! Only `WatchdogExpired` ever leaves [`PublishScheduler::tick`]; everything
//! else ends up as a data marker, an alert or a connection state change.
//!
//! ```rust
//! use stromwater_core::TelemetryError;
//!
//! fn on_tick_result(result: Result<(), TelemetryError>) {
//!     match result {
//!         Ok(()) => {}
//!         Err(TelemetryError::WatchdogExpired { .. }) => {
//!             // esp_restart();
//!         }
//!         Err(other) => {
//!             // Not expected from tick, log and continue
//!             let _ = other;
//!         }
//!     }
//! }
//! ```
//!
//! [`PublishScheduler::tick`]: crate::scheduler::PublishScheduler::tick

use thiserror_no_std::Error;

use crate::channel::ChannelId;
use crate::time::Timestamp;

/// Result type for telemetry operations
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Errors raised by the telemetry core
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum TelemetryError {
    /// Sensor voltage outside the calibration window; output was clamped
    #[error("Channel {channel}: {volts} V outside [{min}, {max}] V")]
    SensorOutOfRange {
        /// Channel that produced the reading
        channel: ChannelId,
        /// Sensor voltage before clamping
        volts: f32,
        /// Lower calibration bound
        min: f32,
        /// Upper calibration bound
        max: f32,
    },

    /// Reading jumped further than the channel allows in one sample
    #[error("Channel {channel}: change {delta} exceeds {max_change}")]
    FilterRejection {
        /// Channel that produced the spike
        channel: ChannelId,
        /// Absolute change from the last accepted value
        delta: f32,
        /// Configured per-sample limit
        max_change: f32,
    },

    /// Sensor could not be read at all
    #[error("Channel {channel}: sensor fault: {reason}")]
    SensorFault {
        /// Channel that failed
        channel: ChannelId,
        /// Short description from the sensor source
        reason: &'static str,
    },

    /// Publish transport is not connected
    #[error("Transport disconnected")]
    TransportDisconnected,

    /// Reconnect budget spent; publishing suspended
    #[error("Reconnect failed after {attempts} attempts")]
    ReconnectExhausted {
        /// Consecutive failed attempts
        attempts: u32,
    },

    /// Main loop did not complete a cycle within the watchdog timeout
    #[error("Watchdog expired: last fed at {last_fed} ms, now {now} ms")]
    WatchdogExpired {
        /// Time of the last successful cycle
        last_fed: Timestamp,
        /// Time the expiry was detected
        now: Timestamp,
    },

    /// Manual pump command while manual override is disabled
    #[error("Manual pump override disabled")]
    ManualOverrideDisabled,

    /// Pump relay could not be switched
    #[error("Pump actuator failed: {reason}")]
    ActuatorFault {
        /// Short description from the actuator
        reason: &'static str,
    },

    /// Telemetry record could not be serialized
    #[error("Payload encoding failed: {reason}")]
    PayloadEncoding {
        /// Encoder message
        reason: &'static str,
    },

    /// Configuration violates an invariant
    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        /// Which invariant failed
        reason: &'static str,
    },
}

impl TelemetryError {
    /// Whether the device must restart
    pub fn is_fatal(&self) -> bool {
        matches!(self, TelemetryError::WatchdogExpired { .. })
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for TelemetryError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::SensorOutOfRange { channel, volts, min, max } =>
                defmt::write!(fmt, "{}: {} V outside [{}, {}]", channel.as_str(), volts, min, max),
            Self::FilterRejection { channel, delta, max_change } =>
                defmt::write!(fmt, "{}: change {} > {}", channel.as_str(), delta, max_change),
            Self::SensorFault { channel, reason } =>
                defmt::write!(fmt, "{}: fault {}", channel.as_str(), reason),
            Self::TransportDisconnected =>
                defmt::write!(fmt, "Transport disconnected"),
            Self::ReconnectExhausted { attempts } =>
                defmt::write!(fmt, "Reconnect exhausted after {}", attempts),
            Self::WatchdogExpired { last_fed, now } =>
                defmt::write!(fmt, "Watchdog expired ({} -> {})", last_fed, now),
            Self::ManualOverrideDisabled =>
                defmt::write!(fmt, "Manual override disabled"),
            Self::ActuatorFault { reason } =>
                defmt::write!(fmt, "Actuator fault: {}", reason),
            Self::PayloadEncoding { reason } =>
                defmt::write!(fmt, "Encoding failed: {}", reason),
            Self::InvalidConfig { reason } =>
                defmt::write!(fmt, "Invalid config: {}", reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_watchdog_is_fatal() {
        let fatal = TelemetryError::WatchdogExpired { last_fed: 0, now: 60_001 };
        assert!(fatal.is_fatal());
        assert!(!TelemetryError::TransportDisconnected.is_fatal());
        assert!(!TelemetryError::ReconnectExhausted { attempts: 5 }.is_fatal());
    }

    #[test]
    fn error_stays_small() {
        assert!(core::mem::size_of::<TelemetryError>() <= 48);
    }
}
