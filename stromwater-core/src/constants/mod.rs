//! Constants for the StromWater telemetry core
//!
//! Default values for a station as it ships. A deployment overrides them
//! through [`DeviceConfig`](crate::config::DeviceConfig); nothing in the
//! crate reads these directly outside of `Default` impls.
//!
//! ## Organization
//!
//! - **Network**: broker, identity and retry budget
//! - **Calibration**: ADC front end and per-channel conversion windows
//! - **Thresholds**: alert limits and filter deltas
//! - **Time**: cadences and timeouts
//! - **Buffers**: fixed capacities for `heapless` storage

/// Broker address, device identity and reconnect limits.
pub mod network;

/// ADC parameters and sensor calibration windows.
pub mod calibration;

/// Alert thresholds and outlier filter limits.
pub mod thresholds;

/// Sampling, publish, heartbeat and watchdog intervals.
pub mod time;

/// Fixed capacities for per-channel and per-cycle storage.
pub mod buffers;

pub use network::{MQTT_BROKER, MQTT_PORT, DEVICE_ID, MAX_RECONNECT_ATTEMPTS};

pub use calibration::{ADC_RESOLUTION_BITS, ADC_REFERENCE_VOLTAGE};

pub use time::{
    PUBLISH_INTERVAL_MS, SENSOR_READ_INTERVAL_MS, HEARTBEAT_INTERVAL_MS,
    RECONNECT_DELAY_MS, WATCHDOG_TIMEOUT_MS,
};

pub use buffers::{MAX_CHANNELS, MAX_FILTER_WINDOW, MAX_PENDING_ALERTS};
