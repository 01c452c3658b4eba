//! Host-side connectors for StromWater nodes
//!
//! ## Overview
//!
//! The core crate only knows the narrow [`Transport`], [`SensorSource`] and
//! [`PumpActuator`] interfaces. This crate provides the implementations a
//! host build needs:
//!
//! - [`mqtt::MqttTransport`]: broker connection over `rumqttc`, with every
//!   blocking wait bounded by the configured network timeout
//! - [`sim::SimulatedStation`]: a sump, three-phase supply and two pumps
//!   simulated in software, for bench runs without hardware
//!
//! ## MQTT
//!
//! One persistent connection per node. Telemetry goes to
//! `devices/<id>/data`, heartbeats to `devices/<id>/status`, and the broker
//! publishes a retained `offline` status as last will when the link dies.
//!
//! | QoS | Publish returns after       |
//! |-----|-----------------------------|
//! | 0   | packet written to socket    |
//! | 1   | PUBACK                      |
//! | 2   | PUBCOMP                     |
//!
//! ## Example Usage
//!
//! ```no_run
//! use stromwater_connectors::mqtt::MqttTransport;
//! use stromwater_core::{traits::Transport, DeviceConfig};
//!
//! let config = DeviceConfig::default();
//! let mut mqtt = MqttTransport::from_config(&config)?;
//! mqtt.connect()?;
//! mqtt.publish(&config.data_topic(), br#"{"device_id":"StromWater_Device_1"}"#)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! [`Transport`]: stromwater_core::traits::Transport
//! [`SensorSource`]: stromwater_core::traits::SensorSource
//! [`PumpActuator`]: stromwater_core::traits::PumpActuator

#[cfg(feature = "mqtt")]
pub mod mqtt;

pub mod sim;

// Re-export common types
#[cfg(feature = "mqtt")]
pub use mqtt::MqttTransport;
pub use sim::SimulatedStation;

use stromwater_core::traits::TransportError;
use thiserror::Error;

/// Common connector errors
#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("Not connected")]
    NotConnected,

    #[error("Timed out after {0} ms")]
    Timeout(u64),

    #[error("Broker refused connection: {0}")]
    Refused(String),

    #[error("Protocol error: {0}")]
    ProtocolError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<&ConnectorError> for TransportError {
    fn from(err: &ConnectorError) -> Self {
        match err {
            ConnectorError::NotConnected => TransportError::NotConnected,
            ConnectorError::Timeout(_) => TransportError::Timeout,
            ConnectorError::Refused(_) => TransportError::Refused,
            ConnectorError::ProtocolError(_) | ConnectorError::ConfigError(_) => TransportError::Io,
        }
    }
}

/// Connection statistics common to all connectors
#[derive(Debug, Default, Clone)]
pub struct ConnectionStats {
    /// Total messages sent successfully
    pub messages_sent: u64,
    /// Total messages failed to send
    pub messages_failed: u64,
    /// Total bytes sent
    pub bytes_sent: u64,
    /// Number of successful connects
    pub connections: u32,
    /// Last error message
    pub last_error: Option<String>,
}

impl ConnectionStats {
    pub(crate) fn record_sent(&mut self, bytes: usize) {
        self.messages_sent += 1;
        self.bytes_sent += bytes as u64;
    }

    pub(crate) fn record_failure(&mut self, err: &ConnectorError) {
        self.messages_failed += 1;
        self.last_error = Some(err.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_map_to_transport_errors() {
        assert_eq!(TransportError::from(&ConnectorError::Timeout(30_000)), TransportError::Timeout);
        assert_eq!(
            TransportError::from(&ConnectorError::Refused("bad credentials".into())),
            TransportError::Refused
        );
        assert_eq!(
            TransportError::from(&ConnectorError::ProtocolError("eof".into())),
            TransportError::Io
        );
    }

    #[test]
    fn stats_keep_last_error() {
        let mut stats = ConnectionStats::default();
        stats.record_sent(120);
        stats.record_failure(&ConnectorError::NotConnected);

        assert_eq!(stats.messages_sent, 1);
        assert_eq!(stats.bytes_sent, 120);
        assert_eq!(stats.messages_failed, 1);
        assert_eq!(stats.last_error.as_deref(), Some("Not connected"));
    }
}
