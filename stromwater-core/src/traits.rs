//! Collaborator interfaces
//!
//! The core never touches hardware or the network directly. The main loop
//! hands the scheduler three collaborators:
//! - [`SensorSource`]: ADC reads
//! - [`Transport`]: broker connection and publish
//! - [`PumpActuator`]: pump relays
//!
//! Keep them thin; policy (retry, filtering, alerting) lives in the core.

use core::fmt;

use crate::config::ChannelConfig;
use crate::pump::PumpId;

/// Why a sensor read failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorFault {
    /// Short description, e.g. "adc timeout"
    pub reason: &'static str,
}

/// Why a transport operation failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// No connection to the broker
    NotConnected,
    /// Operation exceeded the network timeout
    Timeout,
    /// Broker refused the connection or publish
    Refused,
    /// Anything else reported by the client
    Io,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TransportError::NotConnected => "not connected",
            TransportError::Timeout => "network timeout",
            TransportError::Refused => "refused by broker",
            TransportError::Io => "transport I/O error",
        })
    }
}

#[cfg(feature = "std")]
impl std::error::Error for TransportError {}

/// Why a pump relay could not be switched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActuatorError {
    /// Short description, e.g. "gpio write failed"
    pub reason: &'static str,
}

/// Source of raw ADC counts
pub trait SensorSource {
    /// Read one channel
    fn read_raw(&mut self, channel: &ChannelConfig) -> Result<u16, SensorFault>;
}

/// Publish transport owned by the scheduler
///
/// Implementations bound every blocking call by the configured network
/// timeout.
pub trait Transport {
    /// Open the broker connection
    fn connect(&mut self) -> Result<(), TransportError>;

    /// Whether the connection is believed to be up
    fn is_connected(&self) -> bool;

    /// Publish `payload` on `topic`
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), TransportError>;

    /// Close the connection
    fn disconnect(&mut self);
}

/// Pump relay driver
pub trait PumpActuator {
    /// Switch one pump
    fn set_pump_state(&mut self, pump: PumpId, on: bool) -> Result<(), ActuatorError>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn connect(&mut self) -> Result<(), TransportError> {
        (**self).connect()
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), TransportError> {
        (**self).publish(topic, payload)
    }

    fn disconnect(&mut self) {
        (**self).disconnect()
    }
}

impl<S: SensorSource + ?Sized> SensorSource for &mut S {
    fn read_raw(&mut self, channel: &ChannelConfig) -> Result<u16, SensorFault> {
        (**self).read_raw(channel)
    }
}

impl<P: PumpActuator + ?Sized> PumpActuator for &mut P {
    fn set_pump_state(&mut self, pump: PumpId, on: bool) -> Result<(), ActuatorError> {
        (**self).set_pump_state(pump, on)
    }
}
