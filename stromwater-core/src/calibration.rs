//! Raw ADC counts to physical units
//!
//! Conversion is linear per channel:
//!
//! ```text
//! pin volts    = raw / adc_max * reference
//! sensor volts = pin volts * divider          (clamped to [min_voltage, max_voltage])
//! physical     = min_physical + (sensor volts - min_voltage) * scale
//!                                              (clamped to [min_physical, max_physical])
//! ```
//!
//! `scale` is either supplied by the channel (voltage and current
//! transducers have a datasheet factor) or derived from the two windows.
//! Out-of-range input is clamped and flagged, never rejected, so the filter
//! always receives a defined value.

use crate::channel::ChannelId;
use crate::config::{AdcConfig, ChannelConfig};
use crate::errors::TelemetryError;
use crate::time::Timestamp;

/// Raw ADC reading for one channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawSample {
    /// Source channel
    pub channel: ChannelId,
    /// ADC counts
    pub raw: u16,
    /// Time of the read
    pub timestamp: Timestamp,
}

/// Reading converted to physical units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibratedSample {
    /// Source channel
    pub channel: ChannelId,
    /// Value in the channel's unit
    pub value: f32,
    /// Time of the read
    pub timestamp: Timestamp,
    /// Input fell outside the calibration window and was clamped
    pub out_of_range: bool,
}

/// Linear raw-to-physical mapper for one ADC front end
#[derive(Debug, Clone, Copy)]
pub struct CalibrationMapper {
    max_raw: f32,
    reference_voltage: f32,
}

impl CalibrationMapper {
    /// Mapper for the given ADC
    pub fn new(adc: &AdcConfig) -> Self {
        Self {
            max_raw: adc.max_raw() as f32,
            reference_voltage: adc.reference_voltage,
        }
    }

    /// Sensor-side voltage for a raw count, before clamping
    pub fn sensor_volts(&self, channel: &ChannelConfig, raw: u16) -> f32 {
        raw as f32 / self.max_raw * self.reference_voltage * channel.divider
    }

    /// Convert a raw count to the channel's physical unit
    pub fn to_physical(&self, channel: &ChannelConfig, raw: u16) -> (f32, bool) {
        let volts = self.sensor_volts(channel, raw);
        let mut out_of_range = raw as f32 > self.max_raw;

        let clamped = if volts < channel.min_voltage || volts > channel.max_voltage {
            out_of_range = true;
            volts.clamp(channel.min_voltage, channel.max_voltage)
        } else {
            volts
        };

        if out_of_range {
            log_warn!(
                "{}",
                TelemetryError::SensorOutOfRange {
                    channel: channel.id,
                    volts,
                    min: channel.min_voltage,
                    max: channel.max_voltage,
                }
            );
        }

        let physical = channel.min_physical
            + (clamped - channel.min_voltage) * channel.effective_scale();

        (physical.clamp(channel.min_physical, channel.max_physical), out_of_range)
    }

    /// Calibrate a raw sample
    pub fn calibrate(&self, channel: &ChannelConfig, sample: &RawSample) -> CalibratedSample {
        let (value, out_of_range) = self.to_physical(channel, sample.raw);
        CalibratedSample {
            channel: sample.channel,
            value,
            timestamp: sample.timestamp,
            out_of_range,
        }
    }
}
