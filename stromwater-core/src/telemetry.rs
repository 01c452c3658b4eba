//! Telemetry record assembly and payload encoding
//!
//! ## Overview
//!
//! Each sample cycle the [`TelemetryAssembler`] folds the latest filtered
//! sample of every configured channel, the alerts raised since the last
//! publish, the pump states and the station identity into one
//! [`TelemetryRecord`]. The previous record is simply dropped.
//!
//! A record always carries exactly one reading per configured channel, in
//! configuration order. A channel whose last read failed (or that has not
//! been read yet) is reported as [`Reading::Unavailable`], never as a stale
//! or zero value.
//!
//! ## Wire format
//!
//! The record serializes to the flat JSON object the backend ingests:
//!
//! ```json
//! {
//!   "device_id": "StromWater_Device_1",
//!   "device_name": "Dubai Pump Station Alpha",
//!   "location": "Dubai Industrial Area Zone 1",
//!   "latitude": 25.2048,
//!   "longitude": 55.2708,
//!   "timestamp": 5000,
//!   "hydrostatic_value": 4.2,
//!   "vrms_1_r": 401.3,
//!   "irms_1_b": null,
//!   "pump_1_status": "ON",
//!   "pump_2_status": "OFF",
//!   "high_level_float_alert": 0,
//!   "dry_run_alert": 0,
//!   "active_alerts": { "vrms_1_r": "high" },
//!   "alerts": [ { "channel": "vrms_1_r", "previous": "normal", "level": "high", "severity": "warning", ... } ]
//! }
//! ```
//!
//! Field names come from the channel configuration, so the record borrows
//! the [`DeviceConfig`] instead of copying strings each cycle.

use alloc::vec::Vec as AllocVec;

use heapless::Vec;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

use crate::alert::{AlertEvaluator, AlertEvent, AlertLevel};
use crate::calibration::CalibratedSample;
use crate::channel::ChannelId;
use crate::config::{DeviceConfig, DeviceIdentity};
use crate::constants::buffers::{MAX_CHANNELS, MAX_PENDING_ALERTS};
use crate::errors::{TelemetryError, TelemetryResult};
use crate::pump::{PumpId, PumpStates};
use crate::time::Timestamp;

/// Value of one channel in a record
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reading {
    /// Filtered physical value
    Value(f32),
    /// Sensor read failed or no read has succeeded yet
    Unavailable,
}

impl Reading {
    /// The value, if available
    pub fn value(&self) -> Option<f32> {
        match self {
            Reading::Value(v) => Some(*v),
            Reading::Unavailable => None,
        }
    }

    /// Whether the reading is the unavailable marker
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Reading::Unavailable)
    }
}

impl Serialize for Reading {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Reading::Value(v) => serializer.serialize_f32(*v),
            Reading::Unavailable => serializer.serialize_none(),
        }
    }
}

/// One channel entry of a record
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelReading<'a> {
    /// Channel id
    pub channel: ChannelId,
    /// Payload field name
    pub field: &'a str,
    /// Value or unavailable marker
    pub reading: Reading,
    /// Current alert level of the channel
    pub level: AlertLevel,
    /// Value was clamped into the calibration window
    pub out_of_range: bool,
}

/// Snapshot of the station at one sample cycle
#[derive(Debug, Clone)]
pub struct TelemetryRecord<'a> {
    identity: &'a DeviceIdentity,
    timestamp: Timestamp,
    readings: Vec<ChannelReading<'a>, MAX_CHANNELS>,
    alerts: Vec<AlertEvent, MAX_PENDING_ALERTS>,
    pumps: PumpStates,
    high_level_float_alert: bool,
    dry_run_alert: bool,
}

impl<'a> TelemetryRecord<'a> {
    /// Time of the sample cycle
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// Station identity
    pub fn identity(&self) -> &DeviceIdentity {
        self.identity
    }

    /// One entry per configured channel, in configuration order
    pub fn readings(&self) -> &[ChannelReading<'a>] {
        &self.readings
    }

    /// Reading of one channel
    pub fn reading(&self, channel: &ChannelId) -> Option<Reading> {
        self.readings.iter().find(|r| r.channel == *channel).map(|r| r.reading)
    }

    /// Number of channels with a value
    pub fn available_count(&self) -> usize {
        self.readings.iter().filter(|r| !r.reading.is_unavailable()).count()
    }

    /// Alerts raised since the last successful publish
    pub fn alerts(&self) -> &[AlertEvent] {
        &self.alerts
    }

    /// Pump states at assembly time
    pub fn pumps(&self) -> PumpStates {
        self.pumps
    }

    /// Water level at or above the high mark
    pub fn high_level_float_alert(&self) -> bool {
        self.high_level_float_alert
    }

    /// Water level below the low mark while a pump runs
    pub fn dry_run_alert(&self) -> bool {
        self.dry_run_alert
    }

    /// Encode as JSON
    pub fn encode(&self) -> TelemetryResult<AllocVec<u8>> {
        serde_json::to_vec(self).map_err(|_| TelemetryError::PayloadEncoding {
            reason: "telemetry record",
        })
    }
}

struct ActiveAlerts<'r, 'a>(&'r [ChannelReading<'a>]);

impl Serialize for ActiveAlerts<'_, '_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        for entry in self.0.iter().filter(|r| r.level != AlertLevel::Normal) {
            map.serialize_entry(entry.field, &entry.level)?;
        }
        map.end()
    }
}

const fn on_off(on: bool) -> &'static str {
    if on {
        "ON"
    } else {
        "OFF"
    }
}

impl Serialize for TelemetryRecord<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("device_id", &self.identity.device_id)?;
        map.serialize_entry("device_name", &self.identity.name)?;
        map.serialize_entry("location", &self.identity.location)?;
        map.serialize_entry("latitude", &self.identity.latitude)?;
        map.serialize_entry("longitude", &self.identity.longitude)?;
        map.serialize_entry("timestamp", &self.timestamp)?;

        for entry in &self.readings {
            map.serialize_entry(entry.field, &entry.reading)?;
        }

        for pump in PumpId::ALL {
            map.serialize_entry(pump.status_field(), on_off(self.pumps.is_on(pump)))?;
        }
        map.serialize_entry("high_level_float_alert", &(self.high_level_float_alert as u8))?;
        map.serialize_entry("dry_run_alert", &(self.dry_run_alert as u8))?;
        map.serialize_entry("active_alerts", &ActiveAlerts(&self.readings))?;
        map.serialize_entry("alerts", self.alerts.as_slice())?;
        map.end()
    }
}

/// Builds [`TelemetryRecord`]s for one station
#[derive(Debug, Clone, Copy)]
pub struct TelemetryAssembler<'a> {
    config: &'a DeviceConfig,
    level_index: Option<usize>,
}

impl<'a> TelemetryAssembler<'a> {
    /// Assembler for a validated config
    pub fn new(config: &'a DeviceConfig) -> Self {
        let level_index = config
            .level_channel()
            .and_then(|channel| config.channel_index(&channel.id));
        Self { config, level_index }
    }

    /// Fold the current state into a record
    ///
    /// `latest` is indexed like `DeviceConfig::channels`; a missing or
    /// `None` slot becomes [`Reading::Unavailable`]. Alerts beyond the
    /// record's capacity keep the most recent ones.
    pub fn assemble(
        &self,
        latest: &[Option<CalibratedSample>],
        evaluator: &AlertEvaluator,
        alerts: &[AlertEvent],
        pumps: PumpStates,
        timestamp: Timestamp,
    ) -> TelemetryRecord<'a> {
        let mut readings = Vec::new();
        for (index, channel) in self.config.channels.iter().enumerate().take(MAX_CHANNELS) {
            let sample = latest.get(index).copied().flatten();
            // Capacity checked by take()
            let _ = readings.push(ChannelReading {
                channel: channel.id,
                field: channel.field.as_str(),
                reading: sample.map_or(Reading::Unavailable, |s| Reading::Value(s.value)),
                level: evaluator.level(index),
                out_of_range: sample.is_some_and(|s| s.out_of_range),
            });
        }

        let skip = alerts.len().saturating_sub(MAX_PENDING_ALERTS);
        let mut kept = Vec::new();
        for event in &alerts[skip..] {
            let _ = kept.push(*event);
        }

        let level = self.level_index.map(|i| evaluator.level(i)).unwrap_or_default();

        TelemetryRecord {
            identity: &self.config.identity,
            timestamp,
            readings,
            alerts: kept,
            pumps,
            high_level_float_alert: level >= AlertLevel::High,
            dry_run_alert: level == AlertLevel::Low && pumps.any_on(),
        }
    }
}

/// Liveness message published on the status topic
#[derive(Debug, Clone, Serialize)]
pub struct Heartbeat<'a> {
    /// Device id
    pub device_id: &'a str,
    /// Milliseconds since the first tick
    pub uptime_ms: u64,
    /// Connection state name
    pub state: &'static str,
    /// Completed sample cycles
    pub samples: u32,
    /// Successful telemetry publishes
    pub publishes: u32,
    /// Spikes rejected by the filter
    pub rejections: u32,
    /// Successful (re)connects
    pub reconnects: u32,
    /// Highest alert level across all channels
    pub alert_level: AlertLevel,
    /// Firmware version
    pub firmware: &'static str,
}

impl Heartbeat<'_> {
    /// Encode as JSON
    pub fn encode(&self) -> TelemetryResult<AllocVec<u8>> {
        serde_json::to_vec(self).map_err(|_| TelemetryError::PayloadEncoding { reason: "heartbeat" })
    }
}
