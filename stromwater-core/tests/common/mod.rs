//! Common test utilities for integration tests
//!
//! This module provides:
//! - Scripted sensor source with per-channel values, scripts and faults
//! - Scripted transport recording every publish
//! - Recording pump actuator
//! - Raw-count helpers that invert the calibration

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};

use stromwater_core::{
    config::{ids, ChannelConfig, DeviceConfig},
    traits::{ActuatorError, PumpActuator, SensorFault, SensorSource, Transport, TransportError},
    ChannelId, PumpId,
};

pub mod scenarios;

/// ADC count that calibrates to `physical` on channel `id`
pub fn raw_for(config: &DeviceConfig, id: ChannelId, physical: f32) -> u16 {
    let idx = config.channel_index(&id).expect("channel configured");
    let channel = &config.channels[idx];
    let sensor_volts = channel.min_voltage + (physical - channel.min_physical) / channel.effective_scale();
    let pin_volts = sensor_volts / channel.divider;
    let raw = pin_volts / config.adc.reference_voltage * config.adc.max_raw() as f32;
    raw.round().clamp(0.0, config.adc.max_raw() as f32) as u16
}

/// Sensor source driven by the test
#[derive(Debug, Default)]
pub struct ScriptedSensorSource {
    values: HashMap<ChannelId, u16>,
    scripts: HashMap<ChannelId, VecDeque<u16>>,
    faults: HashMap<ChannelId, &'static str>,
    pub reads: usize,
}

impl ScriptedSensorSource {
    /// Every channel at a nominal operating point
    pub fn nominal(config: &DeviceConfig) -> Self {
        let mut source = Self::default();
        source.set(ids::HYDRO, raw_for(config, ids::HYDRO, 5.0));
        for id in [ids::VOLTAGE_R, ids::VOLTAGE_Y, ids::VOLTAGE_B] {
            source.set(id, raw_for(config, id, 400.0));
        }
        for id in [ids::CURRENT_R, ids::CURRENT_Y, ids::CURRENT_B] {
            source.set(id, raw_for(config, id, 30.0));
        }
        source.set(ids::TEMPERATURE, raw_for(config, ids::TEMPERATURE, 35.0));
        source
    }

    /// Steady value for a channel
    pub fn set(&mut self, id: ChannelId, raw: u16) {
        self.values.insert(id, raw);
        self.faults.remove(&id);
    }

    /// Values returned before falling back to the steady value
    pub fn script(&mut self, id: ChannelId, raws: impl IntoIterator<Item = u16>) {
        self.scripts.entry(id).or_default().extend(raws);
    }

    /// Make every read of a channel fail
    pub fn fail(&mut self, id: ChannelId, reason: &'static str) {
        self.faults.insert(id, reason);
    }
}

impl SensorSource for ScriptedSensorSource {
    fn read_raw(&mut self, channel: &ChannelConfig) -> Result<u16, SensorFault> {
        self.reads += 1;
        if let Some(&reason) = self.faults.get(&channel.id) {
            return Err(SensorFault { reason });
        }
        if let Some(raw) = self.scripts.get_mut(&channel.id).and_then(VecDeque::pop_front) {
            return Ok(raw);
        }
        Ok(self.values.get(&channel.id).copied().unwrap_or(0))
    }
}

/// Transport that records publishes and fails on demand
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    up: bool,
    pub refuse_connects: bool,
    pub fail_publishes: bool,
    pub connects: u32,
    pub published: Vec<(String, Vec<u8>)>,
}

impl ScriptedTransport {
    /// Transport whose connects always fail
    pub fn unreachable() -> Self {
        Self { refuse_connects: true, ..Default::default() }
    }

    /// Simulate the broker dropping the connection
    pub fn drop_link(&mut self) {
        self.up = false;
    }

    /// Payloads published on `topic`, parsed as JSON
    pub fn messages_on(&self, topic: &str) -> Vec<serde_json::Value> {
        self.published
            .iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, payload)| serde_json::from_slice(payload).expect("valid JSON payload"))
            .collect()
    }

    /// Last telemetry payload, parsed as JSON
    pub fn last_message_on(&self, topic: &str) -> Option<serde_json::Value> {
        self.messages_on(topic).pop()
    }
}

impl Transport for ScriptedTransport {
    fn connect(&mut self) -> Result<(), TransportError> {
        self.connects += 1;
        if self.refuse_connects {
            return Err(TransportError::Timeout);
        }
        self.up = true;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.up
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), TransportError> {
        if !self.up {
            return Err(TransportError::NotConnected);
        }
        if self.fail_publishes {
            self.up = false;
            return Err(TransportError::Io);
        }
        self.published.push((topic.to_string(), payload.to_vec()));
        Ok(())
    }

    fn disconnect(&mut self) {
        self.up = false;
    }
}

/// Actuator that records every relay write
#[derive(Debug, Default)]
pub struct RecordingActuator {
    pub writes: Vec<(PumpId, bool)>,
    /// Number of upcoming "on" writes that fail
    pub refuse_on: u32,
}

impl RecordingActuator {
    /// Last state written for `pump`
    pub fn last(&self, pump: PumpId) -> Option<bool> {
        self.writes.iter().rev().find(|(p, _)| *p == pump).map(|(_, on)| *on)
    }
}

impl PumpActuator for RecordingActuator {
    fn set_pump_state(&mut self, pump: PumpId, on: bool) -> Result<(), ActuatorError> {
        if on && self.refuse_on > 0 {
            self.refuse_on -= 1;
            return Err(ActuatorError { reason: "contactor did not pull in" });
        }
        self.writes.push((pump, on));
        Ok(())
    }
}
