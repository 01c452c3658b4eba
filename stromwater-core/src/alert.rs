//! Edge-triggered threshold alerts
//!
//! ## State machine
//!
//! Every channel with an [`AlertThreshold`] sits in one of four levels.
//! A reading picks its level in priority order:
//!
//! ```text
//! value >= critical  → Critical   (wins even when critical <= high)
//! value >  high      → High
//! value <  low       → Low
//! otherwise          → Normal
//! ```
//!
//! An [`AlertEvent`] is emitted only when the level changes, including the
//! change back to Normal ("cleared"). A sustained alarm produces exactly
//! one event, so the publish path is never flooded.
//!
//! | from \ to | Normal  | Low   | High  | Critical |
//! |-----------|---------|-------|-------|----------|
//! | Normal    | -       | event | event | event    |
//! | Low       | cleared | -     | event | event    |
//! | High      | cleared | event | -     | event    |
//! | Critical  | cleared | event | event | -        |
//!
//! ## Phase imbalance
//!
//! [`PhaseImbalanceMonitor`] applies the same edge rule to the spread of
//! three phase currents and reports on a virtual channel.

use core::fmt;

use heapless::Vec;
use serde::{ser::SerializeStruct, Serialize, Serializer};

use crate::channel::ChannelId;
use crate::config::{ids, AlertThreshold, DeviceConfig, ImbalanceConfig};
use crate::constants::buffers::{MAX_CHANNELS, PHASES};
use crate::time::Timestamp;

/// Alert level of a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(u8)]
pub enum AlertLevel {
    /// Within limits
    #[default]
    Normal = 0,
    /// Below the low threshold
    Low = 1,
    /// Above the high threshold
    High = 2,
    /// At or above the critical threshold
    Critical = 3,
}

impl AlertLevel {
    /// Lowercase name used in payloads
    pub const fn name(&self) -> &'static str {
        match self {
            AlertLevel::Normal => "normal",
            AlertLevel::Low => "low",
            AlertLevel::High => "high",
            AlertLevel::Critical => "critical",
        }
    }

    /// Severity label for the backend alert table
    pub const fn severity(&self) -> &'static str {
        match self {
            AlertLevel::Normal => "info",
            AlertLevel::Low | AlertLevel::High => "warning",
            AlertLevel::Critical => "critical",
        }
    }

    /// Classify `value` against a threshold
    pub fn classify(value: f32, threshold: &AlertThreshold) -> Self {
        if matches!(threshold.critical, Some(critical) if value >= critical) {
            AlertLevel::Critical
        } else if matches!(threshold.high, Some(high) if value > high) {
            AlertLevel::High
        } else if matches!(threshold.low, Some(low) if value < low) {
            AlertLevel::Low
        } else {
            AlertLevel::Normal
        }
    }
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for AlertLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for AlertLevel {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "{}", self.name())
    }
}

/// Level change on one channel
///
/// Serialized with the level's backend `severity` alongside the level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertEvent {
    /// Channel that changed level
    pub channel: ChannelId,
    /// Level before the change
    pub previous: AlertLevel,
    /// Level after the change
    pub level: AlertLevel,
    /// Reading that caused the change
    pub value: f32,
    /// Time of the reading
    pub timestamp: Timestamp,
}

impl AlertEvent {
    /// Channel returned to Normal
    pub fn is_cleared(&self) -> bool {
        self.level == AlertLevel::Normal
    }
}

impl Serialize for AlertEvent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut event = serializer.serialize_struct("AlertEvent", 6)?;
        event.serialize_field("channel", &self.channel)?;
        event.serialize_field("previous", &self.previous)?;
        event.serialize_field("level", &self.level)?;
        event.serialize_field("severity", self.level.severity())?;
        event.serialize_field("value", &self.value)?;
        event.serialize_field("timestamp", &self.timestamp)?;
        event.end()
    }
}

#[derive(Debug, Clone, Copy)]
struct ChannelAlertState {
    threshold: Option<AlertThreshold>,
    level: AlertLevel,
}

/// Per-channel alert state table, indexed like `DeviceConfig::channels`
#[derive(Debug, Clone)]
pub struct AlertEvaluator {
    table: Vec<ChannelAlertState, MAX_CHANNELS>,
}

impl AlertEvaluator {
    /// Build the table from the station config; every channel starts Normal
    pub fn from_config(config: &DeviceConfig) -> Self {
        let mut table = Vec::new();
        for channel in config.channels.iter().take(MAX_CHANNELS) {
            let _ = table.push(ChannelAlertState {
                threshold: config.threshold_for(&channel.id).copied(),
                level: AlertLevel::Normal,
            });
        }
        Self { table }
    }

    /// Evaluate a reading for channel `index`
    ///
    /// Returns an event only when the level changed.
    pub fn evaluate(&mut self, index: usize, value: f32, timestamp: Timestamp) -> Option<AlertEvent> {
        let state = self.table.get_mut(index)?;
        let threshold = state.threshold?;

        let level = AlertLevel::classify(value, &threshold);
        if level == state.level {
            return None;
        }

        let event = AlertEvent {
            channel: threshold.channel,
            previous: state.level,
            level,
            value,
            timestamp,
        };
        state.level = level;

        if event.is_cleared() {
            log_info!("{}: {} cleared at {}", event.channel, event.previous, value);
        } else {
            log_warn!("{}: {} -> {} at {}", event.channel, event.previous, level, value);
        }

        Some(event)
    }

    /// Current level of channel `index`
    pub fn level(&self, index: usize) -> AlertLevel {
        self.table.get(index).map(|s| s.level).unwrap_or_default()
    }

    /// Highest level across all channels
    pub fn worst_level(&self) -> AlertLevel {
        self.table.iter().map(|s| s.level).max().unwrap_or_default()
    }
}

/// Three-phase current imbalance check
#[derive(Debug, Clone)]
pub struct PhaseImbalanceMonitor {
    indices: [usize; PHASES],
    max_pct: f32,
    min_current: f32,
    level: AlertLevel,
}

impl PhaseImbalanceMonitor {
    /// Monitor for the configured phase group; `None` when disabled or the
    /// channels are unknown
    pub fn from_config(config: &DeviceConfig) -> Option<Self> {
        let ImbalanceConfig { channels, max_pct, min_current } = config.imbalance?;

        let mut indices = [0usize; PHASES];
        for (slot, id) in indices.iter_mut().zip(channels.iter()) {
            *slot = config.channel_index(id)?;
        }

        Some(Self {
            indices,
            max_pct,
            min_current,
            level: AlertLevel::Normal,
        })
    }

    /// Channel indices of the phase group
    pub fn indices(&self) -> &[usize; PHASES] {
        &self.indices
    }

    /// Spread between phases as percent of the mean; `None` while the motor
    /// is off
    pub fn imbalance_pct(&self, currents: &[f32; PHASES]) -> Option<f32> {
        let mean = currents.iter().sum::<f32>() / PHASES as f32;
        if mean < self.min_current {
            return None;
        }

        let max = currents.iter().copied().fold(f32::MIN, f32::max);
        let min = currents.iter().copied().fold(f32::MAX, f32::min);
        Some((max - min) / mean * 100.0)
    }

    /// Evaluate one set of phase currents
    ///
    /// An idle motor counts as balanced.
    pub fn evaluate(&mut self, currents: &[f32; PHASES], timestamp: Timestamp) -> Option<AlertEvent> {
        let pct = self.imbalance_pct(currents);
        let level = match pct {
            Some(pct) if pct > self.max_pct => AlertLevel::High,
            _ => AlertLevel::Normal,
        };

        if level == self.level {
            return None;
        }

        let previous = self.level;
        self.level = level;
        log_warn!("phase imbalance {} -> {} ({:?} %)", previous, level, pct);

        Some(AlertEvent {
            channel: ids::CURRENT_IMBALANCE,
            previous,
            level,
            value: pct.unwrap_or(0.0),
            timestamp,
        })
    }

    /// Current level
    pub fn level(&self) -> AlertLevel {
        self.level
    }
}
