//! Station configuration
//!
//! One immutable [`DeviceConfig`] is built at startup, validated once and
//! passed by reference to every component. There is no process-wide
//! mutable state.
//!
//! `Default` reproduces the shipped station layout: one hydrostatic level
//! probe, three-phase voltage and current for pump 1 and a temperature
//! probe. A deployment usually overrides identity and credentials only:
//!
//! ```rust
//! use stromwater_core::DeviceConfig;
//!
//! let json = br#"{
//!     "identity": { "device_id": "StromWater_Device_2", "name": "Sharjah Pump Station" },
//!     "network": { "password": "s3cret" }
//! }"#;
//!
//! let config = DeviceConfig::from_json(json)?;
//! assert_eq!(config.data_topic(), "devices/StromWater_Device_2/data");
//! assert_eq!(config.channels.len(), 8);
//! # Ok::<(), stromwater_core::TelemetryError>(())
//! ```

use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec;
use alloc::vec::Vec;

use serde::{Deserialize, Serialize};

use crate::channel::{ChannelId, ChannelKind};
use crate::constants::{buffers, calibration as cal, network as net, thresholds as thr, time};
use crate::errors::{TelemetryError, TelemetryResult};

/// Channel ids of the shipped layout
pub mod ids {
    use crate::channel::ChannelId;

    /// Hydrostatic water level
    pub const HYDRO: ChannelId = ChannelId::from_static("hydro");
    /// Phase R line voltage
    pub const VOLTAGE_R: ChannelId = ChannelId::from_static("vrms_1_r");
    /// Phase Y line voltage
    pub const VOLTAGE_Y: ChannelId = ChannelId::from_static("vrms_1_y");
    /// Phase B line voltage
    pub const VOLTAGE_B: ChannelId = ChannelId::from_static("vrms_1_b");
    /// Phase R current
    pub const CURRENT_R: ChannelId = ChannelId::from_static("irms_1_r");
    /// Phase Y current
    pub const CURRENT_Y: ChannelId = ChannelId::from_static("irms_1_y");
    /// Phase B current
    pub const CURRENT_B: ChannelId = ChannelId::from_static("irms_1_b");
    /// Temperature probe
    pub const TEMPERATURE: ChannelId = ChannelId::from_static("temperature");
    /// Virtual channel carrying phase imbalance alerts
    pub const CURRENT_IMBALANCE: ChannelId = ChannelId::from_static("imbalance");
}

/// Device identity, copied into every telemetry record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceIdentity {
    /// Unique device id, also used in topics
    pub device_id: String,
    /// Station name
    pub name: String,
    /// Location label
    pub location: String,
    /// Latitude in degrees
    pub latitude: f64,
    /// Longitude in degrees
    pub longitude: f64,
}

impl Default for DeviceIdentity {
    fn default() -> Self {
        Self {
            device_id: net::DEVICE_ID.to_string(),
            name: net::DEVICE_NAME.to_string(),
            location: net::DEVICE_LOCATION.to_string(),
            latitude: net::DEVICE_LATITUDE,
            longitude: net::DEVICE_LONGITUDE,
        }
    }
}

/// Broker connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Broker host name or address
    pub broker: String,
    /// Broker port
    pub port: u16,
    /// User name
    pub username: String,
    /// Password
    pub password: String,
    /// MQTT client id
    pub client_id: String,
    /// Keep-alive in seconds
    pub keep_alive_secs: u16,
    /// QoS for telemetry publishes
    pub qos: u8,
    /// Consecutive failed connects before degraded mode
    pub max_reconnect_attempts: u32,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            broker: net::MQTT_BROKER.to_string(),
            port: net::MQTT_PORT,
            username: net::MQTT_USERNAME.to_string(),
            password: net::MQTT_PASSWORD.to_string(),
            client_id: net::MQTT_CLIENT_ID.to_string(),
            keep_alive_secs: net::MQTT_KEEPALIVE_SECS,
            qos: net::MQTT_QOS,
            max_reconnect_attempts: net::MAX_RECONNECT_ATTEMPTS,
        }
    }
}

/// ADC front end
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdcConfig {
    /// Resolution in bits
    pub resolution_bits: u8,
    /// Full-scale reference voltage
    pub reference_voltage: f32,
}

impl AdcConfig {
    /// Highest raw count the ADC can report
    ///
    /// Resolutions outside 1..=16 bits are clamped into that range.
    pub fn max_raw(&self) -> u16 {
        let bits = self.resolution_bits.clamp(1, 16);
        u16::MAX >> (16 - bits)
    }
}

impl Default for AdcConfig {
    fn default() -> Self {
        Self {
            resolution_bits: cal::ADC_RESOLUTION_BITS,
            reference_voltage: cal::ADC_REFERENCE_VOLTAGE,
        }
    }
}

fn unit_divider() -> f32 {
    1.0
}

/// Calibration and filtering for one analog channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Channel id
    pub id: ChannelId,
    /// Measured quantity
    pub kind: ChannelKind,
    /// Field name in the telemetry payload
    pub field: String,
    /// ADC pin
    pub pin: u8,
    /// Sensor output at `min_physical` (V)
    pub min_voltage: f32,
    /// Sensor output at `max_physical` (V)
    pub max_voltage: f32,
    /// Lowest reported physical value
    pub min_physical: f32,
    /// Highest reported physical value
    pub max_physical: f32,
    /// Physical units per sensor volt; derived from the windows when absent
    #[serde(default)]
    pub scale: Option<f32>,
    /// Ratio between sensor output and ADC pin voltage
    #[serde(default = "unit_divider")]
    pub divider: f32,
    /// Max accepted change between consecutive samples; no spike rejection
    /// when absent
    #[serde(default)]
    pub max_change: Option<f32>,
}

impl ChannelConfig {
    /// Physical units per sensor volt
    pub fn effective_scale(&self) -> f32 {
        self.scale.unwrap_or_else(|| {
            (self.max_physical - self.min_physical) / (self.max_voltage - self.min_voltage)
        })
    }

    fn validate(&self) -> TelemetryResult<()> {
        if !(self.max_voltage > self.min_voltage) {
            return Err(TelemetryError::InvalidConfig {
                reason: "max_voltage must exceed min_voltage",
            });
        }
        if !(self.max_physical >= self.min_physical) {
            return Err(TelemetryError::InvalidConfig {
                reason: "max_physical below min_physical",
            });
        }
        if !(self.divider > 0.0) || !self.divider.is_finite() {
            return Err(TelemetryError::InvalidConfig {
                reason: "divider must be positive",
            });
        }
        if let Some(scale) = self.scale {
            if !scale.is_finite() {
                return Err(TelemetryError::InvalidConfig {
                    reason: "scale must be finite",
                });
            }
        }
        if let Some(max_change) = self.max_change {
            if !(max_change >= 0.0) {
                return Err(TelemetryError::InvalidConfig {
                    reason: "max_change must not be negative",
                });
            }
        }
        if self.field.is_empty() {
            return Err(TelemetryError::InvalidConfig {
                reason: "payload field name is empty",
            });
        }
        Ok(())
    }
}

/// Alert limits for one channel
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlertThreshold {
    /// Channel the limits apply to
    pub channel: ChannelId,
    /// Low alert below this value
    #[serde(default)]
    pub low: Option<f32>,
    /// High alert above this value
    #[serde(default)]
    pub high: Option<f32>,
    /// Critical alert at or above this value, wins over `high`
    #[serde(default)]
    pub critical: Option<f32>,
}

/// Three current channels checked for phase imbalance
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImbalanceConfig {
    /// Phase channels (R, Y, B)
    pub channels: [ChannelId; buffers::PHASES],
    /// Max spread as percent of the mean
    pub max_pct: f32,
    /// Mean current below which the check is skipped
    pub min_current: f32,
}

impl Default for ImbalanceConfig {
    fn default() -> Self {
        Self {
            channels: [ids::CURRENT_R, ids::CURRENT_Y, ids::CURRENT_B],
            max_pct: thr::CURRENT_IMBALANCE_PCT,
            min_current: thr::CURRENT_IMBALANCE_MIN_A,
        }
    }
}

/// Outlier filter settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Moving average window
    pub window: usize,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self { window: thr::FILTER_WINDOW_SIZE }
    }
}

/// Scheduler cadences (milliseconds)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Sampling cadence
    pub sensor_read_interval_ms: u64,
    /// Telemetry publish cadence
    pub publish_interval_ms: u64,
    /// Heartbeat cadence
    pub heartbeat_interval_ms: u64,
    /// Spacing between reconnect attempts
    pub reconnect_delay_ms: u64,
    /// Bound on one blocking network operation
    pub network_timeout_ms: u64,
    /// Watchdog deadline
    pub watchdog_timeout_ms: u64,
    /// Leave degraded mode automatically after this long
    pub degraded_reset_ms: Option<u64>,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            sensor_read_interval_ms: time::SENSOR_READ_INTERVAL_MS,
            publish_interval_ms: time::PUBLISH_INTERVAL_MS,
            heartbeat_interval_ms: time::HEARTBEAT_INTERVAL_MS,
            reconnect_delay_ms: time::RECONNECT_DELAY_MS,
            network_timeout_ms: time::NETWORK_TIMEOUT_MS,
            watchdog_timeout_ms: time::WATCHDOG_TIMEOUT_MS,
            degraded_reset_ms: Some(time::DEGRADED_RESET_MS),
        }
    }
}

/// Feature toggles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureFlags {
    /// Run readings through the outlier filter
    pub data_filtering: bool,
    /// Drive pumps from water level alerts
    pub auto_pump: bool,
    /// Accept manual pump commands
    pub manual_override: bool,
    /// Log raw ADC counts every sample
    pub print_raw_sensor_data: bool,
    /// Log every published payload
    pub print_payload: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            data_filtering: true,
            auto_pump: true,
            manual_override: false,
            print_raw_sensor_data: false,
            print_payload: true,
        }
    }
}

/// Complete station configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Identity fields
    pub identity: DeviceIdentity,
    /// Broker settings
    pub network: NetworkConfig,
    /// ADC front end
    pub adc: AdcConfig,
    /// Analog channels, in payload order
    pub channels: Vec<ChannelConfig>,
    /// Alert limits
    pub thresholds: Vec<AlertThreshold>,
    /// Phase imbalance check, disabled when absent
    pub imbalance: Option<ImbalanceConfig>,
    /// Outlier filter
    pub filter: FilterConfig,
    /// Cadences
    pub timing: TimingConfig,
    /// Feature toggles
    pub features: FeatureFlags,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        let voltage = |id: ChannelId, pin: u8| ChannelConfig {
            id,
            kind: ChannelKind::Voltage,
            field: id.as_str().to_string(),
            pin,
            min_voltage: 0.0,
            max_voltage: cal::VOLTAGE_SENSOR_MAX_V,
            min_physical: cal::VOLTAGE_MIN,
            max_physical: cal::VOLTAGE_MAX,
            scale: Some(cal::VOLTAGE_SCALE),
            divider: 1.0,
            max_change: Some(thr::MAX_VOLTAGE_CHANGE),
        };
        let current = |id: ChannelId, pin: u8| ChannelConfig {
            id,
            kind: ChannelKind::Current,
            field: id.as_str().to_string(),
            pin,
            min_voltage: 0.0,
            max_voltage: cal::CURRENT_SENSOR_MAX_V,
            min_physical: cal::CURRENT_MIN,
            max_physical: cal::CURRENT_MAX,
            scale: Some(cal::CURRENT_SCALE),
            divider: 1.0,
            max_change: Some(thr::MAX_CURRENT_CHANGE),
        };
        let voltage_limits = |channel: ChannelId| AlertThreshold {
            channel,
            low: Some(thr::VOLTAGE_LOW_THRESHOLD),
            high: Some(thr::VOLTAGE_HIGH_THRESHOLD),
            critical: None,
        };
        let current_limits = |channel: ChannelId| AlertThreshold {
            channel,
            low: None,
            high: Some(thr::CURRENT_OVERLOAD),
            critical: None,
        };

        let channels = vec![
            ChannelConfig {
                id: ids::HYDRO,
                kind: ChannelKind::WaterLevel,
                field: "hydrostatic_value".to_string(),
                pin: cal::HYDROSTATIC_PIN,
                min_voltage: cal::HYDRO_MIN_VOLTAGE,
                max_voltage: cal::HYDRO_MAX_VOLTAGE,
                min_physical: cal::HYDRO_MIN_LEVEL_M,
                max_physical: cal::HYDRO_MAX_LEVEL_M,
                scale: None,
                divider: cal::HYDRO_DIVIDER,
                max_change: None,
            },
            voltage(ids::VOLTAGE_R, cal::VOLTAGE_R_PIN),
            voltage(ids::VOLTAGE_Y, cal::VOLTAGE_Y_PIN),
            voltage(ids::VOLTAGE_B, cal::VOLTAGE_B_PIN),
            current(ids::CURRENT_R, cal::CURRENT_R_PIN),
            current(ids::CURRENT_Y, cal::CURRENT_Y_PIN),
            current(ids::CURRENT_B, cal::CURRENT_B_PIN),
            ChannelConfig {
                id: ids::TEMPERATURE,
                kind: ChannelKind::Temperature,
                field: "temperature".to_string(),
                pin: cal::TEMP_SENSOR_PIN,
                min_voltage: 0.0,
                max_voltage: cal::ADC_REFERENCE_VOLTAGE,
                min_physical: cal::TEMP_OFFSET,
                max_physical: cal::TEMP_MAX_C,
                scale: Some(cal::TEMP_VOLTS_TO_CELSIUS * cal::TEMP_SCALE),
                divider: 1.0,
                max_change: None,
            },
        ];

        let thresholds = vec![
            AlertThreshold {
                channel: ids::HYDRO,
                low: Some(thr::WATER_LEVEL_LOW_M),
                high: Some(thr::WATER_LEVEL_HIGH_M),
                critical: Some(thr::WATER_LEVEL_CRITICAL_M),
            },
            voltage_limits(ids::VOLTAGE_R),
            voltage_limits(ids::VOLTAGE_Y),
            voltage_limits(ids::VOLTAGE_B),
            current_limits(ids::CURRENT_R),
            current_limits(ids::CURRENT_Y),
            current_limits(ids::CURRENT_B),
        ];

        Self {
            identity: DeviceIdentity::default(),
            network: NetworkConfig::default(),
            adc: AdcConfig::default(),
            channels,
            thresholds,
            imbalance: Some(ImbalanceConfig::default()),
            filter: FilterConfig::default(),
            timing: TimingConfig::default(),
            features: FeatureFlags::default(),
        }
    }
}

impl DeviceConfig {
    /// Parse and validate a JSON document; missing fields keep their defaults
    pub fn from_json(bytes: &[u8]) -> TelemetryResult<Self> {
        let config: DeviceConfig = serde_json::from_slice(bytes).map_err(|_| {
            TelemetryError::InvalidConfig { reason: "malformed JSON configuration" }
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check every invariant the components rely on
    pub fn validate(&self) -> TelemetryResult<()> {
        if self.channels.is_empty() {
            return Err(TelemetryError::InvalidConfig { reason: "no channels configured" });
        }
        if self.channels.len() > buffers::MAX_CHANNELS {
            return Err(TelemetryError::InvalidConfig { reason: "too many channels" });
        }
        for (i, channel) in self.channels.iter().enumerate() {
            channel.validate()?;
            if self.channels[..i].iter().any(|c| c.id == channel.id) {
                return Err(TelemetryError::InvalidConfig { reason: "duplicate channel id" });
            }
        }

        for threshold in &self.thresholds {
            if self.channel_index(&threshold.channel).is_none() {
                return Err(TelemetryError::InvalidConfig {
                    reason: "threshold references unknown channel",
                });
            }
            if let (Some(low), Some(high)) = (threshold.low, threshold.high) {
                if !(low < high) {
                    return Err(TelemetryError::InvalidConfig {
                        reason: "low threshold must be below high threshold",
                    });
                }
            }
        }

        if let Some(imbalance) = &self.imbalance {
            if imbalance.channels.iter().any(|id| self.channel_index(id).is_none()) {
                return Err(TelemetryError::InvalidConfig {
                    reason: "imbalance references unknown channel",
                });
            }
            if !(imbalance.max_pct > 0.0) {
                return Err(TelemetryError::InvalidConfig {
                    reason: "imbalance percentage must be positive",
                });
            }
        }

        if self.filter.window == 0 || self.filter.window > buffers::MAX_FILTER_WINDOW {
            return Err(TelemetryError::InvalidConfig { reason: "filter window out of range" });
        }

        if self.adc.resolution_bits == 0 || self.adc.resolution_bits > 16 {
            return Err(TelemetryError::InvalidConfig { reason: "ADC resolution out of range" });
        }
        if !(self.adc.reference_voltage > 0.0) {
            return Err(TelemetryError::InvalidConfig { reason: "ADC reference must be positive" });
        }

        let t = &self.timing;
        if t.sensor_read_interval_ms == 0
            || t.publish_interval_ms == 0
            || t.heartbeat_interval_ms == 0
            || t.watchdog_timeout_ms == 0
        {
            return Err(TelemetryError::InvalidConfig { reason: "intervals must be non-zero" });
        }
        if t.watchdog_timeout_ms <= t.sensor_read_interval_ms {
            return Err(TelemetryError::InvalidConfig {
                reason: "watchdog must outlast the sampling interval",
            });
        }

        if self.network.max_reconnect_attempts == 0 {
            return Err(TelemetryError::InvalidConfig {
                reason: "max_reconnect_attempts must be at least 1",
            });
        }
        if self.network.qos > 2 {
            return Err(TelemetryError::InvalidConfig { reason: "QoS must be 0, 1 or 2" });
        }
        if self.identity.device_id.is_empty() {
            return Err(TelemetryError::InvalidConfig { reason: "device id is empty" });
        }

        Ok(())
    }

    /// Position of a channel in `channels`
    pub fn channel_index(&self, id: &ChannelId) -> Option<usize> {
        self.channels.iter().position(|c| c.id == *id)
    }

    /// Alert limits for a channel
    pub fn threshold_for(&self, id: &ChannelId) -> Option<&AlertThreshold> {
        self.thresholds.iter().find(|t| t.channel == *id)
    }

    /// First water level channel; drives automatic pump control
    pub fn level_channel(&self) -> Option<&ChannelConfig> {
        self.channels.iter().find(|c| c.kind == ChannelKind::WaterLevel)
    }

    /// Telemetry topic, `devices/<id>/data`
    pub fn data_topic(&self) -> String {
        format!("{}/{}/data", net::TOPIC_PREFIX, self.identity.device_id)
    }

    /// Heartbeat topic, `devices/<id>/status`
    pub fn status_topic(&self) -> String {
        format!("{}/{}/status", net::TOPIC_PREFIX, self.identity.device_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout_is_valid() {
        let config = DeviceConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.channels.len(), 8);
        assert_eq!(config.level_channel().map(|c| c.id), Some(ids::HYDRO));
    }

    #[test]
    fn default_scales_reach_full_range() {
        let config = DeviceConfig::default();
        let voltage = &config.channels[config.channel_index(&ids::VOLTAGE_R).unwrap()];
        let full = voltage.effective_scale() * voltage.max_voltage;
        assert!((full - 440.0).abs() < 0.1);

        let hydro = &config.channels[0];
        assert!((hydro.effective_scale() - 2.0).abs() < 1e-6);
    }

    #[test]
    fn inverted_voltage_window_rejected() {
        let mut config = DeviceConfig::default();
        config.channels[0].max_voltage = 0.0;
        assert!(matches!(
            config.validate(),
            Err(TelemetryError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn adc_max_raw_never_overflows() {
        let mut adc = AdcConfig::default();
        assert_eq!(adc.max_raw(), 4095);

        adc.resolution_bits = 16;
        assert_eq!(adc.max_raw(), u16::MAX);

        adc.resolution_bits = 40;
        assert_eq!(adc.max_raw(), u16::MAX);

        adc.resolution_bits = 0;
        assert_eq!(adc.max_raw(), 1);

        let config = DeviceConfig { adc, ..Default::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn duplicate_channel_rejected() {
        let mut config = DeviceConfig::default();
        let copy = config.channels[1].clone();
        config.channels.push(copy);
        assert!(config.validate().is_err());
    }

    #[test]
    fn filter_window_bounds() {
        let mut config = DeviceConfig::default();
        config.filter.window = 0;
        assert!(config.validate().is_err());
        config.filter.window = buffers::MAX_FILTER_WINDOW + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn json_overrides_keep_defaults() {
        let json = br#"{ "timing": { "publish_interval_ms": 2000 }, "features": { "auto_pump": false } }"#;
        let config = DeviceConfig::from_json(json).unwrap();
        assert_eq!(config.timing.publish_interval_ms, 2000);
        assert_eq!(config.timing.sensor_read_interval_ms, 1000);
        assert!(!config.features.auto_pump);
        assert!(config.features.data_filtering);
    }

    #[test]
    fn json_with_unknown_channel_threshold_fails() {
        let json = br#"{ "thresholds": [ { "channel": "nope", "high": 1.0 } ] }"#;
        assert!(DeviceConfig::from_json(json).is_err());
    }

    #[test]
    fn topics() {
        let config = DeviceConfig::default();
        assert_eq!(config.data_topic(), "devices/StromWater_Device_1/data");
        assert_eq!(config.status_topic(), "devices/StromWater_Device_1/status");
    }
}
