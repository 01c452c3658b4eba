//! Network and Identity Defaults
//!
//! Values of the first field deployment (Dubai pump station). Credentials
//! are placeholders and must come from the deployment config.

// ===== BROKER =====

/// MQTT broker host.
pub const MQTT_BROKER: &str = "43.205.194.142";

/// MQTT broker port (plain TCP).
pub const MQTT_PORT: u16 = 1883;

/// Broker user name.
pub const MQTT_USERNAME: &str = "stromwater";

/// Broker password placeholder. Never ship a real secret here.
pub const MQTT_PASSWORD: &str = "";

/// MQTT client identifier.
pub const MQTT_CLIENT_ID: &str = "ESP32_Device_1";

/// MQTT keep-alive (seconds).
pub const MQTT_KEEPALIVE_SECS: u16 = 60;

/// MQTT quality of service for telemetry (0, 1 or 2).
pub const MQTT_QOS: u8 = 1;

// ===== DEVICE IDENTITY =====

/// Device identifier, also the topic segment (`devices/<id>/data`).
pub const DEVICE_ID: &str = "StromWater_Device_1";

/// Human readable station name.
pub const DEVICE_NAME: &str = "Dubai Pump Station Alpha";

/// Station location label.
pub const DEVICE_LOCATION: &str = "Dubai Industrial Area Zone 1";

/// Station latitude (degrees).
pub const DEVICE_LATITUDE: f64 = 25.2048;

/// Station longitude (degrees).
pub const DEVICE_LONGITUDE: f64 = 55.2708;

/// Topic prefix shared by data and status topics.
pub const TOPIC_PREFIX: &str = "devices";

// ===== RETRY BUDGET =====

/// Consecutive failed connects before entering degraded mode.
pub const MAX_RECONNECT_ATTEMPTS: u32 = 5;
