//! Sensor Calibration Defaults
//!
//! The station front end feeds every analog sensor into the ESP32's 12-bit
//! ADC (0-3.3 V). Voltage and current transducers already output 0-3.3 V and
//! carry a datasheet scale; the hydrostatic probe outputs 0-5 V and sits
//! behind a resistive divider.

// ===== ADC =====

/// ADC resolution (bits). 12-bit gives raw counts 0..=4095.
pub const ADC_RESOLUTION_BITS: u8 = 12;

/// ADC full-scale reference voltage (V).
pub const ADC_REFERENCE_VOLTAGE: f32 = 3.3;

// ===== WATER LEVEL (HYDROSTATIC) =====

/// Probe output at 0 m (V).
pub const HYDRO_MIN_VOLTAGE: f32 = 0.0;

/// Probe output at full range (V).
pub const HYDRO_MAX_VOLTAGE: f32 = 5.0;

/// Level at minimum output (m).
pub const HYDRO_MIN_LEVEL_M: f32 = 0.0;

/// Level at maximum output (m).
pub const HYDRO_MAX_LEVEL_M: f32 = 10.0;

/// Divider ratio between probe output and ADC pin (5 V → 3.3 V).
pub const HYDRO_DIVIDER: f32 = HYDRO_MAX_VOLTAGE / ADC_REFERENCE_VOLTAGE;

// ===== AC VOLTAGE (RMS) =====

/// Transducer output window (V).
pub const VOLTAGE_SENSOR_MAX_V: f32 = 3.3;

/// Lowest reported line voltage (V AC).
pub const VOLTAGE_MIN: f32 = 0.0;

/// Highest reported line voltage (V AC).
pub const VOLTAGE_MAX: f32 = 440.0;

/// Volts AC per transducer volt.
pub const VOLTAGE_SCALE: f32 = 133.33;

// ===== AC CURRENT (RMS) =====

/// Transducer output window (V).
pub const CURRENT_SENSOR_MAX_V: f32 = 3.3;

/// Lowest reported phase current (A).
pub const CURRENT_MIN: f32 = 0.0;

/// Highest reported phase current (A).
pub const CURRENT_MAX: f32 = 100.0;

/// Amps per transducer volt.
pub const CURRENT_SCALE: f32 = 30.30;

// ===== TEMPERATURE =====

/// LM35-style probe: 10 mV/°C.
pub const TEMP_VOLTS_TO_CELSIUS: f32 = 100.0;

/// Field trim applied on top of the probe scale.
pub const TEMP_SCALE: f32 = 1.0;

/// Offset at 0 V (°C).
pub const TEMP_OFFSET: f32 = 0.0;

/// Highest reported temperature (°C).
pub const TEMP_MAX_C: f32 = 150.0;

// ===== PIN MAP =====

/// Hydrostatic level sensor pin.
pub const HYDROSTATIC_PIN: u8 = 34;
/// Phase R voltage pin.
pub const VOLTAGE_R_PIN: u8 = 35;
/// Phase Y voltage pin.
pub const VOLTAGE_Y_PIN: u8 = 32;
/// Phase B voltage pin.
pub const VOLTAGE_B_PIN: u8 = 33;
/// Phase R current pin.
pub const CURRENT_R_PIN: u8 = 25;
/// Phase Y current pin.
pub const CURRENT_Y_PIN: u8 = 26;
/// Phase B current pin.
pub const CURRENT_B_PIN: u8 = 27;
/// Temperature probe pin.
pub const TEMP_SENSOR_PIN: u8 = 36;
