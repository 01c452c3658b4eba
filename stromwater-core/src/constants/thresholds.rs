//! Alert Thresholds and Filter Limits

// ===== WATER LEVEL (m) =====

/// Below this the sump is nearly dry; pumps must stop.
pub const WATER_LEVEL_LOW_M: f32 = 2.0;

/// Above this pump 1 starts.
pub const WATER_LEVEL_HIGH_M: f32 = 8.0;

/// Above this both pumps run and the float alarm is raised.
pub const WATER_LEVEL_CRITICAL_M: f32 = 9.5;

// ===== LINE VOLTAGE (V AC) =====

/// Undervoltage threshold.
pub const VOLTAGE_LOW_THRESHOLD: f32 = 380.0;

/// Overvoltage threshold.
pub const VOLTAGE_HIGH_THRESHOLD: f32 = 450.0;

// ===== CURRENT (A) =====

/// Overload threshold per phase.
pub const CURRENT_OVERLOAD: f32 = 80.0;

/// Max spread between phases, as percent of the mean phase current.
pub const CURRENT_IMBALANCE_PCT: f32 = 15.0;

/// Below this mean current the motor is considered off and imbalance is not
/// evaluated (A).
pub const CURRENT_IMBALANCE_MIN_A: f32 = 1.0;

// ===== OUTLIER FILTER =====

/// Moving average window (samples).
pub const FILTER_WINDOW_SIZE: usize = 5;

/// Max accepted voltage change between consecutive samples (V).
pub const MAX_VOLTAGE_CHANGE: f32 = 50.0;

/// Max accepted current change between consecutive samples (A).
pub const MAX_CURRENT_CHANGE: f32 = 10.0;
