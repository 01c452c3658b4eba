//! Channel identity
//!
//! A channel is one analog input line with its own calibration, filter and
//! threshold settings. Channels are identified by a short inline string so
//! samples, events and errors stay `Copy` and never allocate.

use core::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::constants::buffers::MAX_CHANNEL_ID_LEN;

/// Physical quantity measured on a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    /// Hydrostatic water level
    WaterLevel,
    /// AC line voltage (RMS)
    Voltage,
    /// AC phase current (RMS)
    Current,
    /// Temperature probe
    Temperature,
}

impl ChannelKind {
    /// Human-readable name
    pub const fn name(&self) -> &'static str {
        match self {
            ChannelKind::WaterLevel => "water_level",
            ChannelKind::Voltage => "voltage",
            ChannelKind::Current => "current",
            ChannelKind::Temperature => "temperature",
        }
    }

    /// Unit of the calibrated value
    pub const fn unit(&self) -> &'static str {
        match self {
            ChannelKind::WaterLevel => "m",
            ChannelKind::Voltage => "V",
            ChannelKind::Current => "A",
            ChannelKind::Temperature => "°C",
        }
    }
}

/// Inline channel identifier (at most 15 bytes of UTF-8)
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelId {
    len: u8,
    data: [u8; MAX_CHANNEL_ID_LEN],
}

impl ChannelId {
    /// Create from a string slice, `None` when it does not fit
    pub fn new(s: &str) -> Option<Self> {
        let bytes = s.as_bytes();
        if bytes.is_empty() || bytes.len() > MAX_CHANNEL_ID_LEN {
            return None;
        }

        let mut data = [0u8; MAX_CHANNEL_ID_LEN];
        data[..bytes.len()].copy_from_slice(bytes);

        Some(Self {
            len: bytes.len() as u8,
            data,
        })
    }

    /// Build from a literal at compile time
    ///
    /// Intended for `const` items; an empty or over-long literal fails the
    /// build.
    pub const fn from_static(s: &'static str) -> Self {
        let bytes = s.as_bytes();
        assert!(!bytes.is_empty() && bytes.len() <= MAX_CHANNEL_ID_LEN);

        let mut data = [0u8; MAX_CHANNEL_ID_LEN];
        let mut i = 0;
        while i < bytes.len() {
            data[i] = bytes[i];
            i += 1;
        }

        Self {
            len: bytes.len() as u8,
            data,
        }
    }

    /// Get as string slice
    pub fn as_str(&self) -> &str {
        // Only built from &str in new(), always valid UTF-8
        core::str::from_utf8(&self.data[..self.len as usize]).unwrap_or("")
    }
}

impl fmt::Debug for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ChannelId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ChannelId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = alloc::string::String::deserialize(deserializer)?;
        ChannelId::new(&s).ok_or_else(|| {
            serde::de::Error::invalid_length(s.len(), &"a channel id of 1 to 15 bytes")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_id_roundtrips_text() {
        let id = ChannelId::new("vrms_1_r").unwrap();
        assert_eq!(id.as_str(), "vrms_1_r");
        assert_eq!(alloc::format!("{}", id), "vrms_1_r");
    }

    #[test]
    fn channel_id_rejects_bad_lengths() {
        assert!(ChannelId::new("").is_none());
        assert!(ChannelId::new("hydrostatic_value_extra").is_none());
        assert!(ChannelId::new("hydrostatic_val").is_some());
    }

    #[test]
    fn kind_units() {
        assert_eq!(ChannelKind::Voltage.unit(), "V");
        assert_eq!(ChannelKind::WaterLevel.name(), "water_level");
    }
}
