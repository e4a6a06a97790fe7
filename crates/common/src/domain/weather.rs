use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Timestamp as published by a station.
///
/// Older firmware sends epoch seconds, newer firmware sends a formatted
/// date-time string. Normalization happens in the record transformer.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawTimestamp {
    EpochSeconds(i64),
    FractionalEpochSeconds(f64),
    Text(String),
}

/// One decoded weather-station reading, exactly as received from the bus
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawRecord {
    #[serde(alias = "datetime")]
    pub timestamp: RawTimestamp,
    pub rain: f64,
    #[serde(alias = "wind")]
    pub wind_speed: f64,
    /// Resistance reading of the wind vane, expected within 0..=10000
    #[serde(alias = "wind_direction")]
    pub wind_direction_raw: i64,
    #[serde(alias = "tmp_temp")]
    pub temperature_celsius: f64,
    pub pressure: f64,
    pub humidity: f64,
}

/// Compass category derived from a wind vane resistance reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompassDirection {
    N,
    NE,
    E,
    SE,
    S,
    SW,
}

impl CompassDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompassDirection::N => "N",
            CompassDirection::NE => "NE",
            CompassDirection::E => "E",
            CompassDirection::SE => "SE",
            CompassDirection::S => "S",
            CompassDirection::SW => "SW",
        }
    }
}

impl fmt::Display for CompassDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A raw reading plus the quantities derived from it.
///
/// Built only by the record transformer; every field is a pure function of
/// the originating [`RawRecord`].
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedRecord {
    /// Normalized timestamp, UTC without zone information
    pub datetime: NaiveDateTime,
    pub rain: f64,
    pub wind_speed: f64,
    /// `None` when the raw reading falls outside the classification table
    pub wind_direction_compass: Option<CompassDirection>,
    /// Kept verbatim so classification can be audited or redone later
    pub wind_direction_raw: i64,
    pub temperature_celsius: f64,
    pub temperature_fahrenheit: f64,
    pub pressure: f64,
    pub humidity: f64,
}

/// Records flushed together from one accumulation window, in arrival order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Batch {
    sequence: u64,
    records: Vec<EnrichedRecord>,
}

impl Batch {
    pub fn new(sequence: u64, records: Vec<EnrichedRecord>) -> Self {
        Self { sequence, records }
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn records(&self) -> &[EnrichedRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
