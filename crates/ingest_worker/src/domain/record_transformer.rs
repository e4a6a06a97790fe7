use crate::domain::classifier::classify;
use crate::domain::unit_converter::celsius_to_fahrenheit;
use chrono::{DateTime, NaiveDateTime};
use common::domain::{DomainError, DomainResult, EnrichedRecord, RawRecord, RawTimestamp};
use tracing::warn;

const TEXT_TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Turns decoded station readings into enriched records.
///
/// Stateless: the output depends only on the input, so records can be
/// replayed or retried freely.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordTransformer;

impl RecordTransformer {
    pub fn new() -> Self {
        Self
    }

    /// Decode a JSON bus payload into a raw record
    pub fn decode(&self, payload: &[u8]) -> DomainResult<RawRecord> {
        serde_json::from_slice(payload).map_err(|e| DomainError::MalformedRecord(e.to_string()))
    }

    /// Decode then enrich a JSON bus payload
    pub fn transform_payload(&self, payload: &[u8]) -> DomainResult<EnrichedRecord> {
        let raw = self.decode(payload)?;
        self.transform(&raw)
    }

    pub fn transform(&self, raw: &RawRecord) -> DomainResult<EnrichedRecord> {
        let datetime = normalize_timestamp(&raw.timestamp)?;

        let wind_direction_compass = classify(raw.wind_direction_raw);
        if wind_direction_compass.is_none() {
            warn!(
                wind_direction_raw = raw.wind_direction_raw,
                %datetime,
                "wind vane reading outside classification table, keeping record unclassified"
            );
        }

        Ok(EnrichedRecord {
            datetime,
            rain: raw.rain,
            wind_speed: raw.wind_speed,
            wind_direction_compass,
            wind_direction_raw: raw.wind_direction_raw,
            temperature_celsius: raw.temperature_celsius,
            temperature_fahrenheit: celsius_to_fahrenheit(raw.temperature_celsius),
            pressure: raw.pressure,
            humidity: raw.humidity,
        })
    }
}

/// Convert any accepted timestamp representation to a naive UTC date-time
pub fn normalize_timestamp(timestamp: &RawTimestamp) -> DomainResult<NaiveDateTime> {
    match timestamp {
        RawTimestamp::EpochSeconds(secs) => from_epoch(*secs, 0),
        RawTimestamp::FractionalEpochSeconds(value) => {
            if !value.is_finite() {
                return Err(DomainError::MalformedRecord(format!(
                    "timestamp {} is not a finite number",
                    value
                )));
            }
            let secs = value.floor();
            let nanos = (((value - secs) * 1e9).round() as u32).min(999_999_999);
            from_epoch(secs as i64, nanos)
        }
        RawTimestamp::Text(text) => parse_text_timestamp(text),
    }
}

fn from_epoch(secs: i64, nanos: u32) -> DomainResult<NaiveDateTime> {
    DateTime::from_timestamp(secs, nanos)
        .map(|dt| dt.naive_utc())
        .ok_or_else(|| DomainError::MalformedRecord(format!("epoch timestamp {} out of range", secs)))
}

fn parse_text_timestamp(text: &str) -> DomainResult<NaiveDateTime> {
    let text = text.trim();

    if let Ok(secs) = text.parse::<i64>() {
        return from_epoch(secs, 0);
    }

    if let Ok(with_offset) = DateTime::parse_from_rfc3339(text) {
        return Ok(with_offset.naive_utc());
    }

    TEXT_TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .ok_or_else(|| DomainError::MalformedRecord(format!("unrecognized timestamp '{}'", text)))
}
