use anyhow::{Context, Result};
use common::domain::EnrichedRecord;
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::path::Path;

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// One archive line. Field order is the on-disk column order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArchiveRow {
    pub datetime: String,
    pub rain: f64,
    pub wind_speed: f64,
    pub wind_direction_compass: Option<&'static str>,
    pub temperature_fahrenheit: f64,
    pub pressure: f64,
    pub humidity: f64,
    pub wind_direction_raw: i64,
}

impl From<&EnrichedRecord> for ArchiveRow {
    fn from(record: &EnrichedRecord) -> Self {
        Self {
            datetime: record.datetime.format(DATETIME_FORMAT).to_string(),
            rain: record.rain,
            wind_speed: record.wind_speed,
            wind_direction_compass: record.wind_direction_compass.map(|c| c.as_str()),
            temperature_fahrenheit: record.temperature_fahrenheit,
            pressure: record.pressure,
            humidity: record.humidity,
            wind_direction_raw: record.wind_direction_raw,
        }
    }
}

/// Append rows to `path` without a header line, creating parent directories.
/// Blocking; call from `spawn_blocking`.
pub fn append_rows(path: &Path, rows: &[ArchiveRow]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;

    let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
    for row in rows {
        writer
            .serialize(row)
            .with_context(|| format!("failed to write row to {}", path.display()))?;
    }
    writer
        .flush()
        .with_context(|| format!("failed to flush {}", path.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use common::domain::CompassDirection;

    fn record(millis: u32, compass: Option<CompassDirection>) -> EnrichedRecord {
        EnrichedRecord {
            datetime: NaiveDate::from_ymd_opt(2024, 5, 1)
                .unwrap()
                .and_hms_milli_opt(9, 15, 0, millis)
                .unwrap(),
            rain: 0.5,
            wind_speed: 3.0,
            wind_direction_compass: compass,
            wind_direction_raw: 2000,
            temperature_celsius: 20.0,
            temperature_fahrenheit: 68.0,
            pressure: 1001.5,
            humidity: 47.0,
        }
    }

    #[test]
    fn test_rows_are_appended_without_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.csv");

        append_rows(&path, &[ArchiveRow::from(&record(0, Some(CompassDirection::N)))]).unwrap();
        append_rows(&path, &[ArchiveRow::from(&record(250, None))]).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(
            lines,
            vec![
                "2024-05-01 09:15:00,0.5,3.0,N,68.0,1001.5,47.0,2000",
                "2024-05-01 09:15:00.250,0.5,3.0,,68.0,1001.5,47.0,2000",
            ]
        );
    }
}
