use async_trait::async_trait;
use chrono::{DateTime, Utc};
use clickhouse::Row;
use common::clickhouse::ClickHouseClient;
use common::domain::{Batch, DomainError, DomainResult, EnrichedRecord, WarehouseRepository};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

/// Row layout of the `weather_readings` table.
/// `datetime` is stored as DateTime64(3) so sub-second readings survive.
#[derive(Debug, Clone, Row, Serialize, Deserialize)]
pub struct WeatherRow {
    #[serde(with = "clickhouse::serde::chrono::datetime64::millis")]
    pub datetime: DateTime<Utc>,
    pub rain: f64,
    pub wind_speed: f64,
    pub wind_direction_compass: Option<String>,
    pub wind_direction_raw: i64,
    pub temperature_celsius: f64,
    pub temperature_fahrenheit: f64,
    pub pressure: f64,
    pub humidity: f64,
}

impl From<&EnrichedRecord> for WeatherRow {
    fn from(record: &EnrichedRecord) -> Self {
        WeatherRow {
            datetime: record.datetime.and_utc(),
            rain: record.rain,
            wind_speed: record.wind_speed,
            wind_direction_compass: record
                .wind_direction_compass
                .map(|compass| compass.as_str().to_string()),
            wind_direction_raw: record.wind_direction_raw,
            temperature_celsius: record.temperature_celsius,
            temperature_fahrenheit: record.temperature_fahrenheit,
            pressure: record.pressure,
            humidity: record.humidity,
        }
    }
}

/// ClickHouse implementation of WarehouseRepository. Insert-only.
#[derive(Clone)]
pub struct ClickHouseWarehouseRepository {
    client: ClickHouseClient,
    table: String,
}

impl ClickHouseWarehouseRepository {
    pub fn new(client: ClickHouseClient, table: String) -> Self {
        Self { client, table }
    }
}

#[async_trait]
impl WarehouseRepository for ClickHouseWarehouseRepository {
    async fn load_append(&self, batch: &Batch) -> DomainResult<()> {
        if batch.is_empty() {
            debug!("no records to load, skipping");
            return Ok(());
        }

        debug!(
            batch = batch.sequence(),
            rows = batch.len(),
            table = %self.table,
            "loading batch into ClickHouse"
        );

        let rows: Vec<WeatherRow> = batch.records().iter().map(WeatherRow::from).collect();

        let mut insert = self
            .client
            .get_client()
            .insert::<WeatherRow>(&self.table)
            .await
            .map_err(|e| {
                error!("failed to create ClickHouse insert: {}", e);
                DomainError::RepositoryError(e.into())
            })?;

        for row in &rows {
            insert.write(row).await.map_err(|e| {
                error!("failed to write row to ClickHouse: {}", e);
                DomainError::RepositoryError(e.into())
            })?;
        }

        insert.end().await.map_err(|e| {
            error!("failed to finalize ClickHouse insert: {}", e);
            DomainError::RepositoryError(e.into())
        })?;

        debug!(rows_inserted = rows.len(), "batch loaded");

        Ok(())
    }
}
