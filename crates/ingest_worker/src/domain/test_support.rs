use async_trait::async_trait;
use chrono::NaiveDate;
use common::domain::{Batch, BatchSink, DomainError, DomainResult, EnrichedRecord, SinkDurability};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub(crate) type CallLog = Arc<Mutex<Vec<String>>>;

/// Sink that remembers every batch it was given
pub(crate) struct RecordingSink {
    name: String,
    durability: SinkDurability,
    fail: bool,
    delay: Option<Duration>,
    calls: CallLog,
    received: Mutex<Vec<Batch>>,
}

impl RecordingSink {
    pub(crate) fn new(name: &str, durability: SinkDurability, calls: CallLog) -> Self {
        Self {
            name: name.to_string(),
            durability,
            fail: false,
            delay: None,
            calls,
            received: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn durable(name: &str) -> Self {
        Self::new(name, SinkDurability::Durable, CallLog::default())
    }

    pub(crate) fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub(crate) fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn received(&self) -> Vec<Batch> {
        self.received.lock().unwrap().clone()
    }
}

#[async_trait]
impl BatchSink for RecordingSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn durability(&self) -> SinkDurability {
        self.durability
    }

    async fn write_batch(&self, batch: &Batch) -> DomainResult<()> {
        self.calls.lock().unwrap().push(self.name.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(DomainError::RepositoryError(anyhow::anyhow!("disk full")));
        }
        self.received.lock().unwrap().push(batch.clone());
        Ok(())
    }
}

pub(crate) fn enriched(wind_direction_raw: i64) -> EnrichedRecord {
    EnrichedRecord {
        datetime: NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap(),
        rain: 0.0,
        wind_speed: 1.0,
        wind_direction_compass: None,
        wind_direction_raw,
        temperature_celsius: 10.0,
        temperature_fahrenheit: 50.0,
        pressure: 1000.0,
        humidity: 50.0,
    }
}

pub(crate) fn batch_of(sequence: u64, size: usize) -> Batch {
    Batch::new(sequence, (0..size).map(|i| enriched(i as i64)).collect())
}

/// JSON payload as published by a station
pub(crate) fn reading(timestamp: i64, wind_direction: i64, celsius: f64) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({
        "timestamp": timestamp,
        "rain": 0.0,
        "wind_speed": 2.5,
        "wind_direction_raw": wind_direction,
        "temperature_celsius": celsius,
        "pressure": 1013.0,
        "humidity": 60.0
    }))
    .unwrap()
}
