use common::domain::{
    ArchivePeriod, DomainError, DomainResult, FlushTrigger, OffsetPolicy, SubscribeRequest,
};
use common::telemetry::{LogFormat, TelemetryConfig};
use config::{Config, ConfigError, Environment};
use ingest_worker::{IngestWorkerConfig, PipelineConfig};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

const SERVICE_NAME: &str = "weather-all-in-one";
const MAX_CONSECUTIVE_POLL_FAILURES: u32 = 5;
const POLL_RETRY_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log output, json or pretty
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Export spans over OTLP
    #[serde(default)]
    pub otel_enabled: bool,

    #[serde(default = "default_otel_endpoint")]
    pub otel_endpoint: String,

    // NATS configuration
    #[serde(default = "default_nats_url")]
    pub nats_url: String,

    /// JetStream stream holding station readings
    #[serde(default = "default_nats_stream")]
    pub nats_stream: String,

    /// Subject the stations publish on
    #[serde(default = "default_nats_topic")]
    pub nats_topic: String,

    /// Durable consumer name; the bus stores the read position per group
    #[serde(default = "default_consumer_group")]
    pub consumer_group: String,

    /// earliest or latest
    #[serde(default = "default_offset_reset")]
    pub offset_reset: String,

    #[serde(default = "default_poll_batch_size")]
    pub poll_batch_size: usize,

    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,

    // Batching
    /// count:K or interval:T (seconds)
    #[serde(default = "default_flush_trigger")]
    pub flush_trigger: String,

    #[serde(default = "default_max_batch_records")]
    pub max_batch_records: usize,

    #[serde(default = "default_delivery_queue_capacity")]
    pub delivery_queue_capacity: usize,

    // Sinks
    #[serde(default = "default_archive_base_path")]
    pub archive_base_path: String,

    /// monthly or daily
    #[serde(default = "default_archive_period")]
    pub archive_period: String,

    /// Empty disables the live view sink
    #[serde(default = "default_live_path")]
    pub live_path: String,

    /// 0 disables the per-sink timeout
    #[serde(default = "default_sink_timeout_secs")]
    pub sink_timeout_secs: u64,

    // ClickHouse configuration
    #[serde(default)]
    pub warehouse_enabled: bool,

    #[serde(default = "default_clickhouse_url")]
    pub clickhouse_url: String,

    #[serde(default = "default_clickhouse_database")]
    pub clickhouse_database: String,

    #[serde(default = "default_clickhouse_username")]
    pub clickhouse_username: String,

    #[serde(default)]
    pub clickhouse_password: String,

    #[serde(default = "default_clickhouse_table")]
    pub clickhouse_table: String,

    // Lifecycle
    /// Startup timeout for initialization operations in seconds
    #[serde(default = "default_startup_timeout_secs")]
    pub startup_timeout_secs: u64,

    /// Upper bound on drain and cleanup after a shutdown signal
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_otel_endpoint() -> String {
    "http://localhost:4317".to_string()
}

// NATS defaults
fn default_nats_url() -> String {
    "nats://localhost:4222".to_string()
}

fn default_nats_stream() -> String {
    "weather".to_string()
}

fn default_nats_topic() -> String {
    "weather-raw".to_string()
}

fn default_consumer_group() -> String {
    "main-consumer".to_string()
}

fn default_offset_reset() -> String {
    "latest".to_string()
}

fn default_poll_batch_size() -> usize {
    100
}

fn default_poll_timeout_ms() -> u64 {
    1_000
}

fn default_flush_trigger() -> String {
    "interval:60".to_string()
}

fn default_max_batch_records() -> usize {
    10_000
}

fn default_delivery_queue_capacity() -> usize {
    16
}

fn default_archive_base_path() -> String {
    "./data/archive".to_string()
}

fn default_archive_period() -> String {
    "monthly".to_string()
}

fn default_live_path() -> String {
    "./data/weather-station-live.csv".to_string()
}

fn default_sink_timeout_secs() -> u64 {
    10
}

// ClickHouse defaults
fn default_clickhouse_url() -> String {
    "http://localhost:8123".to_string()
}

fn default_clickhouse_database() -> String {
    "weather".to_string()
}

fn default_clickhouse_username() -> String {
    "default".to_string()
}

fn default_clickhouse_table() -> String {
    "weather_readings".to_string()
}

fn default_startup_timeout_secs() -> u64 {
    30
}

fn default_shutdown_timeout_secs() -> u64 {
    30
}

/// Connection settings for the warehouse, present only when it is enabled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarehouseSettings {
    pub url: String,
    pub database: String,
    pub username: String,
    pub password: String,
    pub table: String,
}

/// Everything the service needs, parsed and checked
pub struct Settings {
    pub telemetry: TelemetryConfig,
    pub nats_url: String,
    pub worker: IngestWorkerConfig,
    pub warehouse: Option<WarehouseSettings>,
    pub startup_timeout: Duration,
    pub shutdown_timeout: Duration,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Environment::with_prefix("WEATHER"))
            .build()?
            .try_deserialize()
    }

    /// Parse every textual setting, failing on the first invalid one
    pub fn validate(&self) -> DomainResult<Settings> {
        let log_format: LogFormat = self
            .log_format
            .parse()
            .map_err(DomainError::ConfigurationError)?;
        let offset_policy: OffsetPolicy = self.offset_reset.parse()?;
        let flush_trigger: FlushTrigger = self.flush_trigger.parse()?;
        let archive_period: ArchivePeriod = self.archive_period.parse()?;

        require_non_empty("nats_url", &self.nats_url)?;
        require_non_empty("nats_stream", &self.nats_stream)?;
        require_non_empty("nats_topic", &self.nats_topic)?;
        require_non_empty("consumer_group", &self.consumer_group)?;
        require_non_empty("archive_base_path", &self.archive_base_path)?;
        require_positive("poll_batch_size", self.poll_batch_size)?;
        require_positive("poll_timeout_ms", self.poll_timeout_ms as usize)?;
        require_positive("max_batch_records", self.max_batch_records)?;
        require_positive("delivery_queue_capacity", self.delivery_queue_capacity)?;

        let warehouse = if self.warehouse_enabled {
            require_non_empty("clickhouse_url", &self.clickhouse_url)?;
            require_non_empty("clickhouse_database", &self.clickhouse_database)?;
            require_non_empty("clickhouse_table", &self.clickhouse_table)?;
            Some(WarehouseSettings {
                url: self.clickhouse_url.clone(),
                database: self.clickhouse_database.clone(),
                username: self.clickhouse_username.clone(),
                password: self.clickhouse_password.clone(),
                table: self.clickhouse_table.clone(),
            })
        } else {
            None
        };

        let live_path = match self.live_path.trim() {
            "" => None,
            path => Some(PathBuf::from(path)),
        };

        let sink_timeout = match self.sink_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        Ok(Settings {
            telemetry: TelemetryConfig {
                service_name: SERVICE_NAME.to_string(),
                log_level: self.log_level.clone(),
                log_format,
                otel_enabled: self.otel_enabled,
                otel_endpoint: self.otel_endpoint.clone(),
            },
            nats_url: self.nats_url.clone(),
            worker: IngestWorkerConfig {
                pipeline: PipelineConfig {
                    subscription: SubscribeRequest {
                        stream: self.nats_stream.clone(),
                        topic: self.nats_topic.clone(),
                        group_id: self.consumer_group.clone(),
                        offset_policy,
                    },
                    flush_trigger,
                    max_batch_records: self.max_batch_records,
                    poll_batch_size: self.poll_batch_size,
                    poll_timeout: Duration::from_millis(self.poll_timeout_ms),
                    delivery_queue_capacity: self.delivery_queue_capacity,
                    max_consecutive_poll_failures: MAX_CONSECUTIVE_POLL_FAILURES,
                    poll_retry_backoff: POLL_RETRY_BACKOFF,
                },
                archive_base_path: PathBuf::from(&self.archive_base_path),
                archive_period,
                live_path,
                sink_timeout,
            },
            warehouse,
            startup_timeout: Duration::from_secs(self.startup_timeout_secs),
            shutdown_timeout: Duration::from_secs(self.shutdown_timeout_secs),
        })
    }
}

fn require_non_empty(name: &str, value: &str) -> DomainResult<()> {
    if value.trim().is_empty() {
        return Err(DomainError::ConfigurationError(format!("{} must not be empty", name)));
    }
    Ok(())
}

fn require_positive(name: &str, value: usize) -> DomainResult<()> {
    if value == 0 {
        return Err(DomainError::ConfigurationError(format!("{} must be greater than zero", name)));
    }
    Ok(())
}
