use opentelemetry_sdk::trace::TracerProvider as SdkTracerProvider;
use std::str::FromStr;

/// Output format of the stdout log layer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" | "text" => Ok(LogFormat::Pretty),
            other => Err(format!("unknown log format '{}'", other)),
        }
    }
}

/// Configuration for telemetry initialization
#[derive(Clone, Debug)]
pub struct TelemetryConfig {
    pub service_name: String,
    pub log_level: String,
    pub log_format: LogFormat,
    pub otel_enabled: bool,
    pub otel_endpoint: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown-service".to_string(),
            log_level: "info".to_string(),
            log_format: LogFormat::Json,
            otel_enabled: false,
            otel_endpoint: "http://localhost:4317".to_string(),
        }
    }
}

/// Returned when trace export is enabled so pending spans can be flushed on exit
pub struct TelemetryProviders {
    pub tracer_provider: SdkTracerProvider,
}
