use anyhow::Result;
use opentelemetry::{trace::TracerProvider, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    propagation::TraceContextPropagator,
    runtime,
    trace::{RandomIdGenerator, Sampler, TracerProvider as SdkTracerProvider},
    Resource,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use super::{LogFormat, TelemetryConfig, TelemetryProviders};

/// Initialize the global tracing subscriber
///
/// `RUST_LOG` takes precedence over the configured log level.
/// JSON output carries the span list and current span on every event so that
/// batch sequence numbers and sink names show up next to each log line.
/// With `otel_enabled`, spans are also exported over OTLP and the returned
/// providers must be handed to [`shutdown_telemetry`] before exit.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<Option<TelemetryProviders>> {
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.log_level))?;

    let providers = if config.otel_enabled {
        Some(build_providers(config)?)
    } else {
        None
    };
    let otel_layer = providers.as_ref().map(|providers| {
        let tracer = providers.tracer_provider.tracer("weather-ingest");
        tracing_opentelemetry::layer().with_tracer(tracer)
    });

    match config.log_format {
        LogFormat::Json => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_span_list(true)
                .with_current_span(true);

            tracing_subscriber::registry()
                .with(env_filter)
                .with(otel_layer)
                .with(fmt_layer)
                .try_init()?;
        }
        LogFormat::Pretty => {
            let fmt_layer = tracing_subscriber::fmt::layer().with_target(true);

            tracing_subscriber::registry()
                .with(env_filter)
                .with(otel_layer)
                .with(fmt_layer)
                .try_init()?;
        }
    }

    tracing::debug!(
        service = %config.service_name,
        otel_enabled = config.otel_enabled,
        "telemetry initialized"
    );
    Ok(providers)
}

fn build_providers(config: &TelemetryConfig) -> Result<TelemetryProviders> {
    opentelemetry::global::set_text_map_propagator(TraceContextPropagator::new());

    let resource = Resource::new(vec![KeyValue::new(
        opentelemetry_semantic_conventions::resource::SERVICE_NAME,
        config.service_name.clone(),
    )]);

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(&config.otel_endpoint)
        .build()?;

    let tracer_provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter, runtime::Tokio)
        .with_sampler(Sampler::AlwaysOn)
        .with_id_generator(RandomIdGenerator::default())
        .with_resource(resource)
        .build();

    Ok(TelemetryProviders { tracer_provider })
}

/// Flush and stop trace export
pub fn shutdown_telemetry(providers: Option<TelemetryProviders>) {
    if let Some(providers) = providers {
        if let Err(e) = providers.tracer_provider.shutdown() {
            eprintln!("Error shutting down tracer provider: {:?}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_telemetry_config_default() {
        let config = TelemetryConfig::default();
        assert_eq!(config.service_name, "unknown-service");
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Json);
        assert!(!config.otel_enabled);
        assert_eq!(config.otel_endpoint, "http://localhost:4317");
    }

    #[test]
    fn test_log_format_parsing() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("Pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_shutdown_without_export_is_noop() {
        shutdown_telemetry(None);
    }
}
