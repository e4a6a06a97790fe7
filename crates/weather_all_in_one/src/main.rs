mod config;

use anyhow::Context;
use common::clickhouse::ClickHouseClient;
use common::domain::WarehouseRepository;
use common::nats::NatsClient;
use common::telemetry::{init_telemetry, shutdown_telemetry};
use crate::config::{ServiceConfig, Settings, WarehouseSettings};
use ingest_worker::clickhouse::ClickHouseWarehouseRepository;
use ingest_worker::ingest_worker::IngestWorker;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use weather_runner::Runner;

#[tokio::main]
async fn main() {
    let config = match ServiceConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let settings = match config.validate() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    let telemetry_providers = match init_telemetry(&settings.telemetry) {
        Ok(providers) => providers,
        Err(e) => {
            eprintln!("Failed to initialize telemetry: {:#}", e);
            std::process::exit(1);
        }
    };

    info!(
        nats_url = %settings.nats_url,
        topic = %settings.worker.pipeline.subscription.topic,
        warehouse_enabled = settings.warehouse.is_some(),
        "Starting weather-all-in-one service"
    );
    debug!(
        flush_trigger = %config.flush_trigger,
        archive_base_path = %config.archive_base_path,
        live_path = %config.live_path,
        "Pipeline configuration"
    );

    let Settings {
        nats_url,
        worker: worker_config,
        warehouse,
        startup_timeout,
        shutdown_timeout,
        ..
    } = settings;

    let (nats_client, warehouse_repository) =
        match initialize_dependencies(&nats_url, warehouse.as_ref(), startup_timeout).await {
            Ok(deps) => deps,
            Err(e) => {
                error!("Failed to initialize dependencies: {:#}", e);
                shutdown_telemetry(telemetry_providers);
                std::process::exit(1);
            }
        };

    let worker = IngestWorker::new(
        nats_client.create_subscriber(),
        warehouse_repository,
        worker_config,
    );

    let outcome = Runner::new()
        .with_app_process("ingest-pipeline", move |ctx| async move {
            run_with_drain_limit(worker, ctx, shutdown_timeout).await
        })
        .with_closer(move || async move {
            info!("Running cleanup tasks...");
            nats_client.close().await?;
            info!("Cleanup complete");
            Ok(())
        })
        .with_closer_timeout(shutdown_timeout)
        .run()
        .await;

    shutdown_telemetry(telemetry_providers);
    std::process::exit(outcome.exit_code());
}

/// Run the worker, failing if the drain after cancellation outlasts `limit`
async fn run_with_drain_limit(
    worker: IngestWorker,
    ctx: CancellationToken,
    limit: Duration,
) -> anyhow::Result<()> {
    let deadline = {
        let ctx = ctx.clone();
        async move {
            ctx.cancelled().await;
            tokio::time::sleep(limit).await;
        }
    };

    tokio::select! {
        result = worker.run(ctx) => result,
        _ = deadline => Err(anyhow::anyhow!("pipeline did not drain within {:?}", limit)),
    }
}

async fn initialize_dependencies(
    nats_url: &str,
    warehouse: Option<&WarehouseSettings>,
    startup_timeout: Duration,
) -> anyhow::Result<(NatsClient, Option<Arc<dyn WarehouseRepository>>)> {
    info!("Initializing NATS...");
    let nats_client = NatsClient::connect(nats_url, startup_timeout).await?;

    let warehouse_repository = match warehouse {
        Some(settings) => {
            info!("Initializing ClickHouse...");
            let client = create_clickhouse_client(settings, startup_timeout).await?;
            let repository: Arc<dyn WarehouseRepository> = Arc::new(
                ClickHouseWarehouseRepository::new(client, settings.table.clone()),
            );
            Some(repository)
        }
        None => {
            info!("Warehouse sink disabled");
            None
        }
    };

    Ok((nats_client, warehouse_repository))
}

async fn create_clickhouse_client(
    settings: &WarehouseSettings,
    startup_timeout: Duration,
) -> anyhow::Result<ClickHouseClient> {
    let client = ClickHouseClient::new(
        &settings.url,
        &settings.database,
        &settings.username,
        &settings.password,
    );
    tokio::time::timeout(startup_timeout, client.ping())
        .await
        .context("timed out waiting for ClickHouse")??;
    Ok(client)
}
