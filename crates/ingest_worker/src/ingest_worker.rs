use crate::domain::{
    PipelineConfig, PipelineController, PipelineState, RecordTransformer, SinkRouter,
};
use crate::sinks::{CsvArchiveSink, LiveViewSink, WarehouseSink};
use anyhow::Context;
use common::domain::{ArchivePeriod, BusSubscriber, WarehouseRepository};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub struct IngestWorkerConfig {
    pub pipeline: PipelineConfig,
    pub archive_base_path: PathBuf,
    pub archive_period: ArchivePeriod,
    /// Live view file; no live view sink when unset
    pub live_path: Option<PathBuf>,
    pub sink_timeout: Option<Duration>,
}

/// Wires the sinks and the pipeline controller for one weather topic
pub struct IngestWorker {
    controller: PipelineController,
}

impl IngestWorker {
    pub fn new(
        subscriber: Arc<dyn BusSubscriber>,
        warehouse: Option<Arc<dyn WarehouseRepository>>,
        config: IngestWorkerConfig,
    ) -> Self {
        info!("Initializing weather ingest worker");

        let mut router = SinkRouter::new().with_sink(Arc::new(CsvArchiveSink::new(
            config.archive_base_path,
            config.archive_period,
        )));

        if let Some(live_path) = config.live_path {
            router = router.with_sink(Arc::new(LiveViewSink::new(live_path)));
        }

        if let Some(repository) = warehouse {
            router = router.with_sink(Arc::new(WarehouseSink::new(repository)));
        }

        if let Some(timeout) = config.sink_timeout {
            router = router.with_sink_timeout(timeout);
        }

        info!(sinks = ?router.sink_names(), "Weather ingest worker initialized");

        let controller = PipelineController::new(
            subscriber,
            RecordTransformer::new(),
            Arc::new(router),
            config.pipeline,
        );

        Self { controller }
    }

    pub fn watch_state(&self) -> watch::Receiver<PipelineState> {
        self.controller.watch_state()
    }

    /// Run the pipeline until `ctx` is cancelled and the drain completes
    pub async fn run(self, ctx: CancellationToken) -> anyhow::Result<()> {
        let stats = self
            .controller
            .run(ctx)
            .await
            .context("weather ingest pipeline failed")?;

        info!(
            records_received = stats.records_received,
            batches_flushed = stats.batches_flushed,
            "Weather ingest worker finished"
        );
        Ok(())
    }
}
