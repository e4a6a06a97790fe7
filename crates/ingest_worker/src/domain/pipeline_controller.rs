use crate::domain::batch_accumulator::BatchAccumulator;
use crate::domain::record_transformer::RecordTransformer;
use crate::domain::sink_router::SinkRouter;
use anyhow::anyhow;
use common::domain::{
    Batch, BusMessage, BusSubscriber, BusSubscription, DomainError, DomainResult, FlushTrigger,
    SinkDurability, SinkResult, SubscribeRequest,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Lifecycle of one pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Subscribing,
    Running,
    Draining,
    Stopped,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub subscription: SubscribeRequest,
    pub flush_trigger: FlushTrigger,
    /// Hard cap on records per window when flushing on an interval
    pub max_batch_records: usize,
    pub poll_batch_size: usize,
    pub poll_timeout: Duration,
    /// Flushed batches allowed to wait for sink delivery before the consume loop blocks
    pub delivery_queue_capacity: usize,
    /// Consecutive poll errors tolerated before the subscription is considered lost
    pub max_consecutive_poll_failures: u32,
    pub poll_retry_backoff: Duration,
}

/// Counters reported when a run finishes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub records_received: u64,
    pub records_skipped: u64,
    pub records_dropped_on_shutdown: u64,
    pub batches_flushed: u64,
    pub failed_sink_deliveries: u64,
}

#[derive(Debug, Default)]
struct DeliveryStats {
    batches: u64,
    failed_sink_deliveries: u64,
}

type SharedAccumulator = Arc<Mutex<BatchAccumulator>>;

/// Owns the consume → transform → accumulate → flush loop.
///
/// Records are processed one at a time in arrival order. Flushed batches go
/// through a bounded channel to the durable delivery task, so slow sinks never
/// stall polling until that queue is full. Once a batch is on disk it is handed
/// to a second task for the best-effort sinks; a stalled warehouse only ever
/// backs up its own queue.
pub struct PipelineController {
    subscriber: Arc<dyn BusSubscriber>,
    transformer: RecordTransformer,
    router: Arc<SinkRouter>,
    config: PipelineConfig,
    state: watch::Sender<PipelineState>,
}

impl PipelineController {
    pub fn new(
        subscriber: Arc<dyn BusSubscriber>,
        transformer: RecordTransformer,
        router: Arc<SinkRouter>,
        config: PipelineConfig,
    ) -> Self {
        let (state, _) = watch::channel(PipelineState::Idle);
        Self {
            subscriber,
            transformer,
            router,
            config,
            state,
        }
    }

    pub fn state(&self) -> PipelineState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<PipelineState> {
        self.state.subscribe()
    }

    fn transition(&self, next: PipelineState) {
        let previous = self.state.send_replace(next);
        debug!(from = ?previous, to = ?next, "pipeline state change");
    }

    /// Run until `ctx` is cancelled, then drain and release the subscription.
    ///
    /// Fails with `SubscriptionFailure` when the subscription cannot be
    /// established or is lost; data already accumulated is still flushed first.
    pub async fn run(&self, ctx: CancellationToken) -> DomainResult<PipelineStats> {
        self.transition(PipelineState::Subscribing);
        info!(
            stream = %self.config.subscription.stream,
            topic = %self.config.subscription.topic,
            group = %self.config.subscription.group_id,
            offset_policy = ?self.config.subscription.offset_policy,
            "subscribing"
        );

        let mut subscription = match self.subscriber.subscribe(&self.config.subscription).await {
            Ok(subscription) => subscription,
            Err(e) => {
                error!(error = %format!("{:#}", e), "failed to establish subscription");
                self.transition(PipelineState::Stopped);
                return Err(DomainError::SubscriptionFailure(format!("{:#}", e)));
            }
        };

        self.transition(PipelineState::Running);
        info!(sinks = ?self.router.sink_names(), trigger = ?self.config.flush_trigger, "pipeline running");

        let accumulator: SharedAccumulator = Arc::new(Mutex::new(
            BatchAccumulator::new(self.config.flush_trigger)
                .with_max_records(self.config.max_batch_records),
        ));
        let queue_capacity = self.config.delivery_queue_capacity.max(1);
        let (batch_tx, batch_rx) = mpsc::channel(queue_capacity);
        let (best_effort_tx, best_effort) = if self.router.sink_count(SinkDurability::BestEffort) > 0 {
            let (tx, rx) = mpsc::channel(queue_capacity);
            (Some(tx), Some(tokio::spawn(run_best_effort_delivery(self.router.clone(), rx))))
        } else {
            (None, None)
        };
        let delivery = tokio::spawn(run_durable_delivery(
            self.router.clone(),
            batch_rx,
            best_effort_tx,
        ));

        let timer_ctx = ctx.child_token();
        let timer = match self.config.flush_trigger {
            FlushTrigger::Interval(period) => Some(tokio::spawn(run_interval_flush(
                accumulator.clone(),
                batch_tx.clone(),
                period,
                timer_ctx.clone(),
            ))),
            FlushTrigger::Count(_) => None,
        };

        let mut stats = PipelineStats::default();
        let consumed = self
            .consume(&ctx, &mut *subscription, &accumulator, &batch_tx, &mut stats)
            .await;

        self.transition(PipelineState::Draining);
        info!("draining pipeline");

        timer_ctx.cancel();
        if let Some(timer) = timer {
            if let Err(e) = timer.await {
                error!(error = %e, "flush timer task failed");
            }
        }

        {
            let mut accumulator = accumulator.lock().await;
            if let Err(e) = flush_into(&mut accumulator, &batch_tx).await {
                error!(error = %e, "final flush could not be handed to sinks");
            }
        }
        drop(batch_tx);

        match delivery.await {
            Ok(delivered) => {
                stats.batches_flushed = delivered.batches;
                stats.failed_sink_deliveries += delivered.failed_sink_deliveries;
            }
            Err(e) => error!(error = %e, "durable delivery task failed"),
        }

        // Bounded by the per-sink timeout when one is configured
        if let Some(best_effort) = best_effort {
            match best_effort.await {
                Ok(delivered) => stats.failed_sink_deliveries += delivered.failed_sink_deliveries,
                Err(e) => error!(error = %e, "best-effort delivery task failed"),
            }
        }

        if let Err(e) = subscription.close().await {
            warn!(error = %format!("{:#}", e), "failed to release subscription");
        }

        self.transition(PipelineState::Stopped);
        info!(
            records_received = stats.records_received,
            records_skipped = stats.records_skipped,
            records_dropped_on_shutdown = stats.records_dropped_on_shutdown,
            batches_flushed = stats.batches_flushed,
            failed_sink_deliveries = stats.failed_sink_deliveries,
            "pipeline stopped"
        );

        consumed.map(|_| stats)
    }

    async fn consume(
        &self,
        ctx: &CancellationToken,
        subscription: &mut dyn BusSubscription,
        accumulator: &SharedAccumulator,
        batch_tx: &mpsc::Sender<Batch>,
        stats: &mut PipelineStats,
    ) -> DomainResult<()> {
        let mut consecutive_failures = 0u32;

        loop {
            let polled = tokio::select! {
                biased;
                _ = ctx.cancelled() => break,
                polled = subscription.poll(self.config.poll_batch_size, self.config.poll_timeout) => polled,
            };

            let messages = match polled {
                Ok(messages) => {
                    consecutive_failures = 0;
                    messages
                }
                Err(e) => {
                    consecutive_failures += 1;
                    warn!(
                        error = %format!("{:#}", e),
                        consecutive_failures,
                        "failed to poll bus"
                    );
                    if consecutive_failures >= self.config.max_consecutive_poll_failures {
                        return Err(DomainError::SubscriptionFailure(format!(
                            "{} consecutive poll failures, last: {:#}",
                            consecutive_failures, e
                        )));
                    }
                    tokio::select! {
                        _ = ctx.cancelled() => break,
                        _ = tokio::time::sleep(self.config.poll_retry_backoff) => continue,
                    }
                }
            };

            let total = messages.len();
            for (position, message) in messages.into_iter().enumerate() {
                if ctx.is_cancelled() {
                    let dropped = (total - position) as u64;
                    stats.records_dropped_on_shutdown += dropped;
                    info!(dropped, "shutdown requested, leaving remaining messages for redelivery");
                    break;
                }
                self.process_message(message, accumulator, batch_tx, stats).await?;
            }
        }

        Ok(())
    }

    async fn process_message(
        &self,
        message: BusMessage,
        accumulator: &SharedAccumulator,
        batch_tx: &mpsc::Sender<Batch>,
        stats: &mut PipelineStats,
    ) -> DomainResult<()> {
        stats.records_received += 1;

        match self.transformer.transform_payload(&message.payload) {
            Ok(record) => {
                let mut accumulator = accumulator.lock().await;
                if accumulator.add(record) {
                    flush_into(&mut accumulator, batch_tx).await?;
                }
            }
            Err(e) => {
                stats.records_skipped += 1;
                warn!(subject = %message.subject, error = %e, "skipping malformed record");
            }
        }

        // Malformed records are acknowledged too; redelivering them cannot help
        if let Err(e) = message.ack().await {
            warn!(subject = %message.subject, error = %format!("{:#}", e), "failed to acknowledge message");
        }

        Ok(())
    }
}

/// Swap the window out and queue it for delivery.
/// Called with the accumulator lock held so batches reach the queue in sequence order.
async fn flush_into(accumulator: &mut BatchAccumulator, batch_tx: &mpsc::Sender<Batch>) -> DomainResult<()> {
    let batch = accumulator.flush();
    if batch.is_empty() {
        return Ok(());
    }

    debug!(batch = batch.sequence(), rows = batch.len(), "window flushed");
    batch_tx
        .send(batch)
        .await
        .map_err(|_| DomainError::RepositoryError(anyhow!("delivery task is no longer running")))
}

async fn run_interval_flush(
    accumulator: SharedAccumulator,
    batch_tx: mpsc::Sender<Batch>,
    period: Duration,
    ctx: CancellationToken,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ctx.cancelled() => break,
            _ = ticker.tick() => {
                let mut accumulator = accumulator.lock().await;
                if accumulator.is_empty() {
                    debug!("interval elapsed with no records");
                    continue;
                }
                if let Err(e) = flush_into(&mut accumulator, &batch_tx).await {
                    error!(error = %e, "stopping flush timer");
                    break;
                }
            }
        }
    }
}

async fn run_durable_delivery(
    router: Arc<SinkRouter>,
    mut batches: mpsc::Receiver<Batch>,
    best_effort: Option<mpsc::Sender<Batch>>,
) -> DeliveryStats {
    let mut stats = DeliveryStats::default();
    let best_effort_sinks = router.sink_count(SinkDurability::BestEffort) as u64;

    while let Some(batch) = batches.recv().await {
        let results = router.deliver_phase(&batch, SinkDurability::Durable).await;
        stats.batches += 1;
        stats.failed_sink_deliveries += count_failures(batch.sequence(), &results);

        let Some(best_effort) = &best_effort else {
            continue;
        };
        match best_effort.try_send(batch) {
            Ok(()) => {}
            Err(TrySendError::Full(batch)) => {
                warn!(
                    batch = batch.sequence(),
                    "best-effort queue full, batch not sent to best-effort sinks"
                );
                stats.failed_sink_deliveries += best_effort_sinks;
            }
            Err(TrySendError::Closed(batch)) => {
                error!(batch = batch.sequence(), "best-effort delivery task is no longer running");
                stats.failed_sink_deliveries += best_effort_sinks;
            }
        }
    }

    stats
}

async fn run_best_effort_delivery(router: Arc<SinkRouter>, mut batches: mpsc::Receiver<Batch>) -> DeliveryStats {
    let mut stats = DeliveryStats::default();

    while let Some(batch) = batches.recv().await {
        let results = router.deliver_phase(&batch, SinkDurability::BestEffort).await;
        stats.batches += 1;
        stats.failed_sink_deliveries += count_failures(batch.sequence(), &results);
    }

    stats
}

fn count_failures(sequence: u64, results: &[SinkResult]) -> u64 {
    let failed = results.iter().filter(|result| !result.is_success()).count() as u64;
    if failed > 0 {
        warn!(batch = sequence, failed, total = results.len(), "batch partially delivered");
    }
    failed
}
