use common::domain::{Batch, BatchSink, DomainError, SinkDurability, SinkResult};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument};

/// Fans a batch out to every configured sink.
///
/// Durable sinks are written first (concurrently), best-effort sinks second
/// (concurrently), whatever the durable outcome was. A failing sink only
/// produces a failed [`SinkResult`]; it never stops delivery to the others.
#[derive(Default)]
pub struct SinkRouter {
    sinks: Vec<Arc<dyn BatchSink>>,
    sink_timeout: Option<Duration>,
}

impl SinkRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink(mut self, sink: Arc<dyn BatchSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Fail any single sink write that takes longer than `timeout`
    pub fn with_sink_timeout(mut self, timeout: Duration) -> Self {
        self.sink_timeout = Some(timeout);
        self
    }

    pub fn sink_names(&self) -> Vec<&str> {
        self.sinks.iter().map(|sink| sink.name()).collect()
    }

    /// Number of registered sinks with the given durability
    pub fn sink_count(&self, durability: SinkDurability) -> usize {
        self.sinks
            .iter()
            .filter(|sink| sink.durability() == durability)
            .count()
    }

    /// Deliver one batch; results come back in sink registration order.
    /// Empty batches are skipped and yield no results.
    #[instrument(skip_all, fields(batch = batch.sequence(), rows = batch.len()))]
    pub async fn deliver(&self, batch: Batch) -> Vec<SinkResult> {
        if batch.is_empty() {
            debug!("empty batch, nothing to deliver");
            return Vec::new();
        }

        let mut results: Vec<Option<SinkResult>> = vec![None; self.sinks.len()];
        for phase in [SinkDurability::Durable, SinkDurability::BestEffort] {
            for (index, result) in self.attempt_phase(&batch, phase).await {
                results[index] = Some(result);
            }
        }

        results.into_iter().flatten().collect()
    }

    /// Deliver one batch to the sinks of a single durability class, concurrently.
    /// Results keep registration order within the class.
    #[instrument(skip_all, fields(batch = batch.sequence(), phase = ?durability))]
    pub async fn deliver_phase(&self, batch: &Batch, durability: SinkDurability) -> Vec<SinkResult> {
        if batch.is_empty() {
            return Vec::new();
        }

        self.attempt_phase(batch, durability)
            .await
            .into_iter()
            .map(|(_, result)| result)
            .collect()
    }

    async fn attempt_phase(&self, batch: &Batch, durability: SinkDurability) -> Vec<(usize, SinkResult)> {
        let attempts = self
            .sinks
            .iter()
            .enumerate()
            .filter(|(_, sink)| sink.durability() == durability)
            .map(|(index, sink)| async move { (index, self.deliver_to(sink.as_ref(), batch).await) });

        join_all(attempts).await
    }

    async fn deliver_to(&self, sink: &dyn BatchSink, batch: &Batch) -> SinkResult {
        let write = sink.write_batch(batch);
        let outcome = match self.sink_timeout {
            Some(limit) => match tokio::time::timeout(limit, write).await {
                Ok(outcome) => outcome,
                Err(_) => Err(DomainError::SinkDeliveryFailure {
                    sink: sink.name().to_string(),
                    detail: format!("timed out after {:?}", limit),
                }),
            },
            None => write.await,
        };

        match outcome {
            Ok(()) => {
                info!(sink = %sink.name(), rows = batch.len(), "batch delivered");
                SinkResult::delivered(sink.name(), batch.len())
            }
            Err(e) => {
                error!(
                    sink = %sink.name(),
                    durability = ?sink.durability(),
                    error = %e,
                    "batch delivery failed"
                );
                SinkResult::failed(sink.name(), e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::test_support::{batch_of, CallLog, RecordingSink};
    use common::domain::SinkStatus;

    #[tokio::test]
    async fn test_failure_on_one_sink_is_isolated() {
        let calls = CallLog::default();
        let first = Arc::new(RecordingSink::new("archive", SinkDurability::Durable, calls.clone()));
        let second = Arc::new(RecordingSink::new("live", SinkDurability::Durable, calls.clone()).failing());
        let third = Arc::new(RecordingSink::new("warehouse", SinkDurability::BestEffort, calls.clone()));

        let router = SinkRouter::new()
            .with_sink(first.clone())
            .with_sink(second.clone())
            .with_sink(third.clone());

        let results = router.deliver(batch_of(7, 4)).await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[0], SinkResult::delivered("archive", 4));
        assert_eq!(results[1].sink, "live");
        assert!(matches!(
            &results[1].status,
            SinkStatus::Failed { detail } if detail.contains("disk full")
        ));
        assert_eq!(results[2], SinkResult::delivered("warehouse", 4));
        assert_eq!(results.iter().filter(|r| r.is_success()).count(), 2);

        assert_eq!(first.received(), vec![batch_of(7, 4)]);
        assert_eq!(third.received(), vec![batch_of(7, 4)]);
        assert!(second.received().is_empty());
    }

    #[tokio::test]
    async fn test_durable_sinks_attempted_before_best_effort() {
        let calls = CallLog::default();
        let router = SinkRouter::new()
            .with_sink(Arc::new(RecordingSink::new(
                "warehouse",
                SinkDurability::BestEffort,
                calls.clone(),
            )))
            .with_sink(Arc::new(
                RecordingSink::new("archive", SinkDurability::Durable, calls.clone()).failing(),
            ));

        let results = router.deliver(batch_of(0, 1)).await;

        assert_eq!(*calls.lock().unwrap(), vec!["archive".to_string(), "warehouse".to_string()]);
        // Results keep registration order regardless of delivery phase
        assert_eq!(results[0].sink, "warehouse");
        assert!(results[0].is_success());
        assert!(!results[1].is_success());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_sink_times_out() {
        let router = SinkRouter::new()
            .with_sink(Arc::new(RecordingSink::durable("archive")))
            .with_sink(Arc::new(
                RecordingSink::new("warehouse", SinkDurability::BestEffort, CallLog::default())
                    .slow(Duration::from_secs(120)),
            ))
            .with_sink_timeout(Duration::from_secs(5));

        let results = router.deliver(batch_of(0, 2)).await;

        assert!(results[0].is_success());
        assert!(matches!(
            &results[1].status,
            SinkStatus::Failed { detail } if detail.contains("timed out")
        ));
    }

    #[tokio::test]
    async fn test_single_phase_only_touches_matching_sinks() {
        let calls = CallLog::default();
        let archive = Arc::new(RecordingSink::new("archive", SinkDurability::Durable, calls.clone()));
        let warehouse = Arc::new(RecordingSink::new(
            "warehouse",
            SinkDurability::BestEffort,
            calls.clone(),
        ));
        let router = SinkRouter::new()
            .with_sink(warehouse.clone())
            .with_sink(archive.clone());

        let results = router
            .deliver_phase(&batch_of(2, 3), SinkDurability::Durable)
            .await;

        assert_eq!(results, vec![SinkResult::delivered("archive", 3)]);
        assert!(warehouse.received().is_empty());
        assert_eq!(router.sink_count(SinkDurability::BestEffort), 1);
        assert_eq!(router.sink_count(SinkDurability::Durable), 1);
    }

    #[tokio::test]
    async fn test_empty_batch_is_not_delivered() {
        let sink = Arc::new(RecordingSink::durable("archive"));
        let router = SinkRouter::new().with_sink(sink.clone());

        let results = router.deliver(Batch::default()).await;

        assert!(results.is_empty());
        assert!(sink.received().is_empty());
        assert_eq!(router.sink_names(), vec!["archive"]);
    }
}
