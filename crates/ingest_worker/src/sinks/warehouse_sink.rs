use async_trait::async_trait;
use common::domain::{Batch, BatchSink, DomainResult, SinkDurability, WarehouseRepository};
use std::sync::Arc;

/// Appends batches to the analytical warehouse. Failures are reported, never retried.
pub struct WarehouseSink {
    repository: Arc<dyn WarehouseRepository>,
}

impl WarehouseSink {
    pub fn new(repository: Arc<dyn WarehouseRepository>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl BatchSink for WarehouseSink {
    fn name(&self) -> &str {
        "warehouse"
    }

    fn durability(&self) -> SinkDurability {
        SinkDurability::BestEffort
    }

    async fn write_batch(&self, batch: &Batch) -> DomainResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        self.repository.load_append(batch).await
    }
}
