use crate::domain::error::DomainResult;
use crate::domain::weather::Batch;
use async_trait::async_trait;

/// Whether losing a sink's write can lose data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkDurability {
    /// Local copy of record; attempted before any best-effort sink
    Durable,
    /// Remote or auxiliary copy; failures are logged and never retried
    BestEffort,
}

/// Outcome of delivering one batch to one sink
#[derive(Debug, Clone, PartialEq)]
pub enum SinkStatus {
    Delivered { rows: usize },
    Failed { detail: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SinkResult {
    pub sink: String,
    pub status: SinkStatus,
}

impl SinkResult {
    pub fn delivered(sink: impl Into<String>, rows: usize) -> Self {
        Self {
            sink: sink.into(),
            status: SinkStatus::Delivered { rows },
        }
    }

    pub fn failed(sink: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            sink: sink.into(),
            status: SinkStatus::Failed {
                detail: detail.into(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, SinkStatus::Delivered { .. })
    }
}

/// A destination for flushed batches
///
/// Implementations must treat an empty batch as a no-op.
#[async_trait]
pub trait BatchSink: Send + Sync {
    /// Stable identifier used in results and logs
    fn name(&self) -> &str;

    fn durability(&self) -> SinkDurability;

    async fn write_batch(&self, batch: &Batch) -> DomainResult<()>;
}

/// Repository trait for the analytical warehouse table
/// Infrastructure layer (e.g., ClickHouse) implements this trait
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait WarehouseRepository: Send + Sync {
    /// Append every record of the batch to the table; never overwrites
    async fn load_append(&self, batch: &Batch) -> DomainResult<()>;
}
