use crate::sinks::csv_rows::{append_rows, ArchiveRow};
use anyhow::Context;
use async_trait::async_trait;
use common::domain::{Batch, BatchSink, DomainError, DomainResult, SinkDurability};
use std::path::PathBuf;

/// Single fixed CSV file tailed by the live dashboard
pub struct LiveViewSink {
    path: PathBuf,
}

impl LiveViewSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl BatchSink for LiveViewSink {
    fn name(&self) -> &str {
        "live_view"
    }

    fn durability(&self) -> SinkDurability {
        SinkDurability::Durable
    }

    async fn write_batch(&self, batch: &Batch) -> DomainResult<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let path = self.path.clone();
        let rows: Vec<ArchiveRow> = batch.records().iter().map(ArchiveRow::from).collect();

        tokio::task::spawn_blocking(move || append_rows(&path, &rows))
            .await
            .context("live view writer task panicked")?
            .map_err(|e| DomainError::SinkDeliveryFailure {
                sink: "live_view".to_string(),
                detail: format!("{:#}", e),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::test_support::batch_of;

    #[tokio::test]
    async fn test_rows_land_in_fixed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("live.csv");
        let sink = LiveViewSink::new(&path);

        sink.write_batch(&batch_of(0, 2)).await.unwrap();
        sink.write_batch(&batch_of(1, 1)).await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 3);
        assert!(contents.starts_with("2024-05-01 12:00:00,"));
    }
}
