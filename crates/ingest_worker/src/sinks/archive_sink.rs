use crate::sinks::csv_rows::{append_rows, ArchiveRow};
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::domain::{ArchivePeriod, Batch, BatchSink, DomainError, DomainResult, SinkDurability};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Local CSV archive split into one file per period
pub struct CsvArchiveSink {
    base_path: PathBuf,
    period: ArchivePeriod,
}

impl CsvArchiveSink {
    pub fn new(base_path: impl Into<PathBuf>, period: ArchivePeriod) -> Self {
        Self {
            base_path: base_path.into(),
            period,
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// File receiving rows delivered at `now`
    pub fn path_for(&self, now: DateTime<Utc>) -> PathBuf {
        match self.period {
            ArchivePeriod::Monthly => self
                .base_path
                .join(format!("{}.csv", now.format("%Y%m"))),
            ArchivePeriod::Daily => self
                .base_path
                .join(now.format("%Y").to_string())
                .join(format!("{}.csv", now.format("%Y-%m-%d"))),
        }
    }
}

#[async_trait]
impl BatchSink for CsvArchiveSink {
    fn name(&self) -> &str {
        "archive"
    }

    fn durability(&self) -> SinkDurability {
        SinkDurability::Durable
    }

    async fn write_batch(&self, batch: &Batch) -> DomainResult<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let path = self.path_for(Utc::now());
        let rows: Vec<ArchiveRow> = batch.records().iter().map(ArchiveRow::from).collect();
        debug!(path = %path.display(), rows = rows.len(), "appending to archive");

        tokio::task::spawn_blocking(move || append_rows(&path, &rows))
            .await
            .context("archive writer task panicked")?
            .map_err(|e| DomainError::SinkDeliveryFailure {
                sink: "archive".to_string(),
                detail: format!("{:#}", e),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::test_support::batch_of;
    use chrono::TimeZone;

    #[test]
    fn test_monthly_path() {
        let sink = CsvArchiveSink::new("/data/weather", ArchivePeriod::Monthly);
        let now = Utc.with_ymd_and_hms(2024, 3, 31, 23, 59, 59).unwrap();

        assert_eq!(sink.path_for(now), PathBuf::from("/data/weather/202403.csv"));
    }

    #[test]
    fn test_daily_path() {
        let sink = CsvArchiveSink::new("/data/weather", ArchivePeriod::Daily);
        let now = Utc.with_ymd_and_hms(2024, 12, 5, 0, 0, 0).unwrap();

        assert_eq!(
            sink.path_for(now),
            PathBuf::from("/data/weather/2024/2024-12-05.csv")
        );
    }

    #[tokio::test]
    async fn test_batches_accumulate_in_period_file() {
        let dir = tempfile::tempdir().unwrap();
        let sink = CsvArchiveSink::new(dir.path().join("archive"), ArchivePeriod::Monthly);

        sink.write_batch(&batch_of(0, 2)).await.unwrap();
        sink.write_batch(&batch_of(1, 3)).await.unwrap();

        let contents = std::fs::read_to_string(sink.path_for(Utc::now())).unwrap();
        let raws: Vec<&str> = contents
            .lines()
            .map(|line| line.rsplit(',').next().unwrap())
            .collect();
        assert_eq!(raws, vec!["0", "1", "0", "1", "2"]);
    }

    #[tokio::test]
    async fn test_empty_batch_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let sink = CsvArchiveSink::new(dir.path().join("archive"), ArchivePeriod::Daily);

        sink.write_batch(&Batch::default()).await.unwrap();

        assert!(!sink.base_path().exists());
    }

    #[tokio::test]
    async fn test_unwritable_location_is_delivery_failure() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"").unwrap();
        let sink = CsvArchiveSink::new(blocker, ArchivePeriod::Monthly);

        let err = sink.write_batch(&batch_of(0, 1)).await.unwrap_err();

        assert!(matches!(err, DomainError::SinkDeliveryFailure { ref sink, .. } if sink == "archive"));
    }
}
