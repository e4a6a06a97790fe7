use common::domain::{Batch, EnrichedRecord, FlushTrigger};

/// Default hard cap on a window when flushing on a timer
pub const DEFAULT_MAX_BATCH_RECORDS: usize = 10_000;

/// Buffers enriched records until the current window closes.
///
/// Count windows close after exactly K records. Interval windows are closed by
/// an external timer, but still report a boundary once `max_records` is reached
/// so a burst cannot grow the buffer without limit.
#[derive(Debug)]
pub struct BatchAccumulator {
    trigger: FlushTrigger,
    max_records: usize,
    buffer: Vec<EnrichedRecord>,
    next_sequence: u64,
}

impl BatchAccumulator {
    pub fn new(trigger: FlushTrigger) -> Self {
        let max_records = match trigger {
            FlushTrigger::Count(count) => count.max(1),
            FlushTrigger::Interval(_) => DEFAULT_MAX_BATCH_RECORDS,
        };

        Self {
            trigger,
            max_records,
            buffer: Vec::new(),
            next_sequence: 0,
        }
    }

    /// Override the record cap used by interval windows
    pub fn with_max_records(mut self, max_records: usize) -> Self {
        if matches!(self.trigger, FlushTrigger::Interval(_)) {
            self.max_records = max_records.max(1);
        }
        self
    }

    /// Append a record; returns true when the window is full and should be flushed
    pub fn add(&mut self, record: EnrichedRecord) -> bool {
        self.buffer.push(record);
        self.is_full()
    }

    pub fn is_full(&self) -> bool {
        self.buffer.len() >= self.max_records
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Swap out the current window for an empty one.
    ///
    /// Always returns a batch, possibly empty; only non-empty batches consume
    /// a sequence number.
    pub fn flush(&mut self) -> Batch {
        let records = std::mem::take(&mut self.buffer);
        let sequence = self.next_sequence;
        if !records.is_empty() {
            self.next_sequence += 1;
        }
        Batch::new(sequence, records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::time::Duration;

    fn record(raw: i64) -> EnrichedRecord {
        EnrichedRecord {
            datetime: NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            rain: 0.0,
            wind_speed: 0.0,
            wind_direction_compass: None,
            wind_direction_raw: raw,
            temperature_celsius: 0.0,
            temperature_fahrenheit: 32.0,
            pressure: 0.0,
            humidity: 0.0,
        }
    }

    #[test]
    fn test_count_trigger_reports_boundary_on_kth_add() {
        let mut accumulator = BatchAccumulator::new(FlushTrigger::Count(3));

        assert!(!accumulator.add(record(1)));
        assert!(!accumulator.add(record(2)));
        assert!(accumulator.add(record(3)));

        let batch = accumulator.flush();
        assert_eq!(batch.len(), 3);
        assert!(accumulator.is_empty());
    }

    #[test]
    fn test_flush_preserves_arrival_order_and_sequences() {
        let mut accumulator = BatchAccumulator::new(FlushTrigger::Count(10));
        for raw in [5, 1, 4] {
            accumulator.add(record(raw));
        }

        let first = accumulator.flush();
        let raws: Vec<i64> = first.records().iter().map(|r| r.wind_direction_raw).collect();
        assert_eq!(raws, vec![5, 1, 4]);
        assert_eq!(first.sequence(), 0);

        accumulator.add(record(9));
        assert_eq!(accumulator.flush().sequence(), 1);
    }

    #[test]
    fn test_empty_flush_returns_empty_batch() {
        let mut accumulator = BatchAccumulator::new(FlushTrigger::Count(2));

        let batch = accumulator.flush();
        assert!(batch.is_empty());

        accumulator.add(record(1));
        assert_eq!(accumulator.flush().sequence(), 0);
    }

    #[test]
    fn test_interval_trigger_respects_record_cap() {
        let mut accumulator =
            BatchAccumulator::new(FlushTrigger::Interval(Duration::from_secs(60))).with_max_records(2);

        assert!(!accumulator.add(record(1)));
        assert!(accumulator.add(record(2)));
        assert_eq!(accumulator.flush().len(), 2);
    }

    #[test]
    fn test_record_cap_ignored_for_count_trigger() {
        let accumulator = BatchAccumulator::new(FlushTrigger::Count(4)).with_max_records(1);
        assert_eq!(accumulator.max_records, 4);
    }
}
