use chrono::Utc;
use common::domain::{
    ArchivePeriod, BusMessage, BusSubscription, FlushTrigger, MockBusSubscriber,
    MockBusSubscription, OffsetPolicy, SubscribeRequest,
};
use ingest_worker::domain::{
    PipelineConfig, PipelineController, PipelineState, RecordTransformer, SinkRouter,
};
use ingest_worker::sinks::CsvArchiveSink;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const WIND_READINGS: [i64; 5] = [150, 350, 500, 2000, 6000];
const CELSIUS: [f64; 5] = [0.0, 10.0, 20.0, 30.0, 40.0];

fn station_message(index: usize) -> BusMessage {
    let payload = serde_json::json!({
        "datetime": format!("2024-07-01 10:0{}:00", index),
        "rain": 0.0,
        "wind": 3.5,
        "wind_direction": WIND_READINGS[index],
        "tmp_temp": CELSIUS[index],
        "pressure": 1009.0,
        "humidity": 52.0
    });
    BusMessage::new("weather-raw", serde_json::to_vec(&payload).unwrap())
}

fn pipeline_config() -> PipelineConfig {
    PipelineConfig {
        subscription: SubscribeRequest {
            stream: "weather".to_string(),
            topic: "weather-raw".to_string(),
            group_id: "e2e".to_string(),
            offset_policy: OffsetPolicy::Earliest,
        },
        flush_trigger: FlushTrigger::Count(5),
        max_batch_records: 100,
        poll_batch_size: 10,
        poll_timeout: Duration::from_millis(50),
        delivery_queue_capacity: 4,
        max_consecutive_poll_failures: 3,
        poll_retry_backoff: Duration::from_millis(10),
    }
}

#[tokio::test]
async fn test_five_readings_end_up_in_archive_enriched_and_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = CancellationToken::new();

    let mut subscription = MockBusSubscription::new();
    let mut polls = 0;
    let cancel = ctx.clone();
    subscription.expect_poll().returning(move |_, _| {
        polls += 1;
        if polls == 1 {
            return Ok((0..WIND_READINGS.len()).map(station_message).collect());
        }
        cancel.cancel();
        Ok(Vec::new())
    });
    subscription.expect_close().times(1).returning(|| Ok(()));

    let mut subscriber = MockBusSubscriber::new();
    subscriber
        .expect_subscribe()
        .withf(|request| request.topic == "weather-raw")
        .return_once(move |_| Ok(Box::new(subscription) as Box<dyn BusSubscription>));

    let archive = Arc::new(CsvArchiveSink::new(dir.path(), ArchivePeriod::Monthly));
    let controller = PipelineController::new(
        Arc::new(subscriber),
        RecordTransformer::new(),
        Arc::new(SinkRouter::new().with_sink(archive.clone())),
        pipeline_config(),
    );

    let stats = controller.run(ctx).await.unwrap();

    assert_eq!(controller.state(), PipelineState::Stopped);
    assert_eq!(stats.records_received, 5);
    assert_eq!(stats.records_skipped, 0);
    assert_eq!(stats.batches_flushed, 1);

    let contents = std::fs::read_to_string(archive.path_for(Utc::now())).unwrap();
    let rows: Vec<Vec<&str>> = contents
        .lines()
        .map(|line| line.split(',').collect())
        .collect();

    assert_eq!(rows.len(), 5);
    let compass: Vec<&str> = rows.iter().map(|row| row[3]).collect();
    assert_eq!(compass, vec!["E", "S", "NE", "N", "E"]);
    let fahrenheit: Vec<f64> = rows.iter().map(|row| row[4].parse().unwrap()).collect();
    assert_eq!(fahrenheit, vec![32.0, 50.0, 68.0, 86.0, 104.0]);
    let raw: Vec<i64> = rows.iter().map(|row| row[7].parse().unwrap()).collect();
    assert_eq!(raw, WIND_READINGS.to_vec());
    assert_eq!(rows[0][0], "2024-07-01 10:00:00");
}
