//! Library Events Producer - Main entry point
//!
//! Reads library events as JSON lines from stdin and publishes them to the
//! library events topic. `SEND_MODE` selects fire-and-report (default) or
//! blocking sends.

use anyhow::Result;
use library_event::LibraryEvent;
use library_events_producer::{Config, LibraryEventProducer, PendingSends, SendMode, SendTally};
use redelivery::KafkaRecordPublisher;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const MAX_IN_FLIGHT_SENDS: usize = 1024;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env().map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "library_events_producer=debug,redelivery=debug,rdkafka=warn,info".into()
        }))
        .with(config.json_logs().then(|| tracing_subscriber::fmt::layer().json()))
        .with((!config.json_logs()).then(tracing_subscriber::fmt::layer))
        .init();

    info!(
        "Starting library events producer: topic={}, mode={:?}",
        config.library_events_topic, config.send_mode
    );

    let publisher = Arc::new(KafkaRecordPublisher::new(&config.kafka_brokers).map_err(|e| {
        error!("Failed to create Kafka producer: {}", e);
        anyhow::anyhow!("Kafka producer error: {}", e)
    })?);

    if let Err(e) = publisher
        .health_check(&config.library_events_topic, Duration::from_secs(5))
        .await
    {
        warn!("Kafka health check failed: {}", e);
    }

    let producer = LibraryEventProducer::new(publisher.clone(), config.producer_config());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut pending = PendingSends::new(MAX_IN_FLIGHT_SENDS);
    let mut tally = SendTally::default();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let event = match LibraryEvent::from_json(line.as_bytes()) {
            Ok(event) => event,
            Err(e) => {
                warn!("Skipping malformed library event: {}", e);
                tally.failed += 1;
                continue;
            }
        };

        match config.send_mode {
            SendMode::Blocking => match producer.send_library_event_sync(&event).await {
                Ok(_) => tally.sent += 1,
                Err(_) => tally.failed += 1,
            },
            SendMode::FireAndReport => match producer.send_library_event(&event) {
                Ok(handle) => tally += pending.push(handle).await,
                Err(e) => {
                    error!("Failed to serialize library event: {}", e);
                    tally.failed += 1;
                }
            },
        }
    }

    // Drain in-flight sends before exiting
    tally += pending.drain().await;

    if let Err(e) = publisher.flush(Duration::from_secs(10)) {
        warn!("Failed to flush producer: {}", e);
    }

    info!(
        "Library events producer finished: sent={}, failed={}",
        tally.sent, tally.failed
    );

    Ok(())
}
