//! Library Events Consumer - Main entry point
//!
//! Consumes `library-events` and `library-events.RETRY`, persists each event
//! and routes failures to the retry or dead-letter topic. Storage is
//! PostgreSQL when `DATABASE_URL` is set, otherwise in memory.

use anyhow::Result;
use library_events_consumer::{
    forward_shutdown_signal, Config, InMemoryLibraryEventRepository, LibraryEventRepository,
    LibraryEventService, LibraryEventsConsumer, PgLibraryEventRepository, RecordProcessor,
};
use redelivery::{
    KafkaRecordPublisher, LoggingRetryListener, RedeliveryHandler, RedeliveryMetrics,
    RedeliveryPolicy,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env().map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "library_events_consumer=debug,redelivery=debug,rdkafka=warn,info".into()
        }))
        .with(config.json_logs().then(|| tracing_subscriber::fmt::layer().json()))
        .with((!config.json_logs()).then(tracing_subscriber::fmt::layer))
        .init();

    let redelivery = config.redelivery();
    info!(
        "Configuration loaded: strategy={:?}, max_attempts={}, backoff={:?}, concurrency={}",
        redelivery.strategy,
        redelivery.max_attempts,
        redelivery.backoff,
        config.concurrency()
    );

    let repository = init_repository(&config).await?;

    let publisher = Arc::new(KafkaRecordPublisher::new(&config.kafka_brokers).map_err(|e| {
        error!("Failed to create Kafka producer: {}", e);
        anyhow::anyhow!("Kafka producer error: {}", e)
    })?);

    if let Err(e) = publisher
        .health_check(&config.library_events_dlt_topic, Duration::from_secs(5))
        .await
    {
        warn!("Kafka health check failed: {}", e);
    }

    let handler = RedeliveryHandler::new(
        RedeliveryPolicy::new(redelivery, config.redelivery_topics()),
        publisher.clone(),
    )
    .with_listener(Arc::new(LoggingRetryListener))
    .with_metrics(RedeliveryMetrics::new("library-events-consumer"));

    let processor = Arc::new(RecordProcessor::new(
        LibraryEventService::new(repository),
        handler,
    ));

    let consumer = LibraryEventsConsumer::new(config.consumer_config()).map_err(|e| {
        error!("Failed to create Kafka consumer: {}", e);
        anyhow::anyhow!("Kafka consumer error: {}", e)
    })?;

    // Setup shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(forward_shutdown_signal(tokio::signal::ctrl_c(), shutdown_tx));

    consumer.run(processor, shutdown_rx).await?;

    if let Err(e) = publisher.flush(Duration::from_secs(10)) {
        warn!("Failed to flush producer: {}", e);
    }

    info!("Library events consumer shut down");
    Ok(())
}

async fn init_repository(config: &Config) -> Result<Arc<dyn LibraryEventRepository>> {
    let Some(database_url) = config.database_url() else {
        warn!("DATABASE_URL not set, using in-memory storage");
        return Ok(Arc::new(InMemoryLibraryEventRepository::new()));
    };

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
        .map_err(|e| {
            error!("Failed to connect to database: {}", e);
            anyhow::anyhow!("Database connection error: {}", e)
        })?;

    let repository = PgLibraryEventRepository::new(pool);
    repository.migrate().await?;
    info!("Database connection pool initialized");

    Ok(Arc::new(repository))
}
