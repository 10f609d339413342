//! Kafka consumer for library events
//!
//! Subscribes to the main and retry topics and hands every record to the
//! partition worker pool. Offsets are stored by the workers once a record is
//! done and committed periodically; a final synchronous commit runs after the
//! workers drain on shutdown.

use futures::StreamExt;
use library_event::TopicConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::error::KafkaError;
use rdkafka::ClientConfig;
use redelivery::{ConsumedRecord, RecordPublisher};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::error::Result;
use crate::processor::RecordProcessor;
use crate::workers::{OffsetStore, WorkerPool};

/// Kafka consumer configuration
#[derive(Clone, Debug)]
pub struct LibraryEventsConsumerConfig {
    pub brokers: String,
    pub group_id: String,
    pub topics: TopicConfig,
    /// Number of partition workers
    pub concurrency: usize,
}

impl Default for LibraryEventsConsumerConfig {
    fn default() -> Self {
        Self {
            brokers: "localhost:9092".to_string(),
            group_id: "library-events-listener-group".to_string(),
            topics: TopicConfig::default(),
            concurrency: 3,
        }
    }
}

pub struct LibraryEventsConsumer {
    consumer: Arc<StreamConsumer>,
    config: LibraryEventsConsumerConfig,
}

impl LibraryEventsConsumer {
    pub fn new(config: LibraryEventsConsumerConfig) -> Result<Self> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("group.id", &config.group_id)
            .set("enable.auto.commit", "true")
            .set("enable.auto.offset.store", "false")
            .set("auto.commit.interval.ms", "5000")
            .set("auto.offset.reset", "earliest")
            .set("session.timeout.ms", "45000")
            .set("max.poll.interval.ms", "300000")
            .create()?;

        consumer.subscribe(&config.topics.subscriptions())?;

        info!(
            brokers = %config.brokers,
            group_id = %config.group_id,
            topic = %config.topics.main,
            retry_topic = %config.topics.retry,
            concurrency = config.concurrency,
            "Library events consumer initialized"
        );

        Ok(Self {
            consumer: Arc::new(consumer),
            config,
        })
    }

    /// Consume until shutdown, then drain workers and commit
    pub async fn run<P>(
        &self,
        processor: Arc<RecordProcessor<P>>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> Result<()>
    where
        P: RecordPublisher + 'static,
    {
        let offsets: Arc<dyn OffsetStore> = self.consumer.clone();
        let pool = WorkerPool::spawn(
            self.config.concurrency,
            self.config.topics.clone(),
            processor,
            offsets,
            shutdown_rx.clone(),
        );

        info!("Starting library events consumer loop");

        let mut message_stream = self.consumer.stream();

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Shutdown signal received, stopping consumer");
                        break;
                    }
                }

                message = message_stream.next() => {
                    match message {
                        Some(Ok(msg)) => {
                            let record = ConsumedRecord::from_message(&msg);
                            drop(msg);

                            if let Err(e) = pool.dispatch(record).await {
                                error!(error = %e, "Failed to dispatch record");
                                break;
                            }
                        }
                        Some(Err(e)) => {
                            error!(error = %e, "Kafka consumer error");
                        }
                        None => {
                            warn!("Message stream ended unexpectedly");
                            break;
                        }
                    }
                }
            }
        }

        drop(message_stream);
        pool.shutdown().await;

        match self.consumer.commit_consumer_state(CommitMode::Sync) {
            Ok(()) => info!("Committed consumer offsets"),
            // Nothing stored since the last auto-commit
            Err(KafkaError::ConsumerCommit(code)) => {
                warn!("No offsets committed on shutdown: {}", code)
            }
            Err(e) => error!("Failed to commit consumer offsets: {}", e),
        }

        self.consumer.unsubscribe();
        info!("Library events consumer stopped");
        Ok(())
    }
}
