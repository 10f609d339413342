//! Record publishing seam.
//!
//! Both the redelivery handler and the event producer send through
//! `RecordPublisher`, so tests can swap Kafka for an in-memory recorder.

use async_trait::async_trait;
use rdkafka::error::KafkaError;
use rdkafka::message::{Header, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::ClientConfig;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::PublishError;
use crate::record::{Delivery, OutgoingRecord};

#[async_trait]
pub trait RecordPublisher: Send + Sync {
    /// Send a record and wait for the broker acknowledgment.
    async fn publish(&self, record: OutgoingRecord) -> Result<Delivery, PublishError>;
}

#[async_trait]
impl<P: RecordPublisher + ?Sized> RecordPublisher for Arc<P> {
    async fn publish(&self, record: OutgoingRecord) -> Result<Delivery, PublishError> {
        (**self).publish(record).await
    }
}

/// Kafka-backed publisher.
///
/// The wrapped `FutureProducer` is cheap to clone and safe to share; one
/// instance per process is enough.
#[derive(Clone)]
pub struct KafkaRecordPublisher {
    producer: FutureProducer,
    queue_timeout: Duration,
}

impl KafkaRecordPublisher {
    /// Create a publisher with idempotent, fully-acknowledged delivery
    pub fn new(brokers: &str) -> Result<Self, KafkaError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("enable.idempotence", "true")
            .set("acks", "all")
            .set("max.in.flight.requests.per.connection", "5")
            .set("compression.type", "lz4")
            .set("linger.ms", "10")
            .set("message.timeout.ms", "30000")
            .create()?;

        info!("Kafka record publisher initialized with brokers: {}", brokers);

        Ok(Self::from_producer(producer, Duration::from_secs(30)))
    }

    pub fn from_producer(producer: FutureProducer, queue_timeout: Duration) -> Self {
        Self {
            producer,
            queue_timeout,
        }
    }

    pub fn producer(&self) -> &FutureProducer {
        &self.producer
    }

    /// Fetch topic metadata to check the broker is reachable
    pub async fn health_check(&self, topic: &str, timeout: Duration) -> Result<(), PublishError> {
        let producer = self.producer.clone();
        let topic = topic.to_string();

        // librdkafka fetches metadata synchronously
        tokio::task::spawn_blocking(move || {
            producer
                .client()
                .fetch_metadata(Some(&topic), timeout)
                .map(|_| ())
        })
        .await
        .map_err(|_| PublishError::Cancelled)?
        .map_err(PublishError::Kafka)
    }

    /// Wait for queued messages to be delivered
    pub fn flush(&self, timeout: Duration) -> Result<(), PublishError> {
        self.producer.flush(timeout).map_err(PublishError::Kafka)
    }
}

#[async_trait]
impl RecordPublisher for KafkaRecordPublisher {
    async fn publish(&self, record: OutgoingRecord) -> Result<Delivery, PublishError> {
        let mut headers = OwnedHeaders::new_with_capacity(record.headers.len());
        for (key, value) in &record.headers {
            headers = headers.insert(Header {
                key: key.as_str(),
                value: Some(value.as_slice()),
            });
        }

        let mut kafka_record: FutureRecord<'_, [u8], [u8]> =
            FutureRecord::to(&record.topic).headers(headers);
        if let Some(partition) = record.partition {
            kafka_record = kafka_record.partition(partition);
        }
        if let Some(key) = &record.key {
            kafka_record = kafka_record.key(key.as_slice());
        }
        if let Some(payload) = &record.payload {
            kafka_record = kafka_record.payload(payload.as_slice());
        }

        match self.producer.send(kafka_record, self.queue_timeout).await {
            Ok((partition, offset)) => {
                debug!(
                    topic = %record.topic,
                    partition = partition,
                    offset = offset,
                    "Record delivered"
                );
                Ok(Delivery { partition, offset })
            }
            Err((err, _)) => Err(PublishError::Kafka(err)),
        }
    }
}
