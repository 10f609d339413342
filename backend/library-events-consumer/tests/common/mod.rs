//! Shared fixtures for consumer integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use library_event::{encode_key, Book, LibraryEvent, TopicConfig};
use library_events_consumer::{
    InMemoryLibraryEventRepository, LibraryEventRepository, LibraryEventService, OffsetStore,
    RecordProcessor, RepositoryError,
};
use rdkafka::error::KafkaError;
use redelivery::{
    ConsumedRecord, Delivery, OutgoingRecord, PublishError, RecordPublisher, RedeliveryConfig,
    RedeliveryHandler, RedeliveryPolicy, RedeliveryTopics,
};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const MAIN_TOPIC: &str = "library-events";
pub const RETRY_TOPIC: &str = "library-events.RETRY";
pub const DLT_TOPIC: &str = "library-events.DLT";

/// Publisher that keeps every record in memory
#[derive(Default)]
pub struct RecordingPublisher {
    records: Mutex<Vec<OutgoingRecord>>,
    fail: AtomicBool,
}

impl RecordingPublisher {
    pub fn failing() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            fail: AtomicBool::new(true),
        }
    }

    pub fn records(&self) -> Vec<OutgoingRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn topics(&self) -> Vec<String> {
        self.records().into_iter().map(|r| r.topic).collect()
    }
}

#[async_trait]
impl RecordPublisher for RecordingPublisher {
    async fn publish(&self, record: OutgoingRecord) -> Result<Delivery, PublishError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(PublishError::Timeout(Duration::from_secs(30)));
        }
        let mut records = self.records.lock().unwrap();
        let delivery = Delivery {
            partition: record.partition.unwrap_or(0),
            offset: records.len() as i64,
        };
        records.push(record);
        Ok(delivery)
    }
}

/// Repository whose first `failures` saves report storage unavailability
pub struct FlakyRepository {
    inner: InMemoryLibraryEventRepository,
    failures_left: AtomicU32,
    saves: AtomicU32,
}

impl FlakyRepository {
    pub fn failing_first(failures: u32) -> Self {
        Self {
            inner: InMemoryLibraryEventRepository::new(),
            failures_left: AtomicU32::new(failures),
            saves: AtomicU32::new(0),
        }
    }

    pub fn always_failing() -> Self {
        Self::failing_first(u32::MAX)
    }

    /// Save calls made, failed ones included
    pub fn save_attempts(&self) -> u32 {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LibraryEventRepository for FlakyRepository {
    async fn save(&self, event: &LibraryEvent) -> Result<LibraryEvent, RepositoryError> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            return Err(RepositoryError::Unavailable("connection refused".to_string()));
        }
        self.inner.save(event).await
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<LibraryEvent>, RepositoryError> {
        self.inner.find_by_id(id).await
    }
}

/// Offset store that remembers what workers stored
#[derive(Default)]
pub struct RecordingOffsets {
    stored: Mutex<Vec<(String, i32, i64)>>,
}

impl RecordingOffsets {
    pub fn stored(&self) -> Vec<(String, i32, i64)> {
        let mut stored = self.stored.lock().unwrap().clone();
        stored.sort();
        stored
    }
}

impl OffsetStore for RecordingOffsets {
    fn store(&self, topic: &str, partition: i32, offset: i64) -> Result<(), KafkaError> {
        self.stored
            .lock()
            .unwrap()
            .push((topic.to_string(), partition, offset));
        Ok(())
    }
}

pub fn processor(
    repository: Arc<dyn LibraryEventRepository>,
    publisher: Arc<RecordingPublisher>,
    config: RedeliveryConfig,
) -> RecordProcessor<RecordingPublisher> {
    let policy = RedeliveryPolicy::new(config, RedeliveryTopics::new(RETRY_TOPIC, DLT_TOPIC));
    RecordProcessor::new(
        LibraryEventService::new(repository),
        RedeliveryHandler::new(policy, publisher),
    )
}

pub fn topics() -> TopicConfig {
    TopicConfig::new(MAIN_TOPIC, RETRY_TOPIC, DLT_TOPIC)
}

pub fn sample_book() -> Book {
    Book::new(123, "Kafka using Systems", "olgun")
}

/// Record as the main topic would deliver `event`
pub fn record_for(event: &LibraryEvent, partition: i32, offset: i64) -> ConsumedRecord {
    let mut record = ConsumedRecord::new(MAIN_TOPIC, partition, offset)
        .with_value(event.to_json().unwrap())
        .with_header("event-source", "scanner");
    if let Some(id) = event.library_event_id {
        record = record.with_key(encode_key(id).to_vec());
    }
    record
}

/// Read back a redelivered record the way the retry topic would deliver it
pub fn consume(outgoing: &OutgoingRecord, offset: i64) -> ConsumedRecord {
    ConsumedRecord {
        topic: outgoing.topic.clone(),
        partition: outgoing.partition.unwrap_or(0),
        offset,
        key: outgoing.key.clone(),
        value: outgoing.payload.clone(),
        headers: outgoing.headers.clone(),
    }
}
