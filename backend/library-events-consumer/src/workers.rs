//! Fixed pool of partition workers
//!
//! Each `(topic, partition)` pair hashes to one worker, so records of a
//! partition are processed one at a time and in offset order. Retry-topic
//! records wait for their deadline on a separate set of workers, so a
//! pending retry never holds up main-topic partitions.

use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::error::KafkaError;
use rdkafka::{Offset, TopicPartitionList};
use library_event::TopicConfig;
use redelivery::{ConsumedRecord, RecordPublisher};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::{ConsumerError, Result};
use crate::processor::{ProcessOutcome, RecordProcessor};

const WORKER_QUEUE_CAPACITY: usize = 64;

/// Where workers record that an offset is fully processed
pub trait OffsetStore: Send + Sync {
    fn store(&self, topic: &str, partition: i32, offset: i64) -> std::result::Result<(), KafkaError>;
}

impl OffsetStore for StreamConsumer {
    fn store(&self, topic: &str, partition: i32, offset: i64) -> std::result::Result<(), KafkaError> {
        // The committed position is the next offset to read
        let mut tpl = TopicPartitionList::new();
        tpl.add_partition_offset(topic, partition, Offset::Offset(offset + 1))?;
        self.store_offsets(&tpl)
    }
}

pub fn worker_index(topic: &str, partition: i32, workers: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    topic.hash(&mut hasher);
    partition.hash(&mut hasher);
    (hasher.finish() % workers.max(1) as u64) as usize
}

pub struct WorkerPool {
    topics: TopicConfig,
    main: Vec<mpsc::Sender<ConsumedRecord>>,
    retry: Vec<mpsc::Sender<ConsumedRecord>>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `workers` main-topic workers and as many retry-topic workers
    pub fn spawn<P>(
        workers: usize,
        topics: TopicConfig,
        processor: Arc<RecordProcessor<P>>,
        offsets: Arc<dyn OffsetStore>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self
    where
        P: RecordPublisher + 'static,
    {
        let workers = workers.max(1);
        let mut senders = Vec::with_capacity(workers * 2);
        let mut handles = Vec::with_capacity(workers * 2);

        for id in 0..workers * 2 {
            let (tx, rx) = mpsc::channel(WORKER_QUEUE_CAPACITY);
            senders.push(tx);
            handles.push(tokio::spawn(run_worker(
                id,
                rx,
                Arc::clone(&processor),
                Arc::clone(&offsets),
                shutdown_rx.clone(),
            )));
        }
        let retry = senders.split_off(workers);

        info!(
            "Started {} partition workers for {} and {} for {}",
            workers, topics.main, workers, topics.retry
        );

        Self {
            topics,
            main: senders,
            retry,
            handles,
        }
    }

    /// Worker tasks across both topics
    pub fn len(&self) -> usize {
        self.main.len() + self.retry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Queue `record` on its partition's worker, waiting while the queue is full
    pub async fn dispatch(&self, record: ConsumedRecord) -> Result<()> {
        let (lane, offset) = if self.topics.is_retry(&record.topic) {
            (&self.retry, self.main.len())
        } else {
            (&self.main, 0)
        };
        let index = worker_index(&record.topic, record.partition, lane.len());
        lane[index]
            .send(record)
            .await
            .map_err(|_| ConsumerError::WorkerStopped(offset + index))
    }

    /// Close the queues and wait for workers to drain them
    pub async fn shutdown(self) {
        drop(self.main);
        drop(self.retry);
        for handle in self.handles {
            if let Err(e) = handle.await {
                error!("Partition worker panicked: {}", e);
            }
        }
        info!("All partition workers stopped");
    }
}

async fn run_worker<P>(
    id: usize,
    mut rx: mpsc::Receiver<ConsumedRecord>,
    processor: Arc<RecordProcessor<P>>,
    offsets: Arc<dyn OffsetStore>,
    mut shutdown_rx: watch::Receiver<bool>,
) where
    P: RecordPublisher + 'static,
{
    debug!(worker = id, "Partition worker started");

    while let Some(record) = rx.recv().await {
        let outcome = processor.process(&record, &mut shutdown_rx).await;

        if !outcome.is_terminal() {
            // Later offsets of this partition must not be stored past the abandoned one
            warn!(
                worker = id,
                topic = %record.topic,
                partition = record.partition,
                offset = record.offset,
                "Record abandoned, stopping worker"
            );
            break;
        }

        if let ProcessOutcome::Redelivered(redelivered) = &outcome {
            debug!(
                worker = id,
                topic = %record.topic,
                partition = record.partition,
                offset = record.offset,
                outcome = ?redelivered,
                "Record redelivered"
            );
        }

        if let Err(e) = offsets.store(&record.topic, record.partition, record.offset) {
            warn!(
                worker = id,
                topic = %record.topic,
                partition = record.partition,
                offset = record.offset,
                error = %e,
                "Failed to store offset"
            );
        }
    }

    debug!(worker = id, "Partition worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_index_is_stable() {
        let first = worker_index("library-events", 4, 3);
        for _ in 0..10 {
            assert_eq!(worker_index("library-events", 4, 3), first);
        }
        assert!(first < 3);
    }

    #[test]
    fn test_single_worker_takes_everything() {
        for partition in 0..16 {
            assert_eq!(worker_index("library-events.RETRY", partition, 1), 0);
        }
    }
}
