//! Library event producer
//!
//! Serializes events to JSON, keys them by event id and hands them to a
//! `RecordPublisher`. Two send modes are offered:
//!
//! - `send_library_event` returns immediately with a `SendHandle`; the
//!   outcome is delivered to the `DeliveryReporter` on a background task
//! - `send_library_event_sync` waits for the broker acknowledgment, bounded
//!   by the configured send timeout

use library_event::headers::EVENT_SOURCE;
use library_event::topics::LIBRARY_EVENTS;
use library_event::LibraryEvent;
use redelivery::{Delivery, OutgoingRecord, PublishError, RecordPublisher};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::reporter::{DeliveryReporter, LoggingDeliveryReporter, SendReport};

#[derive(Debug, Clone)]
pub struct ProducerConfig {
    pub topic: String,
    /// Value of the `event-source` header, omitted when `None`
    pub event_source: Option<String>,
    pub send_timeout: Duration,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            topic: LIBRARY_EVENTS.to_string(),
            event_source: None,
            send_timeout: Duration::from_secs(10),
        }
    }
}

/// Handle to an in-flight fire-and-report send
pub struct SendHandle {
    outcome: oneshot::Receiver<Result<SendReport, PublishError>>,
    task: JoinHandle<()>,
}

impl SendHandle {
    /// Stop waiting for the acknowledgment and suppress the report.
    ///
    /// A record already handed to the client may still be delivered.
    pub fn cancel(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the send to complete
    pub async fn outcome(self) -> Result<SendReport, PublishError> {
        self.outcome.await.unwrap_or(Err(PublishError::Cancelled))
    }
}

/// Sends that completed, by outcome
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SendTally {
    pub sent: usize,
    pub failed: usize,
}

impl SendTally {
    fn record(&mut self, outcome: &Result<SendReport, PublishError>) {
        match outcome {
            Ok(_) => self.sent += 1,
            Err(_) => self.failed += 1,
        }
    }
}

impl std::ops::AddAssign for SendTally {
    fn add_assign(&mut self, other: Self) {
        self.sent += other.sent;
        self.failed += other.failed;
    }
}

/// Fire-and-report handles still awaiting their outcome, at most
/// `max_in_flight` of them
pub struct PendingSends {
    handles: VecDeque<SendHandle>,
    max_in_flight: usize,
}

impl PendingSends {
    pub fn new(max_in_flight: usize) -> Self {
        Self {
            handles: VecDeque::new(),
            max_in_flight: max_in_flight.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Track `handle` and collect every send that has finished. Over the
    /// limit, waits for the oldest sends.
    pub async fn push(&mut self, handle: SendHandle) -> SendTally {
        self.handles.push_back(handle);

        let mut tally = SendTally::default();
        let (finished, running): (VecDeque<_>, VecDeque<_>) =
            self.handles.drain(..).partition(SendHandle::is_finished);
        self.handles = running;

        for handle in finished {
            tally.record(&handle.outcome().await);
        }
        while self.handles.len() > self.max_in_flight {
            if let Some(oldest) = self.handles.pop_front() {
                tally.record(&oldest.outcome().await);
            }
        }
        tally
    }

    /// Wait for every remaining send
    pub async fn drain(&mut self) -> SendTally {
        let mut tally = SendTally::default();
        while let Some(handle) = self.handles.pop_front() {
            tally.record(&handle.outcome().await);
        }
        tally
    }
}

/// A serialized event ready to publish
struct PreparedSend {
    key: Option<i32>,
    value: String,
    record: OutgoingRecord,
}

pub struct LibraryEventProducer<P: RecordPublisher> {
    publisher: Arc<P>,
    config: ProducerConfig,
    reporter: Arc<dyn DeliveryReporter>,
}

impl<P: RecordPublisher + 'static> LibraryEventProducer<P> {
    pub fn new(publisher: Arc<P>, config: ProducerConfig) -> Self {
        Self {
            publisher,
            config,
            reporter: Arc::new(LoggingDeliveryReporter),
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn DeliveryReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn config(&self) -> &ProducerConfig {
        &self.config
    }

    /// Send without waiting for the broker.
    ///
    /// Serialization failures are returned here; broker failures and
    /// timeouts go to the reporter and to the handle's outcome.
    pub fn send_library_event(&self, event: &LibraryEvent) -> Result<SendHandle, PublishError> {
        let prepared = self.prepare(event)?;
        let publisher = Arc::clone(&self.publisher);
        let reporter = Arc::clone(&self.reporter);
        let send_timeout = self.config.send_timeout;
        let (tx, rx) = oneshot::channel();

        let task = tokio::spawn(async move {
            let PreparedSend { key, value, record } = prepared;
            let result = publish_with_timeout(publisher.as_ref(), record, send_timeout)
                .await
                .map(|delivery| SendReport {
                    key,
                    value: value.clone(),
                    partition: delivery.partition,
                    offset: delivery.offset,
                });

            match &result {
                Ok(report) => reporter.on_success(report),
                Err(e) => reporter.on_failure(key, &value, e),
            }

            // Receiver may have been dropped; the reporter already saw the outcome
            let _ = tx.send(result);
        });

        Ok(SendHandle { outcome: rx, task })
    }

    /// Send and wait for the broker acknowledgment
    pub async fn send_library_event_sync(
        &self,
        event: &LibraryEvent,
    ) -> Result<SendReport, PublishError> {
        let PreparedSend { key, value, record } = self.prepare(event)?;

        match publish_with_timeout(self.publisher.as_ref(), record, self.config.send_timeout).await
        {
            Ok(delivery) => {
                info!(
                    key = ?key,
                    partition = delivery.partition,
                    offset = delivery.offset,
                    "Message sent successfully"
                );
                Ok(SendReport {
                    key,
                    value,
                    partition: delivery.partition,
                    offset: delivery.offset,
                })
            }
            Err(e) => {
                error!(key = ?key, error = %e, "Error sending the message");
                Err(e)
            }
        }
    }

    fn prepare(&self, event: &LibraryEvent) -> Result<PreparedSend, PublishError> {
        let value = event.to_json()?;
        let key = event.library_event_id;

        let mut record = OutgoingRecord::to(self.config.topic.clone()).with_payload(value.clone());
        if let Some(key_bytes) = event.record_key() {
            record = record.with_key(key_bytes.to_vec());
        }
        if let Some(source) = &self.config.event_source {
            record = record.with_header(EVENT_SOURCE, source.as_str());
        }

        debug!(topic = %record.topic, key = ?key, "Prepared library event record");

        Ok(PreparedSend { key, value, record })
    }
}

async fn publish_with_timeout<P: RecordPublisher + ?Sized>(
    publisher: &P,
    record: OutgoingRecord,
    send_timeout: Duration,
) -> Result<Delivery, PublishError> {
    tokio::time::timeout(send_timeout, publisher.publish(record))
        .await
        .map_err(|_| PublishError::Timeout(send_timeout))?
}
