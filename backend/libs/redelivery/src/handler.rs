/// Carries out routing decisions for failed records
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{Classify, FailureClass, ProcessingError, RedeliveryError};
use crate::headers;
use crate::listener::{self, LoggingRetryListener, RetryListener};
use crate::metrics::RedeliveryMetrics;
use crate::policy::{Destination, DestinationKind, RedeliveryPolicy, RoutingDecision};
use crate::publisher::RecordPublisher;
use crate::record::{ConsumedRecord, Delivery, OutgoingRecord};

/// One failed processing attempt; lives only until the routing decision is made
#[derive(Debug)]
pub struct DeliveryAttempt<'a> {
    pub record: &'a ConsumedRecord,
    /// 1-based count of processing attempts, this one included
    pub attempt_number: u32,
    pub last_error: &'a ProcessingError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedeliveryOutcome {
    /// Caller waits `delay`, then processes the record again
    RetryLocally { delay: Duration },
    /// Record was published to a retry or dead-letter topic
    Routed {
        destination: Destination,
        delivery: Delivery,
    },
    Discarded,
}

impl RedeliveryOutcome {
    /// True once the record needs no further processing on this worker
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RedeliveryOutcome::RetryLocally { .. })
    }
}

pub struct RedeliveryHandler<P: RecordPublisher> {
    policy: RedeliveryPolicy,
    publisher: Arc<P>,
    listener: Arc<dyn RetryListener>,
    metrics: Option<RedeliveryMetrics>,
}

impl<P: RecordPublisher> RedeliveryHandler<P> {
    pub fn new(policy: RedeliveryPolicy, publisher: Arc<P>) -> Self {
        Self {
            policy,
            publisher,
            listener: Arc::new(LoggingRetryListener),
            metrics: None,
        }
    }

    pub fn with_listener(mut self, listener: Arc<dyn RetryListener>) -> Self {
        self.listener = listener;
        self
    }

    pub fn with_metrics(mut self, metrics: RedeliveryMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn policy(&self) -> &RedeliveryPolicy {
        &self.policy
    }

    /// Route `record` after its `attempt_number`-th failed attempt.
    ///
    /// The only I/O is the publish to the chosen destination; its failure is
    /// returned, never swallowed, and the caller must not treat the record as
    /// done.
    pub async fn handle_failure(
        &self,
        record: &ConsumedRecord,
        error: &ProcessingError,
        attempt_number: u32,
    ) -> Result<RedeliveryOutcome, RedeliveryError> {
        let attempt = DeliveryAttempt {
            record,
            attempt_number,
            last_error: error,
        };
        let class = error.failure_class();

        match self.policy.decide(record, class, attempt_number) {
            RoutingDecision::Discard => {
                warn!(
                    topic = %record.topic,
                    partition = record.partition,
                    offset = record.offset,
                    error = %error,
                    "Discarding failed record without value"
                );
                if let Some(metrics) = &self.metrics {
                    metrics.discarded.inc();
                }
                Ok(RedeliveryOutcome::Discarded)
            }
            RoutingDecision::RetryLocally { delay } => {
                listener::notify_attempt(self.listener.as_ref(), record, error, attempt_number);
                if let Some(metrics) = &self.metrics {
                    metrics.retried.inc();
                }
                debug!(
                    topic = %record.topic,
                    partition = record.partition,
                    offset = record.offset,
                    attempt = attempt_number,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying record locally"
                );
                Ok(RedeliveryOutcome::RetryLocally { delay })
            }
            RoutingDecision::Retry { destination, delay } => {
                listener::notify_attempt(self.listener.as_ref(), record, error, attempt_number);
                let not_before = Utc::now().timestamp_millis() + delay.as_millis() as i64;
                let outgoing = build_redelivery(&attempt, &destination, class, Some(not_before));
                let delivery = self.publish(record, &destination, outgoing).await?;
                if let Some(metrics) = &self.metrics {
                    metrics.retried.inc();
                }
                Ok(RedeliveryOutcome::Routed {
                    destination,
                    delivery,
                })
            }
            RoutingDecision::DeadLetter { destination, class } => {
                listener::notify_attempt(self.listener.as_ref(), record, error, attempt_number);
                let outgoing = build_redelivery(&attempt, &destination, class, None);
                let delivery = self.publish(record, &destination, outgoing).await?;
                if let Some(metrics) = &self.metrics {
                    metrics.dead_lettered.inc();
                }
                warn!(
                    topic = %record.topic,
                    partition = record.partition,
                    offset = record.offset,
                    dead_letter_topic = %destination.topic,
                    failure_class = %class,
                    attempts = attempt_number,
                    error = %error,
                    "Record dead-lettered"
                );
                Ok(RedeliveryOutcome::Routed {
                    destination,
                    delivery,
                })
            }
        }
    }

    async fn publish(
        &self,
        record: &ConsumedRecord,
        destination: &Destination,
        outgoing: OutgoingRecord,
    ) -> Result<Delivery, RedeliveryError> {
        match self.publisher.publish(outgoing).await {
            Ok(delivery) => {
                debug!(
                    destination = %destination.topic,
                    kind = destination.kind.as_str(),
                    partition = delivery.partition,
                    offset = delivery.offset,
                    "Redelivered record published"
                );
                Ok(delivery)
            }
            Err(source) => {
                listener::notify_publish_failure(
                    self.listener.as_ref(),
                    record,
                    destination,
                    &source,
                );
                if let Some(metrics) = &self.metrics {
                    metrics.publish_failures.inc();
                }
                Err(RedeliveryError::Publish {
                    topic: destination.topic.clone(),
                    partition: destination.partition,
                    source,
                })
            }
        }
    }
}

/// Copy the failed record for `destination`, keeping key, value and the
/// caller's headers, and stamping the redelivery headers.
fn build_redelivery(
    attempt: &DeliveryAttempt<'_>,
    destination: &Destination,
    class: FailureClass,
    not_before: Option<i64>,
) -> OutgoingRecord {
    let record = attempt.record;

    let mut outgoing = OutgoingRecord::to(destination.topic.clone())
        .with_partition(destination.partition);
    outgoing.key = record.key.clone();
    outgoing.payload = record.value.clone();
    outgoing.headers = record
        .headers
        .iter()
        .filter(|(key, _)| !headers::PER_ATTEMPT.contains(&key.as_str()))
        .cloned()
        .collect();

    if record.header(headers::ORIGINAL_TOPIC).is_none() {
        outgoing = outgoing
            .with_header(headers::ORIGINAL_TOPIC, record.topic.as_str())
            .with_header(headers::ORIGINAL_PARTITION, record.partition.to_string())
            .with_header(headers::ORIGINAL_OFFSET, record.offset.to_string());
    }

    outgoing = outgoing
        .with_header(headers::DELIVERY_ATTEMPT, attempt.attempt_number.to_string())
        .with_header(headers::FAILURE_CLASS, class.as_str())
        .with_header(headers::EXCEPTION_KIND, attempt.last_error.kind())
        .with_header(headers::EXCEPTION_MESSAGE, attempt.last_error.to_string());

    if let (DestinationKind::Retry, Some(not_before)) = (destination.kind, not_before) {
        outgoing = outgoing.with_header(headers::RETRY_NOT_BEFORE, not_before.to_string());
    }

    outgoing
}
