//! Per-record processing pipeline run by each partition worker
//!
//! A record is processed until it reaches a terminal outcome: persisted,
//! routed to the retry or dead-letter topic, or discarded. Waits for retry
//! deadlines, local backoff and failed redelivery publishes all give way to
//! shutdown, in which case the record is abandoned and its offset is never
//! stored.

use chrono::Utc;
use library_event::LibraryEvent;
use redelivery::{
    ConsumedRecord, ProcessingError, RecordPublisher, RedeliveryHandler, RedeliveryOutcome,
};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, warn};

use crate::service::LibraryEventService;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    Persisted(LibraryEvent),
    /// Routed to another topic or discarded
    Redelivered(RedeliveryOutcome),
    /// Shutdown interrupted a wait; the record must be consumed again
    Abandoned,
}

impl ProcessOutcome {
    /// Whether the record's offset may be stored
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ProcessOutcome::Abandoned)
    }
}

pub struct RecordProcessor<P: RecordPublisher> {
    service: LibraryEventService,
    handler: RedeliveryHandler<P>,
}

impl<P: RecordPublisher> RecordProcessor<P> {
    pub fn new(service: LibraryEventService, handler: RedeliveryHandler<P>) -> Self {
        Self { service, handler }
    }

    pub fn service(&self) -> &LibraryEventService {
        &self.service
    }

    pub fn handler(&self) -> &RedeliveryHandler<P> {
        &self.handler
    }

    pub async fn process(
        &self,
        record: &ConsumedRecord,
        shutdown: &mut watch::Receiver<bool>,
    ) -> ProcessOutcome {
        if let Some(not_before) = record.retry_not_before() {
            let wait_ms = not_before - Utc::now().timestamp_millis();
            if wait_ms > 0 {
                debug!(
                    topic = %record.topic,
                    partition = record.partition,
                    offset = record.offset,
                    wait_ms = wait_ms,
                    "Waiting for retry deadline"
                );
                if !sleep_unless_shutdown(Duration::from_millis(wait_ms as u64), shutdown).await {
                    return ProcessOutcome::Abandoned;
                }
            }
        }

        let mut attempt = record.delivery_attempts().saturating_add(1);

        loop {
            let error = match self.service.process(record).await {
                Ok(event) => return ProcessOutcome::Persisted(event),
                Err(e) => e,
            };

            let Some(outcome) = self.route(record, &error, attempt, shutdown).await else {
                return ProcessOutcome::Abandoned;
            };

            match outcome {
                RedeliveryOutcome::RetryLocally { delay } => {
                    if !sleep_unless_shutdown(delay, shutdown).await {
                        return ProcessOutcome::Abandoned;
                    }
                    attempt = attempt.saturating_add(1);
                }
                outcome => return ProcessOutcome::Redelivered(outcome),
            }
        }
    }

    /// Run the routing decision until its publish succeeds or shutdown begins
    async fn route(
        &self,
        record: &ConsumedRecord,
        error: &ProcessingError,
        attempt: u32,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Option<RedeliveryOutcome> {
        let stall = self.handler.policy().config().backoff.max_interval;

        loop {
            match self.handler.handle_failure(record, error, attempt).await {
                Ok(outcome) => return Some(outcome),
                Err(e) => {
                    error!(
                        topic = %record.topic,
                        partition = record.partition,
                        offset = record.offset,
                        error = %e,
                        stall_ms = stall.as_millis() as u64,
                        "Redelivery failed, partition stalled"
                    );
                    if !sleep_unless_shutdown(stall, shutdown).await {
                        warn!(
                            topic = %record.topic,
                            partition = record.partition,
                            offset = record.offset,
                            "Abandoning record on shutdown"
                        );
                        return None;
                    }
                }
            }
        }
    }
}

/// Sleep for `duration`; false if shutdown was signalled first
pub(crate) async fn sleep_unless_shutdown(
    duration: Duration,
    shutdown: &mut watch::Receiver<bool>,
) -> bool {
    if *shutdown.borrow() {
        return false;
    }

    tokio::select! {
        _ = tokio::time::sleep(duration) => true,
        _ = shutdown_requested(shutdown) => false,
    }
}

async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    // A dropped sender never signals
    if shutdown.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}
