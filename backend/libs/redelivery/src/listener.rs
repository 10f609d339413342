//! Observability hook invoked for every retry and dead-letter routing.

use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{error, info};

use crate::error::{ProcessingError, PublishError};
use crate::policy::Destination;
use crate::record::ConsumedRecord;

/// Hook called before each retry and before dead-lettering.
///
/// Implementations only observe: the routing decision is already made and a
/// panic raised here is caught and logged.
pub trait RetryListener: Send + Sync {
    fn on_retry_attempt(&self, record: &ConsumedRecord, error: &ProcessingError, attempt: u32);

    /// Called when publishing to the routing destination fails
    fn on_publish_failure(
        &self,
        _record: &ConsumedRecord,
        _destination: &Destination,
        _error: &PublishError,
    ) {
    }
}

/// Logs each failed record
#[derive(Debug, Default, Clone)]
pub struct LoggingRetryListener;

impl RetryListener for LoggingRetryListener {
    fn on_retry_attempt(&self, record: &ConsumedRecord, error: &ProcessingError, attempt: u32) {
        info!(
            topic = %record.topic,
            partition = record.partition,
            offset = record.offset,
            delivery_attempt = attempt,
            error = %error,
            "Failed record in retry listener"
        );
    }

    fn on_publish_failure(
        &self,
        record: &ConsumedRecord,
        destination: &Destination,
        error: &PublishError,
    ) {
        error!(
            topic = %record.topic,
            partition = record.partition,
            offset = record.offset,
            destination = %destination.topic,
            error = %error,
            "Failed to publish record to redelivery destination"
        );
    }
}

pub(crate) fn notify_attempt(
    listener: &dyn RetryListener,
    record: &ConsumedRecord,
    error: &ProcessingError,
    attempt: u32,
) {
    let result = catch_unwind(AssertUnwindSafe(|| {
        listener.on_retry_attempt(record, error, attempt)
    }));
    if result.is_err() {
        error!(
            topic = %record.topic,
            partition = record.partition,
            offset = record.offset,
            "Retry listener panicked; routing continues"
        );
    }
}

pub(crate) fn notify_publish_failure(
    listener: &dyn RetryListener,
    record: &ConsumedRecord,
    destination: &Destination,
    publish_error: &PublishError,
) {
    let result = catch_unwind(AssertUnwindSafe(|| {
        listener.on_publish_failure(record, destination, publish_error)
    }));
    if result.is_err() {
        error!(
            topic = %record.topic,
            partition = record.partition,
            "Retry listener panicked while reporting publish failure"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct PanickingListener;

    impl RetryListener for PanickingListener {
        fn on_retry_attempt(&self, _: &ConsumedRecord, _: &ProcessingError, _: u32) {
            panic!("listener bug");
        }
    }

    #[test]
    fn test_panicking_listener_is_contained() {
        let record = ConsumedRecord::new("t", 0, 0).with_value("{}");
        let error = ProcessingError::transient("timeout");
        notify_attempt(&PanickingListener, &record, &error, 1);
    }
}
