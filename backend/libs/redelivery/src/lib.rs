//! # Redelivery Policy for Kafka Consumers
//!
//! Decides what happens to a consumed record whose processing failed, and
//! carries that decision out. This replaces framework-injected retry
//! interceptors with an explicit, testable component.
//!
//! ## Failure classes
//!
//! Every processing error is classified by its kind, never by its message:
//!
//! - **Transient** (dependency unavailable, timeouts, unclassified errors):
//!   retried up to `max_attempts` times with exponential backoff, then
//!   dead-lettered.
//! - **Permanent** (invalid input, failed validation, undecodable payload):
//!   dead-lettered immediately.
//!
//! Records are never dropped because of a failure. The only discard path is a
//! record without a value, which has nothing to redeliver.
//!
//! ## Architecture
//!
//! ```text
//! worker ──failure──▶ RedeliveryHandler ──decide──▶ RedeliveryPolicy
//!                          │                             │
//!                          │◀──── RoutingDecision ───────┘
//!                          ├──▶ RetryListener (observability hook)
//!                          └──▶ RecordPublisher ──▶ retry topic | dead-letter topic
//!                                                   (same partition as source)
//! ```
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use redelivery::{
//!     ConsumedRecord, KafkaRecordPublisher, ProcessingError, RedeliveryConfig,
//!     RedeliveryHandler, RedeliveryOutcome, RedeliveryPolicy, RedeliveryTopics,
//! };
//! use std::sync::Arc;
//!
//! # async fn example(record: ConsumedRecord) -> Result<(), Box<dyn std::error::Error>> {
//! let publisher = Arc::new(KafkaRecordPublisher::new("localhost:9092")?);
//! let policy = RedeliveryPolicy::new(
//!     RedeliveryConfig::default(),
//!     RedeliveryTopics::new("library-events.RETRY", "library-events.DLT"),
//! );
//! let handler = RedeliveryHandler::new(policy, publisher);
//!
//! let error = ProcessingError::permanent("Not a valid Library Event");
//! match handler.handle_failure(&record, &error, 1).await? {
//!     RedeliveryOutcome::Routed { destination, .. } => {
//!         println!("routed to {}[{}]", destination.topic, destination.partition);
//!     }
//!     RedeliveryOutcome::RetryLocally { delay } => tokio::time::sleep(delay).await,
//!     RedeliveryOutcome::Discarded => {}
//! }
//! # Ok(())
//! # }
//! ```

pub mod backoff;
mod error;
pub mod handler;
pub mod headers;
pub mod listener;
pub mod metrics;
pub mod policy;
pub mod publisher;
pub mod record;

pub use backoff::ExponentialBackoff;
pub use error::{Classify, FailureClass, ProcessingError, PublishError, RedeliveryError};
pub use handler::{DeliveryAttempt, RedeliveryHandler, RedeliveryOutcome};
pub use listener::{LoggingRetryListener, RetryListener};
pub use metrics::RedeliveryMetrics;
pub use policy::{
    Destination, DestinationKind, RedeliveryConfig, RedeliveryPolicy, RedeliveryStrategy,
    RedeliveryTopics, RoutingDecision,
};
pub use publisher::{KafkaRecordPublisher, RecordPublisher};
pub use record::{ConsumedRecord, Delivery, OutgoingRecord};
