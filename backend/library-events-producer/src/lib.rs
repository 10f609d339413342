//! Library Events Producer
//!
//! This service provides:
//! - JSON serialization of library events keyed by event id
//! - Fire-and-report sends with a completion callback and a cancellable handle
//! - Blocking sends that wait for the broker acknowledgment
//! - A static `event-source` header identifying the record's origin

pub mod config;
pub mod producer;
pub mod reporter;

pub use config::{Config, SendMode};
pub use producer::{LibraryEventProducer, PendingSends, ProducerConfig, SendHandle, SendTally};
pub use reporter::{DeliveryReporter, LoggingDeliveryReporter, SendReport};
