//! Library Events Consumer
//!
//! This service provides:
//! - Consumption of the library events and retry topics
//! - Persistence of `NEW` and validated `UPDATE` events
//! - Failure classification with retry-topic or in-place backoff redelivery
//! - Dead-lettering of permanent and exhausted failures on the source partition

pub mod config;
pub mod consumer;
pub mod error;
pub mod processor;
pub mod repository;
pub mod service;
pub mod shutdown;
pub mod workers;

pub use config::Config;
pub use consumer::{LibraryEventsConsumer, LibraryEventsConsumerConfig};
pub use error::{ConsumerError, Result};
pub use processor::{ProcessOutcome, RecordProcessor};
pub use repository::{
    InMemoryLibraryEventRepository, LibraryEventRepository, PgLibraryEventRepository,
    RepositoryError,
};
pub use service::LibraryEventService;
pub use shutdown::forward_shutdown_signal;
pub use workers::{OffsetStore, WorkerPool};
