use rdkafka::error::KafkaError;
use thiserror::Error;

use crate::repository::RepositoryError;

pub type Result<T> = std::result::Result<T, ConsumerError>;

#[derive(Error, Debug)]
pub enum ConsumerError {
    #[error("Kafka error: {0}")]
    Kafka(#[from] KafkaError),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Partition worker {0} stopped")]
    WorkerStopped(usize),
}
