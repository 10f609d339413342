//! Error types for the redelivery library.

use rdkafka::error::KafkaError;
use std::time::Duration;
use thiserror::Error;

/// The two failure classes a processing error can fall into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureClass {
    /// Retry up to the configured bound, then dead-letter
    Transient,
    /// Dead-letter immediately
    Permanent,
}

impl FailureClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureClass::Transient => "transient",
            FailureClass::Permanent => "permanent",
        }
    }
}

impl std::fmt::Display for FailureClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification is a function of the error's kind only.
pub trait Classify {
    fn failure_class(&self) -> FailureClass;
}

/// Errors raised while turning a consumed record into a persisted event
#[derive(Error, Debug)]
pub enum ProcessingError {
    /// Downstream dependency unavailable or timed out
    #[error("Transient failure: {0}")]
    Transient(String),

    /// Invalid input, missing reference or failed validation
    #[error("Invalid input: {0}")]
    Permanent(String),

    /// Record value could not be decoded
    #[error("Deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),

    /// Anything not explicitly classified
    #[error("{0}")]
    Unclassified(#[from] anyhow::Error),
}

impl ProcessingError {
    pub fn transient(reason: impl Into<String>) -> Self {
        ProcessingError::Transient(reason.into())
    }

    pub fn permanent(reason: impl Into<String>) -> Self {
        ProcessingError::Permanent(reason.into())
    }

    /// Name of the variant, written to dead-letter headers
    pub fn kind(&self) -> &'static str {
        match self {
            ProcessingError::Transient(_) => "Transient",
            ProcessingError::Permanent(_) => "Permanent",
            ProcessingError::Deserialization(_) => "Deserialization",
            ProcessingError::Unclassified(_) => "Unclassified",
        }
    }
}

impl Classify for ProcessingError {
    fn failure_class(&self) -> FailureClass {
        match self {
            ProcessingError::Permanent(_) | ProcessingError::Deserialization(_) => {
                FailureClass::Permanent
            }
            // Unknown failures are retried before they are dead-lettered
            ProcessingError::Transient(_) | ProcessingError::Unclassified(_) => {
                FailureClass::Transient
            }
        }
    }
}

/// Broker rejected, timed out or never completed a send
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Kafka error: {0}")]
    Kafka(#[from] KafkaError),

    #[error("Publish timed out after {0:?}")]
    Timeout(Duration),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Send cancelled before completion")]
    Cancelled,
}

/// Failure to carry out a routing decision
#[derive(Error, Debug)]
pub enum RedeliveryError {
    #[error("Failed to publish record to {topic}[{partition}]: {source}")]
    Publish {
        topic: String,
        partition: i32,
        #[source]
        source: PublishError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_classes() {
        assert_eq!(
            ProcessingError::transient("db timeout").failure_class(),
            FailureClass::Transient
        );
        assert_eq!(
            ProcessingError::permanent("missing id").failure_class(),
            FailureClass::Permanent
        );
    }

    #[test]
    fn test_deserialization_is_permanent() {
        let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err = ProcessingError::from(err);
        assert_eq!(err.failure_class(), FailureClass::Permanent);
        assert_eq!(err.kind(), "Deserialization");
    }

    #[test]
    fn test_unclassified_defaults_to_transient() {
        let err = ProcessingError::from(anyhow::anyhow!("something odd"));
        assert_eq!(err.failure_class(), FailureClass::Transient);
    }

    #[test]
    fn test_classification_ignores_message_text() {
        let looks_permanent = ProcessingError::transient("invalid input");
        assert_eq!(looks_permanent.failure_class(), FailureClass::Transient);
    }
}
