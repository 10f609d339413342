/// Topic names shared by publisher and consumer
pub const LIBRARY_EVENTS: &str = "library-events";
pub const LIBRARY_EVENTS_RETRY: &str = "library-events.RETRY";
pub const LIBRARY_EVENTS_DLT: &str = "library-events.DLT";

/// Topic configuration passed to both services' constructors.
///
/// The retry and dead-letter topics must have at least as many partitions as
/// the main topic, since redelivered records keep their source partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicConfig {
    pub main: String,
    pub retry: String,
    pub dead_letter: String,
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            main: LIBRARY_EVENTS.to_string(),
            retry: LIBRARY_EVENTS_RETRY.to_string(),
            dead_letter: LIBRARY_EVENTS_DLT.to_string(),
        }
    }
}

impl TopicConfig {
    pub fn new(
        main: impl Into<String>,
        retry: impl Into<String>,
        dead_letter: impl Into<String>,
    ) -> Self {
        Self {
            main: main.into(),
            retry: retry.into(),
            dead_letter: dead_letter.into(),
        }
    }

    pub fn is_retry(&self, topic: &str) -> bool {
        topic == self.retry
    }

    /// Topics the consumer subscribes to (main first)
    pub fn subscriptions(&self) -> Vec<&str> {
        vec![self.main.as_str(), self.retry.as_str()]
    }
}
