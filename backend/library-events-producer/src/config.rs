//! Configuration for the producer service
use library_event::headers::DEFAULT_EVENT_SOURCE;
use library_event::topics::LIBRARY_EVENTS;
use serde::Deserialize;
use std::time::Duration;

use crate::producer::ProducerConfig;

/// How the CLI driver sends each event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SendMode {
    #[default]
    FireAndReport,
    Blocking,
}

/// Main configuration struct, loaded from environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Kafka broker addresses
    #[serde(default = "default_kafka_brokers")]
    pub kafka_brokers: String,

    /// Topic library events are published to
    #[serde(default = "default_library_events_topic")]
    pub library_events_topic: String,

    /// Value of the `event-source` header; empty disables the header
    #[serde(default = "default_event_source_header")]
    pub event_source_header: String,

    /// Upper bound on waiting for a broker acknowledgment
    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,

    #[serde(default)]
    pub send_mode: SendMode,

    /// `json` switches log output to JSON lines
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

fn default_kafka_brokers() -> String {
    "localhost:9092".to_string()
}

fn default_library_events_topic() -> String {
    LIBRARY_EVENTS.to_string()
}

fn default_event_source_header() -> String {
    DEFAULT_EVENT_SOURCE.to_string()
}

fn default_send_timeout_ms() -> u64 {
    10_000
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::from_env()
    }

    pub fn json_logs(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }

    pub fn producer_config(&self) -> ProducerConfig {
        let event_source = Some(self.event_source_header.trim())
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        ProducerConfig {
            topic: self.library_events_topic.clone(),
            event_source,
            send_timeout: Duration::from_millis(self.send_timeout_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_env() {
        let config: Config = envy::from_iter(Vec::<(String, String)>::new()).unwrap();
        assert_eq!(config.kafka_brokers, "localhost:9092");
        assert_eq!(config.library_events_topic, "library-events");
        assert_eq!(config.send_mode, SendMode::FireAndReport);
        assert!(!config.json_logs());

        let producer = config.producer_config();
        assert_eq!(producer.event_source.as_deref(), Some("scanner"));
        assert_eq!(producer.send_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_empty_event_source_disables_header() {
        let config: Config = envy::from_iter(vec![
            ("EVENT_SOURCE_HEADER".to_string(), "".to_string()),
            ("SEND_MODE".to_string(), "blocking".to_string()),
        ])
        .unwrap();
        assert!(config.producer_config().event_source.is_none());
        assert_eq!(config.send_mode, SendMode::Blocking);
    }
}
