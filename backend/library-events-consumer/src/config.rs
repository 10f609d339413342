//! Configuration for the consumer service
use library_event::topics::{LIBRARY_EVENTS, LIBRARY_EVENTS_DLT, LIBRARY_EVENTS_RETRY};
use library_event::TopicConfig;
use redelivery::{ExponentialBackoff, RedeliveryConfig, RedeliveryStrategy, RedeliveryTopics};
use serde::Deserialize;
use std::time::Duration;

use crate::consumer::LibraryEventsConsumerConfig;

/// Main configuration struct, loaded from environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Kafka broker addresses
    #[serde(default = "default_kafka_brokers")]
    pub kafka_brokers: String,

    #[serde(default = "default_kafka_group_id")]
    pub kafka_group_id: String,

    #[serde(default = "default_library_events_topic")]
    pub library_events_topic: String,

    #[serde(default = "default_library_events_retry_topic")]
    pub library_events_retry_topic: String,

    #[serde(default = "default_library_events_dlt_topic")]
    pub library_events_dlt_topic: String,

    /// Delay before the first retry
    #[serde(default = "default_retry_initial_interval_ms")]
    pub retry_initial_interval_ms: u64,

    #[serde(default = "default_retry_multiplier")]
    pub retry_multiplier: f64,

    /// Upper bound on any single retry delay
    #[serde(default = "default_retry_max_interval_ms")]
    pub retry_max_interval_ms: u64,

    /// Retries after the first failed attempt
    #[serde(default = "default_retry_max_attempts")]
    pub retry_max_attempts: u32,

    #[serde(default)]
    pub redelivery_strategy: RedeliveryStrategy,

    /// Number of partition workers
    #[serde(default = "default_consumer_concurrency")]
    pub consumer_concurrency: usize,

    /// PostgreSQL connection string; in-memory storage when unset
    #[serde(default)]
    pub database_url: Option<String>,

    #[serde(default = "default_database_max_connections")]
    pub database_max_connections: u32,

    /// `json` switches log output to JSON lines
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

fn default_kafka_brokers() -> String {
    "localhost:9092".to_string()
}

fn default_kafka_group_id() -> String {
    "library-events-listener-group".to_string()
}

fn default_library_events_topic() -> String {
    LIBRARY_EVENTS.to_string()
}

fn default_library_events_retry_topic() -> String {
    LIBRARY_EVENTS_RETRY.to_string()
}

fn default_library_events_dlt_topic() -> String {
    LIBRARY_EVENTS_DLT.to_string()
}

fn default_retry_initial_interval_ms() -> u64 {
    1_000
}

fn default_retry_multiplier() -> f64 {
    2.0
}

fn default_retry_max_interval_ms() -> u64 {
    10_000
}

fn default_retry_max_attempts() -> u32 {
    2
}

fn default_consumer_concurrency() -> usize {
    3
}

fn default_database_max_connections() -> u32 {
    10
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::from_env()
    }

    pub fn topics(&self) -> TopicConfig {
        TopicConfig::new(
            self.library_events_topic.clone(),
            self.library_events_retry_topic.clone(),
            self.library_events_dlt_topic.clone(),
        )
    }

    pub fn redelivery_topics(&self) -> RedeliveryTopics {
        RedeliveryTopics::new(
            self.library_events_retry_topic.clone(),
            self.library_events_dlt_topic.clone(),
        )
    }

    pub fn redelivery(&self) -> RedeliveryConfig {
        RedeliveryConfig {
            backoff: ExponentialBackoff::new(
                Duration::from_millis(self.retry_initial_interval_ms),
                self.retry_multiplier,
                Duration::from_millis(self.retry_max_interval_ms),
            ),
            max_attempts: self.retry_max_attempts,
            strategy: self.redelivery_strategy,
        }
    }

    pub fn consumer_config(&self) -> LibraryEventsConsumerConfig {
        LibraryEventsConsumerConfig {
            brokers: self.kafka_brokers.clone(),
            group_id: self.kafka_group_id.clone(),
            topics: self.topics(),
            concurrency: self.concurrency(),
        }
    }

    /// Worker count, never below one
    pub fn concurrency(&self) -> usize {
        self.consumer_concurrency.max(1)
    }

    pub fn database_url(&self) -> Option<&str> {
        self.database_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    pub fn json_logs(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }
}
