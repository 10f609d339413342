/// Routing policy for failed records
///
/// `RedeliveryPolicy::decide` is a pure function of the record, the failure
/// class and the attempt number. It performs no I/O; `RedeliveryHandler`
/// carries the decision out.
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;

use crate::backoff::ExponentialBackoff;
use crate::error::FailureClass;
use crate::record::ConsumedRecord;

/// How a transient failure waits for its next attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RedeliveryStrategy {
    /// Publish to the retry topic and move on; the partition worker is not
    /// blocked and the retry delay travels in a record header.
    #[default]
    RetryTopic,
    /// Sleep the backoff interval on the worker, then re-attempt in place.
    /// Keeps strict per-partition order at the cost of throughput.
    LocalBackoff,
}

impl FromStr for RedeliveryStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "retry-topic" | "retry_topic" => Ok(RedeliveryStrategy::RetryTopic),
            "local-backoff" | "local_backoff" => Ok(RedeliveryStrategy::LocalBackoff),
            other => Err(format!("unknown redelivery strategy '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RedeliveryConfig {
    pub backoff: ExponentialBackoff,
    /// Retries allowed after the first failed attempt
    pub max_attempts: u32,
    pub strategy: RedeliveryStrategy,
}

impl Default for RedeliveryConfig {
    fn default() -> Self {
        Self {
            backoff: ExponentialBackoff::default(),
            max_attempts: 2,
            strategy: RedeliveryStrategy::RetryTopic,
        }
    }
}

/// Destination topics for redelivered records
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedeliveryTopics {
    pub retry: String,
    pub dead_letter: String,
}

impl RedeliveryTopics {
    pub fn new(retry: impl Into<String>, dead_letter: impl Into<String>) -> Self {
        Self {
            retry: retry.into(),
            dead_letter: dead_letter.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestinationKind {
    Retry,
    DeadLetter,
}

impl DestinationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DestinationKind::Retry => "retry",
            DestinationKind::DeadLetter => "dead_letter",
        }
    }
}

/// Topic partition a failed record is routed to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub kind: DestinationKind,
    pub topic: String,
    /// Always the source partition, so per-partition order carries over
    pub partition: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutingDecision {
    /// Wait `delay` on the current worker, then process the record again
    RetryLocally { delay: Duration },
    /// Publish to the retry topic, to be processed no earlier than `delay` from now
    Retry {
        destination: Destination,
        delay: Duration,
    },
    /// Publish to the dead-letter topic; terminal
    DeadLetter {
        destination: Destination,
        class: FailureClass,
    },
    /// Nothing to redeliver (record has no value)
    Discard,
}

#[derive(Debug, Clone)]
pub struct RedeliveryPolicy {
    config: RedeliveryConfig,
    topics: RedeliveryTopics,
}

impl RedeliveryPolicy {
    pub fn new(config: RedeliveryConfig, topics: RedeliveryTopics) -> Self {
        Self { config, topics }
    }

    pub fn config(&self) -> &RedeliveryConfig {
        &self.config
    }

    pub fn topics(&self) -> &RedeliveryTopics {
        &self.topics
    }

    /// Decide the fate of `record` after its `attempt`-th failed processing
    /// attempt (1-based, counting the first delivery).
    pub fn decide(
        &self,
        record: &ConsumedRecord,
        class: FailureClass,
        attempt: u32,
    ) -> RoutingDecision {
        if record.value.is_none() {
            return RoutingDecision::Discard;
        }

        match class {
            FailureClass::Transient if attempt <= self.config.max_attempts => {
                let delay = self.config.backoff.interval(attempt);
                match self.config.strategy {
                    RedeliveryStrategy::LocalBackoff => RoutingDecision::RetryLocally { delay },
                    RedeliveryStrategy::RetryTopic => RoutingDecision::Retry {
                        destination: self.destination(DestinationKind::Retry, record),
                        delay,
                    },
                }
            }
            class => RoutingDecision::DeadLetter {
                destination: self.destination(DestinationKind::DeadLetter, record),
                class,
            },
        }
    }

    fn destination(&self, kind: DestinationKind, record: &ConsumedRecord) -> Destination {
        let topic = match kind {
            DestinationKind::Retry => &self.topics.retry,
            DestinationKind::DeadLetter => &self.topics.dead_letter,
        };

        Destination {
            kind,
            topic: topic.clone(),
            partition: record.partition,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(strategy: RedeliveryStrategy) -> RedeliveryPolicy {
        RedeliveryPolicy::new(
            RedeliveryConfig {
                backoff: ExponentialBackoff::new(
                    Duration::from_millis(100),
                    2.0,
                    Duration::from_millis(1000),
                ),
                max_attempts: 3,
                strategy,
            },
            RedeliveryTopics::new("events.RETRY", "events.DLT"),
        )
    }

    fn record(partition: i32) -> ConsumedRecord {
        ConsumedRecord::new("events", partition, 7).with_value("{}")
    }

    #[test]
    fn test_permanent_goes_straight_to_dead_letter() {
        let decision = policy(RedeliveryStrategy::RetryTopic).decide(
            &record(4),
            FailureClass::Permanent,
            1,
        );
        assert_eq!(
            decision,
            RoutingDecision::DeadLetter {
                destination: Destination {
                    kind: DestinationKind::DeadLetter,
                    topic: "events.DLT".to_string(),
                    partition: 4,
                },
                class: FailureClass::Permanent,
            }
        );
    }

    #[test]
    fn test_transient_routes_to_retry_topic_on_same_partition() {
        match policy(RedeliveryStrategy::RetryTopic).decide(&record(2), FailureClass::Transient, 1)
        {
            RoutingDecision::Retry { destination, delay } => {
                assert_eq!(destination.topic, "events.RETRY");
                assert_eq!(destination.partition, 2);
                assert_eq!(delay, Duration::from_millis(100));
            }
            other => panic!("unexpected decision {:?}", other),
        }
    }

    #[test]
    fn test_transient_dead_lettered_after_budget() {
        let policy = policy(RedeliveryStrategy::RetryTopic);
        for attempt in 1..=3 {
            assert!(matches!(
                policy.decide(&record(0), FailureClass::Transient, attempt),
                RoutingDecision::Retry { .. }
            ));
        }
        assert!(matches!(
            policy.decide(&record(0), FailureClass::Transient, 4),
            RoutingDecision::DeadLetter {
                class: FailureClass::Transient,
                ..
            }
        ));
    }

    #[test]
    fn test_local_backoff_delays_grow() {
        let policy = policy(RedeliveryStrategy::LocalBackoff);
        let delays: Vec<Duration> = (1..=3)
            .map(|attempt| match policy.decide(&record(0), FailureClass::Transient, attempt) {
                RoutingDecision::RetryLocally { delay } => delay,
                other => panic!("unexpected decision {:?}", other),
            })
            .collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(100),
                Duration::from_millis(200),
                Duration::from_millis(400)
            ]
        );
    }

    #[test]
    fn test_tombstone_is_discarded() {
        let tombstone = ConsumedRecord::new("events", 0, 1);
        assert_eq!(
            policy(RedeliveryStrategy::RetryTopic).decide(&tombstone, FailureClass::Permanent, 1),
            RoutingDecision::Discard
        );
    }

    #[test]
    fn test_zero_budget_dead_letters_transient() {
        let policy = RedeliveryPolicy::new(
            RedeliveryConfig {
                max_attempts: 0,
                ..Default::default()
            },
            RedeliveryTopics::new("r", "d"),
        );
        assert!(matches!(
            policy.decide(&record(0), FailureClass::Transient, 1),
            RoutingDecision::DeadLetter { .. }
        ));
    }

    #[test]
    fn test_strategy_parsing() {
        assert_eq!(
            "retry-topic".parse::<RedeliveryStrategy>(),
            Ok(RedeliveryStrategy::RetryTopic)
        );
        assert_eq!(
            "LOCAL_BACKOFF".parse::<RedeliveryStrategy>(),
            Ok(RedeliveryStrategy::LocalBackoff)
        );
        assert!("sometimes".parse::<RedeliveryStrategy>().is_err());
    }
}
