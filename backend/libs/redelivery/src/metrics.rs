use prometheus::{IntCounter, Opts};
use tracing::warn;

#[derive(Clone)]
pub struct RedeliveryMetrics {
    pub retried: IntCounter,
    pub dead_lettered: IntCounter,
    pub discarded: IntCounter,
    pub publish_failures: IntCounter,
}

impl RedeliveryMetrics {
    pub fn new(service: &str) -> Self {
        let registry = prometheus::default_registry();

        let counter = |name: &str, help: &str| {
            IntCounter::with_opts(Opts::new(name, help).const_label("service", service.to_string()))
                .expect("valid metric opts for redelivery counter")
        };

        let retried = counter(
            "redelivery_retried_total",
            "Failed records scheduled for another attempt",
        );
        let dead_lettered = counter(
            "redelivery_dead_lettered_total",
            "Failed records routed to the dead-letter topic",
        );
        let discarded = counter(
            "redelivery_discarded_total",
            "Failed records discarded because they carried no value",
        );
        let publish_failures = counter(
            "redelivery_publish_failures_total",
            "Redelivery publishes rejected or timed out by the broker",
        );

        for metric in [
            Box::new(retried.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(dead_lettered.clone()),
            Box::new(discarded.clone()),
            Box::new(publish_failures.clone()),
        ] {
            if let Err(e) = registry.register(metric) {
                warn!("Failed to register redelivery metric: {}", e);
            }
        }

        Self {
            retried,
            dead_lettered,
            discarded,
            publish_failures,
        }
    }
}
