//! Record headers set by the publisher.

/// Origin marker, constant per deployment
pub const EVENT_SOURCE: &str = "event-source";
pub const DEFAULT_EVENT_SOURCE: &str = "scanner";
