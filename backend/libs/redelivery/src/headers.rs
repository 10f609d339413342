//! Headers written on redelivered records.

/// Number of processing attempts already made for the record
pub const DELIVERY_ATTEMPT: &str = "x-delivery-attempt";
/// Epoch millis before which a retry-topic record must not be processed
pub const RETRY_NOT_BEFORE: &str = "x-retry-not-before";
pub const ORIGINAL_TOPIC: &str = "x-original-topic";
pub const ORIGINAL_PARTITION: &str = "x-original-partition";
pub const ORIGINAL_OFFSET: &str = "x-original-offset";
pub const FAILURE_CLASS: &str = "x-failure-class";
pub const EXCEPTION_KIND: &str = "x-exception-kind";
pub const EXCEPTION_MESSAGE: &str = "x-exception-message";

/// Rewritten on every redelivery; the `x-original-*` headers are kept from
/// the first failure.
pub const PER_ATTEMPT: &[&str] = &[
    DELIVERY_ATTEMPT,
    RETRY_NOT_BEFORE,
    FAILURE_CLASS,
    EXCEPTION_KIND,
    EXCEPTION_MESSAGE,
];
