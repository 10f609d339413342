use redelivery::PublishError;
use tracing::{error, info};

/// Result of an acknowledged send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReport {
    pub key: Option<i32>,
    pub value: String,
    pub partition: i32,
    pub offset: i64,
}

/// Completion callback for fire-and-report sends.
///
/// Called on the send task after the caller has returned, so failures end
/// here instead of in caller code.
pub trait DeliveryReporter: Send + Sync {
    fn on_success(&self, report: &SendReport);
    fn on_failure(&self, key: Option<i32>, value: &str, error: &PublishError);
}

#[derive(Debug, Default, Clone)]
pub struct LoggingDeliveryReporter;

impl DeliveryReporter for LoggingDeliveryReporter {
    fn on_success(&self, report: &SendReport) {
        info!(
            key = ?report.key,
            value = %report.value,
            partition = report.partition,
            offset = report.offset,
            "Message sent successfully"
        );
    }

    fn on_failure(&self, key: Option<i32>, _value: &str, error: &PublishError) {
        error!(key = ?key, error = %error, "Error sending the message");
    }
}
