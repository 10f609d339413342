//! Owned record types.
//!
//! `ConsumedRecord` is detached from the consumer so it can be handed to a
//! partition worker task; `OutgoingRecord` is what a `RecordPublisher` sends.

use rdkafka::message::{Headers, Message};

use crate::headers;

/// A record read from a topic partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumedRecord {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<Vec<u8>>,
    pub value: Option<Vec<u8>>,
    pub headers: Vec<(String, Vec<u8>)>,
}

impl ConsumedRecord {
    pub fn new(topic: impl Into<String>, partition: i32, offset: i64) -> Self {
        Self {
            topic: topic.into(),
            partition,
            offset,
            key: None,
            value: None,
            headers: Vec::new(),
        }
    }

    pub fn with_key(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<Vec<u8>>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    /// Copy a message out of the consumer's buffers
    pub fn from_message<M: Message>(message: &M) -> Self {
        let headers = message
            .headers()
            .map(|headers| {
                headers
                    .iter()
                    .map(|header| {
                        (
                            header.key.to_string(),
                            header.value.map(<[u8]>::to_vec).unwrap_or_default(),
                        )
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            topic: message.topic().to_string(),
            partition: message.partition(),
            offset: message.offset(),
            key: message.key().map(<[u8]>::to_vec),
            value: message.payload().map(<[u8]>::to_vec),
            headers,
        }
    }

    /// Last value written for `key`
    pub fn header(&self, key: &str) -> Option<&[u8]> {
        self.headers
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_slice())
    }

    pub fn header_str(&self, key: &str) -> Option<&str> {
        self.header(key).and_then(|v| std::str::from_utf8(v).ok())
    }

    /// Processing attempts already made before this delivery (0 for a fresh record)
    pub fn delivery_attempts(&self) -> u32 {
        self.header_str(headers::DELIVERY_ATTEMPT)
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    }

    /// Earliest processing time for a retry-topic record, epoch millis
    pub fn retry_not_before(&self) -> Option<i64> {
        self.header_str(headers::RETRY_NOT_BEFORE)
            .and_then(|v| v.parse().ok())
    }
}

/// A record to be produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingRecord {
    pub topic: String,
    /// `None` lets the producer's partitioner choose
    pub partition: Option<i32>,
    pub key: Option<Vec<u8>>,
    pub payload: Option<Vec<u8>>,
    pub headers: Vec<(String, Vec<u8>)>,
}

impl OutgoingRecord {
    pub fn to(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            partition: None,
            key: None,
            payload: None,
            headers: Vec::new(),
        }
    }

    pub fn with_partition(mut self, partition: i32) -> Self {
        self.partition = Some(partition);
        self
    }

    pub fn with_key(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_payload(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    pub fn header(&self, key: &str) -> Option<&[u8]> {
        self.headers
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_slice())
    }

    pub fn header_str(&self, key: &str) -> Option<&str> {
        self.header(key).and_then(|v| std::str::from_utf8(v).ok())
    }
}

/// Where the broker stored a produced record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    pub partition: i32,
    pub offset: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_attempts_defaults_to_zero() {
        let record = ConsumedRecord::new("library-events", 0, 10);
        assert_eq!(record.delivery_attempts(), 0);
        assert!(record.retry_not_before().is_none());
    }

    #[test]
    fn test_redelivery_headers_are_parsed() {
        let record = ConsumedRecord::new("library-events.RETRY", 2, 5)
            .with_header(headers::DELIVERY_ATTEMPT, "2")
            .with_header(headers::RETRY_NOT_BEFORE, "1700000000000");
        assert_eq!(record.delivery_attempts(), 2);
        assert_eq!(record.retry_not_before(), Some(1_700_000_000_000));
    }

    #[test]
    fn test_last_header_wins() {
        let record = ConsumedRecord::new("t", 0, 0)
            .with_header("h", "first")
            .with_header("h", "second");
        assert_eq!(record.header_str("h"), Some("second"));
    }

    #[test]
    fn test_malformed_attempt_header_is_ignored() {
        let record = ConsumedRecord::new("t", 0, 0).with_header(headers::DELIVERY_ATTEMPT, "x");
        assert_eq!(record.delivery_attempts(), 0);
    }

    #[test]
    fn test_from_owned_message() {
        use rdkafka::message::{Header, OwnedHeaders, OwnedMessage, Timestamp};

        let headers = OwnedHeaders::new().insert(Header {
            key: "event-source",
            value: Some("scanner"),
        });
        let message = OwnedMessage::new(
            Some(b"{}".to_vec()),
            Some(vec![0, 0, 0, 1]),
            "library-events".to_string(),
            Timestamp::NotAvailable,
            1,
            42,
            Some(headers),
        );

        let record = ConsumedRecord::from_message(&message);
        assert_eq!(record.topic, "library-events");
        assert_eq!(record.partition, 1);
        assert_eq!(record.offset, 42);
        assert_eq!(record.key.as_deref(), Some(&[0u8, 0, 0, 1][..]));
        assert_eq!(record.value.as_deref(), Some(&b"{}"[..]));
        assert_eq!(record.header_str("event-source"), Some("scanner"));
    }
}
