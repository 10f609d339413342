/// Library event schema shared by the producer and consumer services
///
/// A library event announces that a book was added (`NEW`) or changed
/// (`UPDATE`). The JSON layout uses camelCase field names so records stay
/// readable by any consumer of the `library-events` topic:
///
/// ```json
/// {
///   "libraryEventId": null,
///   "libraryEventType": "NEW",
///   "book": { "bookId": 123, "bookName": "Kafka using Systems", "bookAuthor": "olgun" }
/// }
/// ```
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod headers;
pub mod key;
pub mod topics;

pub use key::{decode_key, encode_key};
pub use topics::TopicConfig;

/// Kind of change a library event describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LibraryEventType {
    New,
    Update,
}

impl fmt::Display for LibraryEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LibraryEventType::New => write!(f, "NEW"),
            LibraryEventType::Update => write!(f, "UPDATE"),
        }
    }
}

/// Book payload, owned by the event that carries it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub book_id: i32,
    pub book_name: String,
    pub book_author: String,
}

impl Book {
    pub fn new(book_id: i32, book_name: impl Into<String>, book_author: impl Into<String>) -> Self {
        Self {
            book_id,
            book_name: book_name.into(),
            book_author: book_author.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryEvent {
    /// Assigned by storage on first persistence; `None` for new events
    pub library_event_id: Option<i32>,
    pub library_event_type: LibraryEventType,
    pub book: Book,
}

impl LibraryEvent {
    /// A `NEW` event without id
    pub fn new(book: Book) -> Self {
        Self {
            library_event_id: None,
            library_event_type: LibraryEventType::New,
            book,
        }
    }

    /// An `UPDATE` event for a previously persisted id
    pub fn update(library_event_id: i32, book: Book) -> Self {
        Self {
            library_event_id: Some(library_event_id),
            library_event_type: LibraryEventType::Update,
            book,
        }
    }

    pub fn with_id(mut self, library_event_id: i32) -> Self {
        self.library_event_id = Some(library_event_id);
        self
    }

    /// Record key: the event id, or `None` to let the partitioner pick
    pub fn record_key(&self) -> Option<[u8; 4]> {
        self.library_event_id.map(encode_key)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}
