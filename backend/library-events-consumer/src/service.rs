//! Turns consumed records into persisted library events
use library_event::{LibraryEvent, LibraryEventType};
use redelivery::{ConsumedRecord, ProcessingError};
use std::sync::Arc;
use tracing::{debug, info};

use crate::repository::LibraryEventRepository;

pub struct LibraryEventService {
    repository: Arc<dyn LibraryEventRepository>,
}

impl LibraryEventService {
    pub fn new(repository: Arc<dyn LibraryEventRepository>) -> Self {
        Self { repository }
    }

    pub fn repository(&self) -> &Arc<dyn LibraryEventRepository> {
        &self.repository
    }

    /// Decode and persist one record
    pub async fn process(&self, record: &ConsumedRecord) -> Result<LibraryEvent, ProcessingError> {
        let value = record
            .value
            .as_deref()
            .ok_or_else(|| ProcessingError::permanent("Record has no value"))?;

        let event = LibraryEvent::from_json(value)?;
        debug!(
            topic = %record.topic,
            partition = record.partition,
            offset = record.offset,
            event_type = %event.library_event_type,
            "Library event decoded"
        );

        self.process_event(event).await
    }

    pub async fn process_event(&self, event: LibraryEvent) -> Result<LibraryEvent, ProcessingError> {
        let event = match event.library_event_type {
            LibraryEventType::New => LibraryEvent {
                library_event_id: None,
                ..event
            },
            LibraryEventType::Update => {
                self.validate(&event).await?;
                event
            }
        };

        let saved = self.repository.save(&event).await?;
        info!(
            library_event_id = ?saved.library_event_id,
            event_type = %saved.library_event_type,
            "Successfully persisted the library event"
        );
        Ok(saved)
    }

    async fn validate(&self, event: &LibraryEvent) -> Result<(), ProcessingError> {
        let id = event
            .library_event_id
            .ok_or_else(|| ProcessingError::permanent("Library Event Id is missing"))?;

        match self.repository.find_by_id(id).await? {
            Some(_) => {
                debug!(library_event_id = id, "Validation is successful for the library event");
                Ok(())
            }
            None => Err(ProcessingError::permanent("Not a valid Library Event")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryLibraryEventRepository;
    use library_event::Book;
    use redelivery::{Classify, FailureClass};

    fn service() -> LibraryEventService {
        LibraryEventService::new(Arc::new(InMemoryLibraryEventRepository::new()))
    }

    fn record(json: &str) -> ConsumedRecord {
        ConsumedRecord::new("library-events", 0, 0).with_value(json)
    }

    #[tokio::test]
    async fn test_new_event_ignores_supplied_id() {
        let service = service();
        let event = LibraryEvent::new(Book::new(1, "Dune", "Herbert")).with_id(99);

        let saved = service.process_event(event).await.unwrap();

        assert_eq!(saved.library_event_id, Some(1));
    }

    #[tokio::test]
    async fn test_update_without_id_is_permanent() {
        let json = r#"{"libraryEventId":null,"libraryEventType":"UPDATE","book":{"bookId":1,"bookName":"Dune","bookAuthor":"Herbert"}}"#;

        let err = service().process(&record(json)).await.unwrap_err();

        assert_eq!(err.failure_class(), FailureClass::Permanent);
        assert_eq!(err.to_string(), "Invalid input: Library Event Id is missing");
    }

    #[tokio::test]
    async fn test_update_with_unknown_id_is_permanent() {
        let event = LibraryEvent::update(404, Book::new(1, "Dune", "Herbert"));

        let err = service().process_event(event).await.unwrap_err();

        assert_eq!(err.failure_class(), FailureClass::Permanent);
        assert_eq!(err.to_string(), "Invalid input: Not a valid Library Event");
    }

    #[tokio::test]
    async fn test_malformed_json_is_deserialization_error() {
        let err = service().process(&record("{not json")).await.unwrap_err();

        assert!(matches!(err, ProcessingError::Deserialization(_)));
        assert_eq!(err.failure_class(), FailureClass::Permanent);
    }
}
