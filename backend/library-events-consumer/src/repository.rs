//! Library event storage
//!
//! `LibraryEventRepository` is the only shared mutable state in the consumer.
//! Two implementations ship: `PgLibraryEventRepository` over sqlx and
//! `InMemoryLibraryEventRepository` for development and tests.

use async_trait::async_trait;
use library_event::{Book, LibraryEvent, LibraryEventType};
use redelivery::ProcessingError;
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Error, Debug)]
pub enum RepositoryError {
    /// Storage could not be reached or timed out
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl RepositoryError {
    /// Whether retrying later may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            RepositoryError::Unavailable(_) => true,
            RepositoryError::Database(sqlx_err) => matches!(
                sqlx_err,
                sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_)
            ),
            RepositoryError::Migration(_) => false,
        }
    }
}

impl From<RepositoryError> for ProcessingError {
    fn from(err: RepositoryError) -> Self {
        if err.is_transient() {
            ProcessingError::transient(err.to_string())
        } else {
            // Unrecognised storage errors keep the default class
            ProcessingError::Unclassified(anyhow::Error::new(err))
        }
    }
}

#[async_trait]
pub trait LibraryEventRepository: Send + Sync {
    /// Persist `event`, assigning an id when it has none; returns the stored event
    async fn save(&self, event: &LibraryEvent) -> Result<LibraryEvent, RepositoryError>;

    async fn find_by_id(&self, id: i32) -> Result<Option<LibraryEvent>, RepositoryError>;
}

pub struct PgLibraryEventRepository {
    pool: PgPool,
}

pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

impl PgLibraryEventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), RepositoryError> {
        MIGRATOR.run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn event_type_str(event_type: LibraryEventType) -> &'static str {
    match event_type {
        LibraryEventType::New => "NEW",
        LibraryEventType::Update => "UPDATE",
    }
}

fn event_from_row(row: &sqlx::postgres::PgRow) -> Result<LibraryEvent, RepositoryError> {
    let event_type: String = row.try_get("library_event_type")?;
    let library_event_type = match event_type.as_str() {
        "UPDATE" => LibraryEventType::Update,
        _ => LibraryEventType::New,
    };

    Ok(LibraryEvent {
        library_event_id: Some(row.try_get("library_event_id")?),
        library_event_type,
        book: Book {
            book_id: row.try_get("book_id")?,
            book_name: row.try_get("book_name")?,
            book_author: row.try_get("book_author")?,
        },
    })
}

#[async_trait]
impl LibraryEventRepository for PgLibraryEventRepository {
    async fn save(&self, event: &LibraryEvent) -> Result<LibraryEvent, RepositoryError> {
        let event_type = event_type_str(event.library_event_type);

        let row = match event.library_event_id {
            None => {
                sqlx::query(
                    r#"
                    INSERT INTO library_events
                        (library_event_type, book_id, book_name, book_author)
                    VALUES ($1, $2, $3, $4)
                    RETURNING library_event_id, library_event_type, book_id, book_name, book_author
                    "#,
                )
                .bind(event_type)
                .bind(event.book.book_id)
                .bind(&event.book.book_name)
                .bind(&event.book.book_author)
                .fetch_one(&self.pool)
                .await?
            }
            Some(id) => {
                sqlx::query(
                    r#"
                    INSERT INTO library_events
                        (library_event_id, library_event_type, book_id, book_name, book_author)
                    VALUES ($1, $2, $3, $4, $5)
                    ON CONFLICT (library_event_id) DO UPDATE SET
                        library_event_type = EXCLUDED.library_event_type,
                        book_id = EXCLUDED.book_id,
                        book_name = EXCLUDED.book_name,
                        book_author = EXCLUDED.book_author,
                        updated_at = NOW()
                    RETURNING library_event_id, library_event_type, book_id, book_name, book_author
                    "#,
                )
                .bind(id)
                .bind(event_type)
                .bind(event.book.book_id)
                .bind(&event.book.book_name)
                .bind(&event.book.book_author)
                .fetch_one(&self.pool)
                .await?
            }
        };

        event_from_row(&row)
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<LibraryEvent>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT library_event_id, library_event_type, book_id, book_name, book_author
            FROM library_events
            WHERE library_event_id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(event_from_row).transpose()
    }
}

/// Lock-guarded map keyed by event id
#[derive(Debug, Default)]
pub struct InMemoryLibraryEventRepository {
    state: RwLock<InMemoryState>,
}

#[derive(Debug, Default)]
struct InMemoryState {
    events: HashMap<i32, LibraryEvent>,
    last_id: i32,
}

impl InMemoryLibraryEventRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.events.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.events.is_empty()
    }
}

#[async_trait]
impl LibraryEventRepository for InMemoryLibraryEventRepository {
    async fn save(&self, event: &LibraryEvent) -> Result<LibraryEvent, RepositoryError> {
        let mut state = self.state.write().await;

        let id = match event.library_event_id {
            Some(id) => {
                state.last_id = state.last_id.max(id);
                id
            }
            None => {
                state.last_id += 1;
                state.last_id
            }
        };

        let stored = event.clone().with_id(id);
        state.events.insert(id, stored.clone());
        Ok(stored)
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<LibraryEvent>, RepositoryError> {
        Ok(self.state.read().await.events.get(&id).cloned())
    }
}
