//! The library catalog domain: an event-sourced `Library` aggregate with
//! books as sub-entities, the book read model, and the two query shapes a
//! request layer exposes.
//!
//! There is no standalone Book aggregate; a book exists only as an ISBN
//! inside its library's stream, plus a denormalized row in the book store.

use std::{collections::HashMap, fmt, sync::Arc};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::warn;

use crate::{
    wrap_event, Aggregate, AggregateId, AggregateRepository, CommandPayload, CqrsError, Event,
    EventConsumer, EventPayload, EventStore, QueriesRunner, Query, Result,
};

// Commands: register a library, or register a book inside an existing one.
// Fields mirror what a caller may omit, so absence is validated rather than
// assumed away.
#[derive(Debug, Clone, PartialEq)]
pub enum LibraryCommand {
    RegisterLibrary {
        library_id: Option<AggregateId>,
        name: Option<String>,
    },
    RegisterBook {
        library_id: Option<AggregateId>,
        isbn: Option<String>,
        title: Option<String>,
    },
}

impl CommandPayload for LibraryCommand {
    fn target_aggregate_id(&self) -> Option<AggregateId> {
        match self {
            LibraryCommand::RegisterLibrary { library_id, .. } => *library_id,
            LibraryCommand::RegisterBook { library_id, .. } => *library_id,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            LibraryCommand::RegisterLibrary { .. } => "RegisterLibrary",
            LibraryCommand::RegisterBook { .. } => "RegisterBook",
        }
    }
}

// Events: the accepted outcomes of the above commands. At most one per command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LibraryEvent {
    LibraryCreated {
        library_id: AggregateId,
        name: String,
    },
    BookRegistered {
        library_id: AggregateId,
        isbn: String,
        title: Option<String>,
    },
}

impl fmt::Display for LibraryEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LibraryEvent::LibraryCreated { .. } => write!(f, "LibraryCreated"),
            LibraryEvent::BookRegistered { .. } => write!(f, "BookRegistered"),
        }
    }
}

impl EventPayload for LibraryEvent {
    fn aggregate_id(&self) -> AggregateId {
        match self {
            LibraryEvent::LibraryCreated { library_id, .. } => *library_id,
            LibraryEvent::BookRegistered { library_id, .. } => *library_id,
        }
    }
}

wrap_event!(LibraryEvent);

/// Lifecycle of a `Library`: it starts uninitialized and becomes active with
/// its `LibraryCreated` event. Active is terminal, there is no close/delete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LibraryStatus {
    #[default]
    Uninitialized,
    Active,
}

/// The `Library` aggregate. State is exactly the fold of its event stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Library {
    library_id: AggregateId,
    name: String,
    isbn_books: Vec<String>,
    status: LibraryStatus,
}

impl Library {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// ISBNs in registration order. Duplicates are allowed; no uniqueness
    /// check exists at the aggregate level.
    pub fn isbn_books(&self) -> &[String] {
        &self.isbn_books
    }

    pub fn status(&self) -> LibraryStatus {
        self.status
    }
}

impl Aggregate for Library {
    type Command = LibraryCommand;
    type Event = LibraryEvent;

    fn handle(&self, command: &Self::Command) -> Result<Option<Self::Event>> {
        match command {
            LibraryCommand::RegisterLibrary { library_id, name } => {
                let library_id =
                    library_id.ok_or_else(|| CqrsError::validation(None, "ID should not be null"))?;
                let name = name
                    .clone()
                    .ok_or_else(|| CqrsError::validation(library_id, "Name should not be null"))?;

                if self.status == LibraryStatus::Active {
                    return Err(CqrsError::validation(
                        library_id,
                        format!("library {library_id} already exists"),
                    ));
                }

                Ok(Some(LibraryEvent::LibraryCreated { library_id, name }))
            }
            LibraryCommand::RegisterBook { library_id, isbn, title } => {
                let library_id =
                    library_id.ok_or_else(|| CqrsError::validation(None, "ID should not be null"))?;
                let isbn = isbn.clone().ok_or_else(|| {
                    CqrsError::validation(library_id, "Book ISBN should not be null")
                })?;

                if self.status == LibraryStatus::Uninitialized {
                    return Err(CqrsError::AggregateNotFound(library_id));
                }

                Ok(Some(LibraryEvent::BookRegistered {
                    library_id,
                    isbn,
                    title: title.clone(),
                }))
            }
        }
    }

    fn apply(&mut self, event: &Self::Event) {
        match event {
            LibraryEvent::LibraryCreated { library_id, name } => {
                self.library_id = *library_id;
                self.name = name.clone();
                self.isbn_books = Vec::new();
                self.status = LibraryStatus::Active;
            }
            LibraryEvent::BookRegistered { isbn, .. } => {
                self.isbn_books.push(isbn.clone());
            }
        }
    }

    fn aggregate_id(&self) -> AggregateId {
        self.library_id
    }

    fn set_aggregate_id(&mut self, id: AggregateId) {
        self.library_id = id;
    }
}

// Read model: one denormalized row per book, keyed by ISBN, queried by
// library. Eventually consistent with the event store.

#[derive(Debug, Clone, PartialEq)]
pub struct BookRow {
    pub isbn: String,
    pub library_id: AggregateId,
    pub title: Option<String>,
}

/// In-process projection store for book rows. Clones share storage, so the
/// projector's write handle and the query path's read handle are the same
/// store.
#[derive(Clone, Default)]
pub struct MemoryBookStore {
    rows: Arc<RwLock<HashMap<String, BookRow>>>,
}

impl MemoryBookStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn upsert(&self, row: BookRow) {
        self.rows.write().await.insert(row.isbn.clone(), row);
    }

    /// Rows for one library, ordered by ISBN for stable output.
    pub async fn by_library(&self, library_id: AggregateId) -> Vec<BookRow> {
        let rows = self.rows.read().await;
        let mut books: Vec<BookRow> = rows
            .values()
            .filter(|row| row.library_id == library_id)
            .cloned()
            .collect();
        books.sort_by(|a, b| a.isbn.cmp(&b.isbn));
        books
    }
}

/// Maintains the book read model from committed events.
///
/// The per-event update is a deterministic upsert keyed by ISBN, so redelivery
/// of the same event leaves exactly one row behind.
#[derive(Clone)]
pub struct BookProjector {
    books: MemoryBookStore,
}

impl BookProjector {
    pub fn new(books: MemoryBookStore) -> Self {
        Self { books }
    }
}

#[async_trait]
impl EventConsumer for BookProjector {
    async fn process(&mut self, event: &Event) {
        match event.get_payload::<LibraryEvent>() {
            Ok(LibraryEvent::BookRegistered { library_id, isbn, title }) => {
                self.books.upsert(BookRow { isbn, library_id, title }).await;
            }
            Ok(_) => {}
            Err(err) => {
                warn!(event_type = %event.event_type, %err, "skipping undecodable event");
            }
        }
    }
}

// Queries. The book path reads the materialized projection; the library path
// deliberately replays the aggregate through the repository instead of
// keeping a second projection, trading a small replay cost for one less read
// model to maintain. That also makes it read-your-own-write, unlike the
// projection path.

pub struct GetLibraryQuery<ES>
where
    ES: EventStore,
{
    library_id: AggregateId,
    repository: AggregateRepository<ES>,
}

impl<ES> GetLibraryQuery<ES>
where
    ES: EventStore,
{
    pub fn new(library_id: AggregateId, repository: AggregateRepository<ES>) -> Self {
        Self { library_id, repository }
    }
}

#[async_trait]
impl<ES> Query for GetLibraryQuery<ES>
where
    ES: EventStore,
{
    type Output = Result<Option<Library>>;

    async fn apply(&self) -> Self::Output {
        let (library, version) = self.repository.load::<Library>(self.library_id).await?;
        Ok(version.map(|_| library))
    }
}

pub struct GetBooksQuery {
    library_id: AggregateId,
    books: MemoryBookStore,
}

impl GetBooksQuery {
    pub fn new(library_id: AggregateId, books: MemoryBookStore) -> Self {
        Self { library_id, books }
    }
}

#[async_trait]
impl Query for GetBooksQuery {
    type Output = Result<Vec<BookRow>>;

    async fn apply(&self) -> Self::Output {
        Ok(self.books.by_library(self.library_id).await)
    }
}

/// The application's read side, in one value.
#[derive(Clone, Default)]
pub struct LibraryQueries {}

#[async_trait]
impl QueriesRunner for LibraryQueries {}

#[cfg(test)]
mod tests {
    use super::*;

    fn register_library(id: Option<AggregateId>, name: Option<&str>) -> LibraryCommand {
        LibraryCommand::RegisterLibrary {
            library_id: id,
            name: name.map(str::to_string),
        }
    }

    fn register_book(id: Option<AggregateId>, isbn: Option<&str>, title: Option<&str>) -> LibraryCommand {
        LibraryCommand::RegisterBook {
            library_id: id,
            isbn: isbn.map(str::to_string),
            title: title.map(str::to_string),
        }
    }

    fn active_library(id: AggregateId, name: &str) -> Library {
        let mut library = Library::default();
        library.apply(&LibraryEvent::LibraryCreated {
            library_id: id,
            name: name.to_string(),
        });
        library
    }

    #[test]
    fn register_library_emits_created_event() {
        let library = Library::default();
        let event = library
            .handle(&register_library(Some(1), Some("Central")))
            .unwrap();

        assert_eq!(
            event,
            Some(LibraryEvent::LibraryCreated {
                library_id: 1,
                name: "Central".to_string()
            })
        );
    }

    #[test]
    fn register_library_requires_id_and_name() {
        let library = Library::default();

        let err = library.handle(&register_library(None, Some("X"))).unwrap_err();
        assert!(matches!(err, CqrsError::CommandValidation { .. }));

        let err = library.handle(&register_library(Some(1), None)).unwrap_err();
        assert!(matches!(err, CqrsError::CommandValidation { .. }));
    }

    #[test]
    fn register_library_twice_is_a_validation_failure() {
        let library = active_library(1, "Central");
        let err = library
            .handle(&register_library(Some(1), Some("Central")))
            .unwrap_err();
        assert!(matches!(err, CqrsError::CommandValidation { .. }));
    }

    #[test]
    fn register_book_requires_an_existing_library() {
        let library = Library::default();
        let err = library
            .handle(&register_book(Some(99), Some("X"), Some("Y")))
            .unwrap_err();
        assert!(matches!(err, CqrsError::AggregateNotFound(99)));
    }

    #[test]
    fn register_book_requires_isbn() {
        let library = active_library(1, "Central");
        let err = library.handle(&register_book(Some(1), None, Some("Dune"))).unwrap_err();
        assert!(matches!(err, CqrsError::CommandValidation { .. }));
    }

    #[test]
    fn duplicate_isbns_are_accepted_silently() {
        let mut library = active_library(1, "Central");
        let event = LibraryEvent::BookRegistered {
            library_id: 1,
            isbn: "978-1".to_string(),
            title: Some("Dune".to_string()),
        };
        library.apply(&event);
        library.apply(&event);

        assert_eq!(library.isbn_books(), ["978-1", "978-1"]);
    }

    #[test]
    fn replaying_the_same_stream_twice_yields_equal_state() {
        let events = vec![
            LibraryEvent::LibraryCreated {
                library_id: 1,
                name: "Central".to_string(),
            },
            LibraryEvent::BookRegistered {
                library_id: 1,
                isbn: "978-1".to_string(),
                title: Some("Dune".to_string()),
            },
            LibraryEvent::BookRegistered {
                library_id: 1,
                isbn: "978-2".to_string(),
                title: None,
            },
        ];

        let fold = || {
            let mut library = Library::default();
            for e in &events {
                library.apply(e);
            }
            library
        };

        assert_eq!(fold(), fold());
    }

    #[tokio::test]
    async fn projector_upsert_is_idempotent() {
        let books = MemoryBookStore::new();
        let mut projector = BookProjector::new(books.clone());

        let event: Event = LibraryEvent::BookRegistered {
            library_id: 1,
            isbn: "ABC".to_string(),
            title: Some("T".to_string()),
        }
        .into();

        projector.process(&event).await;
        projector.process(&event).await;

        let rows = books.by_library(1).await;
        assert_eq!(
            rows,
            vec![BookRow {
                isbn: "ABC".to_string(),
                library_id: 1,
                title: Some("T".to_string()),
            }]
        );
    }

    #[tokio::test]
    async fn projector_ignores_non_book_events() {
        let books = MemoryBookStore::new();
        let mut projector = BookProjector::new(books.clone());

        let event: Event = LibraryEvent::LibraryCreated {
            library_id: 1,
            name: "Central".to_string(),
        }
        .into();
        projector.process(&event).await;

        assert!(books.by_library(1).await.is_empty());
    }
}
