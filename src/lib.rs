//! # library_es
//!
//! A minimal CQRS/event-sourcing runtime, plus the event-sourced library
//! catalog domain built on top of it.
//!
//! The kernel persists nothing but immutable events: commands are validated
//! by an [`Aggregate`] and translated into zero-or-one events, the
//! [`EventStore`] appends them with optimistic concurrency, the
//! [`AggregateRepository`] rebuilds state on demand by replaying a stream,
//! and the [`ProjectionEngine`] keeps denormalized read models up to date
//! asynchronously. The [`CommandDispatcher`] is the single mutation entry
//! point; [`Query`] values are the read entry point.
//!
//! The `library` module is the domain: a `Library` aggregate with books as
//! sub-entities, a book read model keyed by ISBN, and the two queries a thin
//! request layer would expose.

mod aggregate;
mod command;
mod consumer;
mod dispatcher;
mod error;
mod events;
mod query;
mod repository;
mod store;

pub mod library;

pub use aggregate::Aggregate;
pub use command::CommandPayload;
pub use consumer::{EventConsumer, EventSender, ProjectionEngine};
pub use dispatcher::CommandDispatcher;
pub use error::{CqrsError, Result};
pub use events::{Event, EventPayload, EventStore};
pub use query::{QueriesRunner, Query};
pub use repository::AggregateRepository;
pub use store::MemoryEventStore;

pub use uuid::Uuid;

/// Opaque identifier naming one aggregate instance and its event stream.
pub type AggregateId = u64;
