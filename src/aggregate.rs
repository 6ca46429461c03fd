use std::fmt::Debug;

use crate::{AggregateId, CommandPayload, Event, EventPayload, Result};

/// A trait representing an event sourcing aggregate.
///
/// Aggregates are the consistency boundary of the system. They encapsulate
/// pure, deterministic state transition logic and never perform I/O:
///
/// - `handle` validates a command against the current state and emits at most
///   one event describing the accepted change.
/// - `apply` folds an event into the state. Replaying the same stream twice
///   must produce equal states.
/// - `Default::default()` is the explicit factory for the uninitialized state,
///   used by the repository when an aggregate's stream is empty.
///
/// Commands and events are plain enums, so dispatch is an ordinary `match`
/// rather than anything reflective.
pub trait Aggregate: Debug + Default + Clone + Send + Sync {
    /// The type representing commands that can be handled by this aggregate.
    type Command: CommandPayload + Send + Sync;

    /// The type representing events emitted by this aggregate.
    type Event: EventPayload + Send + Sync;

    /// Handles a command against the current state, emitting zero or one event.
    ///
    /// This is where all domain validation lives. A rejected command returns an
    /// error and must leave no trace; a command that is valid but redundant may
    /// return `Ok(None)`.
    fn handle(&self, command: &Self::Command) -> Result<Option<Self::Event>>;

    /// Applies an event to update the internal state of the aggregate.
    fn apply(&mut self, event: &Self::Event);

    /// Gets the unique identifier of the aggregate.
    fn aggregate_id(&self) -> AggregateId;

    /// Sets the unique identifier of the aggregate.
    fn set_aggregate_id(&mut self, id: AggregateId);

    /// Applies a sequence of stored events in order.
    fn apply_events(&mut self, events: &[Event]) -> Result<()> {
        for e in events.iter() {
            self.apply(&e.get_payload::<Self::Event>()?);
        }
        Ok(())
    }
}
