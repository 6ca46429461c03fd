use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::{AggregateId, CqrsError, Result, Uuid};

/// The `Event` struct represents a committed change to the state of an aggregate.
///
/// An event carries its unique ID, event type, owning aggregate ID, payload data,
/// per-stream sequence number and timestamp. Together these capture the fact that
/// happened, so the aggregate state can be reconstructed by replay at any time.
///
/// Events are created through `Event::new` from a typed payload and are immutable
/// once appended to the store: there is no update or delete path anywhere in the
/// crate. The `sequence_number` is `None` until the event store stamps it during
/// `append`; loaded events always carry one.
///
/// You can extract the typed payload back out of an event with `get_payload`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Event {
    /// The ID of the event.
    pub id: String,

    /// The type of event.
    pub event_type: String,

    /// The ID of the aggregate that the event is associated with.
    pub aggregate_id: AggregateId,

    /// The payload of the event.
    payload: serde_json::Value,

    /// The position of the event in its aggregate's stream, assigned at append time.
    pub sequence_number: Option<u64>,

    /// The timestamp of the event.
    pub timestamp: DateTime<Utc>,
}

impl Event {
    /// Creates a new, not-yet-appended event from a typed payload.
    pub fn new<T: EventPayload>(payload: T) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            event_type: payload.name(),
            aggregate_id: payload.aggregate_id(),
            payload: serde_json::to_value(payload).unwrap(),
            sequence_number: None,
            timestamp: Utc::now(),
        }
    }

    /// Gets the typed payload of the event.
    pub fn get_payload<T: EventPayload + DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.payload.clone()).map_err(CqrsError::PayloadDeserialization)
    }
}

/// The `wrap_event!` macro provides a convenient way to wrap an event payload type
/// in an [`Event`] envelope.
///
/// It generates the conversions between a payload type and `Event`, so domain code
/// can write `payload.into()` when emitting and `event.into()` when consuming.
#[macro_export]
macro_rules! wrap_event {
    ($evt: ident) => {
        impl From<$crate::Event> for $evt {
            fn from(evt: $crate::Event) -> Self {
                evt.get_payload::<$evt>().unwrap()
            }
        }

        impl From<$evt> for $crate::Event {
            fn from(payload: $evt) -> $crate::Event {
                $crate::Event::new(payload)
            }
        }
    };
}

/// The `EventPayload` trait defines the behavior of an event payload, representing
/// the change the event made to the state of an aggregate.
///
/// Implement this trait for each domain event type (typically one enum per aggregate).
pub trait EventPayload<Evt = Self>: Serialize + DeserializeOwned + Clone + ToString {
    /// Gets the ID of the aggregate that the event payload is associated with.
    fn aggregate_id(&self) -> AggregateId;

    /// Gets the name of the event payload.
    fn name(&self) -> String {
        self.to_string()
    }
}

/// The `EventStore` trait defines the behavior for appending and loading events,
/// the single source of truth for all state in the system.
///
/// `append` enforces optimistic concurrency: the caller passes the version it
/// observed when it loaded the aggregate (`None` for a stream it believes does
/// not exist yet), and the store rejects the append with
/// [`CqrsError::Concurrency`] when the stream has moved on in the meantime.
/// An append is atomic per call: either every event of the batch is stored with
/// contiguous sequence numbers, or none is.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Appends `events` to the stream of `aggregate_id`, returning the new
    /// version (the last stored sequence number).
    async fn append(
        &self,
        aggregate_id: AggregateId,
        expected_version: Option<u64>,
        events: &[Event],
    ) -> Result<u64>;

    /// Loads the ordered event stream of `aggregate_id`. An aggregate that has
    /// never been created yields an empty stream, not an error.
    async fn load_stream(&self, aggregate_id: AggregateId) -> Result<Vec<Event>>;
}
