use async_trait::async_trait;
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};
use tracing::debug;

use crate::Event;

/// Sending half of the projection channel, held by the dispatcher.
pub type EventSender = UnboundedSender<Event>;

/// A trait that defines the behavior of an event consumer.
///
/// An event consumer updates one read model from committed events. Delivery is
/// at-least-once, so `process` must be idempotent: re-applying the same event
/// must leave the read model unchanged (in practice, a deterministic upsert
/// keyed by the event's natural key).
#[async_trait]
pub trait EventConsumer: Send + Sync {
    async fn process(&mut self, event: &Event);
}

/// Drives read-model maintenance from committed events.
///
/// The engine owns the receiving half of an mpsc channel; the dispatcher sends
/// each event after (and only after) it is durably appended, so a read model
/// can lag behind the event store but never lead it. A single channel keeps
/// events in commit order per aggregate; nothing is promised about ordering
/// across aggregates.
///
/// Projection updates run asynchronously relative to command completion:
/// `dispatch` returns as soon as the append succeeds, so read-your-own-write
/// is not guaranteed on the projection path.
pub struct ProjectionEngine {
    consumers: Vec<Box<dyn EventConsumer>>,
    receiver: UnboundedReceiver<Event>,
}

impl ProjectionEngine {
    /// Builds an engine over `consumers` and returns the sender to wire into
    /// the dispatcher.
    pub fn new(consumers: Vec<Box<dyn EventConsumer>>) -> (Self, EventSender) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { consumers, receiver }, sender)
    }

    /// Consumes events until every sender is dropped. Typically spawned as a
    /// background task.
    pub async fn run(mut self) {
        while let Some(event) = self.receiver.recv().await {
            self.deliver(&event).await;
        }
    }

    /// Processes everything currently queued, then returns.
    ///
    /// Useful in tests and at shutdown, where "all events dispatched so far
    /// are reflected in the read models" must hold deterministically.
    pub async fn drain(&mut self) {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => self.deliver(&event).await,
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
    }

    async fn deliver(&mut self, event: &Event) {
        debug!(
            aggregate_id = event.aggregate_id,
            event_type = %event.event_type,
            sequence_number = ?event.sequence_number,
            "projecting event"
        );
        for consumer in self.consumers.iter_mut() {
            consumer.process(event).await;
        }
    }
}
