use tracing::trace;

use crate::{Aggregate, AggregateId, Event, EventStore, Result};

/// Loads and saves event-sourced aggregates against an [`EventStore`].
///
/// This is the only place replay logic lives: aggregates never talk to
/// storage themselves, and nothing outside this type folds event streams.
/// `load` rebuilds the state by applying the ordered stream onto
/// `A::default()`; replaying zero events yields the uninitialized state with
/// version `None`.
#[derive(Clone)]
pub struct AggregateRepository<ES>
where
    ES: EventStore,
{
    store: ES,
}

impl<ES> AggregateRepository<ES>
where
    ES: EventStore,
{
    pub fn new(store: ES) -> Self {
        Self { store }
    }

    /// Replays the stream of `aggregate_id` and returns the folded state
    /// together with the last applied sequence number.
    pub async fn load<A>(&self, aggregate_id: AggregateId) -> Result<(A, Option<u64>)>
    where
        A: Aggregate,
    {
        let events = self.store.load_stream(aggregate_id).await?;
        let version = events.last().and_then(|e| e.sequence_number);

        let mut aggregate = A::default();
        aggregate.set_aggregate_id(aggregate_id);
        aggregate.apply_events(&events)?;

        trace!(aggregate_id, ?version, replayed = events.len(), "loaded aggregate");
        Ok((aggregate, version))
    }

    /// Appends `events` at `expected_version`. A concurrency conflict from the
    /// store propagates untouched; the dispatcher decides whether to retry.
    pub async fn save(
        &self,
        aggregate_id: AggregateId,
        expected_version: Option<u64>,
        events: &[Event],
    ) -> Result<u64> {
        self.store.append(aggregate_id, expected_version, events).await
    }
}
