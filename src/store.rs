use std::{collections::HashMap, sync::Arc};

use anyhow::anyhow;
use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::{AggregateId, CqrsError, Event, EventStore, Result};

/// In-process, append-only event store keyed by aggregate id.
///
/// Streams live in an `Arc<RwLock<..>>`, so clones are cheap handles onto the
/// same storage: the command path and the aggregate-replay query path share
/// one store by cloning it. The write lock is held for the whole version
/// check + append, which makes each `append` call atomic.
#[derive(Clone, Default)]
pub struct MemoryEventStore {
    streams: Arc<RwLock<HashMap<AggregateId, Vec<Event>>>>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn append(
        &self,
        aggregate_id: AggregateId,
        expected_version: Option<u64>,
        events: &[Event],
    ) -> Result<u64> {
        if events.is_empty() {
            return Err(CqrsError::StoreOperation {
                aggregate_id,
                source: anyhow!("refusing to append an empty batch"),
            });
        }

        let mut streams = self.streams.write().await;
        let stream = streams.entry(aggregate_id).or_default();

        let actual = stream.last().and_then(|e| e.sequence_number);
        if actual != expected_version {
            return Err(CqrsError::Concurrency {
                aggregate_id,
                expected: expected_version,
                actual,
            });
        }

        let mut next = stream.len() as u64;
        for event in events {
            let mut stamped = event.clone();
            stamped.sequence_number = Some(next);
            stream.push(stamped);
            next += 1;
        }

        let version = next - 1;
        debug!(aggregate_id, version, count = events.len(), "appended events");
        Ok(version)
    }

    async fn load_stream(&self, aggregate_id: AggregateId) -> Result<Vec<Event>> {
        let streams = self.streams.read().await;
        Ok(streams.get(&aggregate_id).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    use super::*;
    use crate::{wrap_event, EventPayload};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Ticked {
        aggregate_id: AggregateId,
    }

    impl std::fmt::Display for Ticked {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "Ticked")
        }
    }

    impl EventPayload for Ticked {
        fn aggregate_id(&self) -> AggregateId {
            self.aggregate_id
        }
    }

    wrap_event!(Ticked);

    fn tick(id: AggregateId) -> Event {
        Ticked { aggregate_id: id }.into()
    }

    #[tokio::test]
    async fn append_stamps_gapless_sequence_numbers_from_zero() {
        let store = MemoryEventStore::new();

        let v = store.append(1, None, &[tick(1), tick(1)]).await.unwrap();
        assert_eq!(v, 1);
        let v = store.append(1, Some(1), &[tick(1)]).await.unwrap();
        assert_eq!(v, 2);

        let stream = store.load_stream(1).await.unwrap();
        let seqs: Vec<_> = stream.iter().map(|e| e.sequence_number).collect();
        assert_eq!(seqs, vec![Some(0), Some(1), Some(2)]);
    }

    #[tokio::test]
    async fn stale_expected_version_is_rejected_and_stream_untouched() {
        let store = MemoryEventStore::new();
        store.append(7, None, &[tick(7)]).await.unwrap();

        // Both a stale and a premature expectation must fail.
        let err = store.append(7, None, &[tick(7)]).await.unwrap_err();
        assert!(matches!(
            err,
            CqrsError::Concurrency { aggregate_id: 7, expected: None, actual: Some(0) }
        ));
        let err = store.append(7, Some(4), &[tick(7), tick(7)]).await.unwrap_err();
        assert!(matches!(err, CqrsError::Concurrency { .. }));

        // Atomicity: none of the rejected events landed.
        assert_eq!(store.load_stream(7).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unknown_aggregate_loads_an_empty_stream() {
        let store = MemoryEventStore::new();
        assert!(store.load_stream(99).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn clones_share_storage() {
        let store = MemoryEventStore::new();
        let handle = store.clone();

        store.append(3, None, &[tick(3)]).await.unwrap();
        assert_eq!(handle.load_stream(3).await.unwrap().len(), 1);
    }
}
