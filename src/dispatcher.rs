use std::{collections::HashMap, marker::PhantomData, sync::Arc};

use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::{
    Aggregate, AggregateId, AggregateRepository, CommandPayload, CqrsError, Event, EventSender,
    EventStore, Result,
};

/// A conflicting append is reloaded and reapplied once before surfacing.
const MAX_DISPATCH_ATTEMPTS: usize = 2;

/// Routes commands to their target aggregate: load, handle, append, publish.
///
/// `dispatch` is the only mutation entry point of the runtime. Two layers keep
/// racing commands on the same aggregate honest:
///
/// - a per-aggregate-id mutex serializes the load→handle→save window, so
///   concurrent commands through one dispatcher never observe the same
///   version (the efficiency measure);
/// - the store's optimistic-concurrency check catches writers that bypass the
///   lock, e.g. a second dispatcher over the same store (the last line of
///   defense). Such a conflict is retried once against freshly loaded state,
///   which re-runs validation, so a lost `create` race resolves into a
///   deterministic validation failure rather than a spurious conflict.
///
/// Commands on different aggregate ids proceed independently; there is no
/// global lock.
pub struct CommandDispatcher<A, ES>
where
    A: Aggregate,
    ES: EventStore,
{
    repository: AggregateRepository<ES>,
    projections: EventSender,
    locks: Mutex<HashMap<AggregateId, Arc<Mutex<()>>>>,
    marker: PhantomData<A>,
}

impl<A, ES> CommandDispatcher<A, ES>
where
    A: Aggregate,
    ES: EventStore,
{
    pub fn new(repository: AggregateRepository<ES>, projections: EventSender) -> Self {
        Self {
            repository,
            projections,
            locks: Mutex::new(HashMap::new()),
            marker: PhantomData,
        }
    }

    /// Dispatches a command, returning the post-command aggregate state.
    ///
    /// Returns as soon as the produced event (if any) is durably appended;
    /// projection updates happen asynchronously afterwards. A command that
    /// fails validation appends nothing.
    pub async fn dispatch(&self, command: A::Command) -> Result<A> {
        let aggregate_id = command.target_aggregate_id().ok_or_else(|| {
            CqrsError::validation(
                None,
                format!("command {} has no target aggregate id", command.name()),
            )
        })?;

        debug!(aggregate_id, command = command.name(), "dispatching command");

        let lock = self.lock_for(aggregate_id).await;
        let _guard = lock.lock().await;

        let mut attempts = 0;
        loop {
            attempts += 1;

            let (mut aggregate, version) = self.repository.load::<A>(aggregate_id).await?;
            let Some(payload) = aggregate.handle(&command)? else {
                return Ok(aggregate);
            };

            let mut event: Event = Event::new(payload.clone());
            match self
                .repository
                .save(aggregate_id, version, std::slice::from_ref(&event))
                .await
            {
                Ok(new_version) => {
                    aggregate.apply(&payload);
                    event.sequence_number = Some(new_version);
                    // The engine may already be shut down; the event is
                    // committed either way.
                    let _ = self.projections.send(event);
                    return Ok(aggregate);
                }
                Err(CqrsError::Concurrency { expected, actual, .. })
                    if attempts < MAX_DISPATCH_ATTEMPTS =>
                {
                    warn!(
                        aggregate_id,
                        ?expected,
                        ?actual,
                        attempts,
                        "concurrency conflict, reloading and reapplying"
                    );
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn lock_for(&self, aggregate_id: AggregateId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(aggregate_id).or_default().clone()
    }
}
