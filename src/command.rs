use crate::AggregateId;

/// The `CommandPayload` trait defines the behavior of a command, a request to
/// change the state of one aggregate.
///
/// Commands carry the id of the aggregate they target; the dispatcher resolves
/// it through `target_aggregate_id` before loading any state. The id is an
/// `Option` because a caller-supplied command may simply omit it, which the
/// dispatcher turns into a validation failure rather than a panic.
///
/// Everything else a command carries is validated by the aggregate's `handle`
/// method, not here.
pub trait CommandPayload {
    /// The aggregate this command targets, if the caller provided one.
    fn target_aggregate_id(&self) -> Option<AggregateId>;

    /// Human-readable command name, for logging.
    fn name(&self) -> &'static str;
}
