use thiserror::Error;

use crate::AggregateId;

/// Failure taxonomy for the whole runtime.
///
/// Each layer only recovers from the class it owns: the dispatcher retries
/// `Concurrency` a bounded number of times, everything else propagates to the
/// caller unchanged so a transport layer can map variants deterministically.
#[derive(Error, Debug)]
pub enum CqrsError {
    #[error("Failed to deserialize event payload: {0}")]
    PayloadDeserialization(#[from] serde_json::Error),

    #[error("Event store operation failed for aggregate {aggregate_id}: {source}")]
    StoreOperation {
        aggregate_id: AggregateId,
        #[source]
        source: anyhow::Error,
    },

    #[error(
        "Concurrency conflict for aggregate {aggregate_id}: expected version {expected:?}, found {actual:?}"
    )]
    Concurrency {
        aggregate_id: AggregateId,
        expected: Option<u64>,
        actual: Option<u64>,
    },

    #[error("Aggregate '{0}' not found")]
    AggregateNotFound(AggregateId),

    #[error("Command validation failed for aggregate {aggregate_id:?}: {reason}")]
    CommandValidation {
        aggregate_id: Option<AggregateId>,
        reason: String,
    },
}

impl CqrsError {
    /// Shorthand for a validation failure.
    pub fn validation(
        aggregate_id: impl Into<Option<AggregateId>>,
        reason: impl Into<String>,
    ) -> Self {
        Self::CommandValidation {
            aggregate_id: aggregate_id.into(),
            reason: reason.into(),
        }
    }
}

// Result alias within the library
pub type Result<T, E = CqrsError> = std::result::Result<T, E>;
