use thiserror::Error;

use crate::world::host::replication_record::ReplicationState;

/// Errors raised by per-connection replication bookkeeping.
///
/// None of these are fatal: the manager logs them and keeps replicating the remaining
/// entities. They exist so that state machine violations are observable in tests.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplicationError {
    /// A record was asked to move along an edge its lifecycle does not allow
    #[error("Entity {entity_id} cannot transition from {from:?} to {to:?}")]
    InvalidTransition {
        entity_id: u64,
        from: ReplicationState,
        to: ReplicationState,
    },

    /// An operation named an entity that has no record on this connection
    #[error("Cannot {operation} entity {entity_id} - no replication record on this connection")]
    UnknownEntity {
        entity_id: u64,
        operation: &'static str,
    },
}

/// Errors raised when live-tunable values are validated at the configuration boundary
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A count or duration was negative
    #[error("Replication setting {field} must not be negative (got {value})")]
    NegativeValue { field: &'static str, value: i64 },

    /// The pending removal delay exceeds the supported maximum
    #[error("Pending removal delay of {requested_ms}ms exceeds the maximum of {max_ms}ms")]
    RemovalDelayTooLarge { requested_ms: u64, max_ms: u64 },
}
