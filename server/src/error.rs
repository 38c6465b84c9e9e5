use thiserror::Error;

use keystone_shared::{ConnectionId, GameInstant, GlobalEntity, HostId, MigrationToken, TransportError};

/// Errors raised while handing authority over a controlled entity to another host.
///
/// On the source host every variant ends the migration attempt and the client
/// connection is disconnected with `DisconnectReason::MigrationFailed`. On the destination
/// host the pending slot is consumed and the reconnecting client is refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MigrationError {
    /// No migration is pending for the presented token
    #[error("No pending migration for token {token}")]
    UnknownToken { token: MigrationToken },

    /// The client reconnected after the pending slot timed out
    #[error("Migration token {token} expired at {expired_at}")]
    TokenExpired {
        token: MigrationToken,
        expired_at: GameInstant,
    },

    /// The token was issued for another entity
    #[error("Migration token {token} was issued for {expected}, not {actual}")]
    EntityMismatch {
        token: MigrationToken,
        expected: GlobalEntity,
        actual: GlobalEntity,
    },

    /// The acceptance carried a token other than the one this migration issued
    #[error("Expected migration token {expected}, received {received}")]
    TokenMismatch {
        expected: MigrationToken,
        received: MigrationToken,
    },

    /// A token was registered twice on the destination host
    #[error("Migration token {token} is already pending")]
    DuplicateToken { token: MigrationToken },

    /// The host network has no address for the destination host
    #[error("No address known for destination {host}")]
    DestinationUnknown { host: HostId },

    /// The destination host could not be told that a client is coming
    #[error("Failed to notify destination {host}: {source}")]
    NotifyFailed { host: HostId, source: TransportError },

    /// The client could not be told where to reconnect
    #[error("Failed to redirect client on {connection_id}: {source}")]
    RedirectFailed {
        connection_id: ConnectionId,
        source: TransportError,
    },

    /// A second migration was requested while one is still negotiating
    #[error("Migration of {entity} is already in progress")]
    AlreadyInProgress { entity: GlobalEntity },

    /// The connection no longer controls an entity
    #[error("Connection {connection_id} has no controlled entity to migrate")]
    NoControlledEntity { connection_id: ConnectionId },

    /// The destination never confirmed before the negotiation deadline
    #[error("Migration of {entity} timed out at {deadline}")]
    NegotiationTimedOut {
        entity: GlobalEntity,
        deadline: GameInstant,
    },
}
