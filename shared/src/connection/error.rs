use thiserror::Error;

use crate::ConnectionId;

/// Errors surfaced by a transport [`Connection`](crate::Connection) when enqueueing a packet.
///
/// The replication layer treats every variant as non-fatal: the packet is dropped, a
/// warning is logged, and teardown is left to the owning connection data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The connection was closed before the packet could be enqueued
    #[error("Connection {connection_id} is closed")]
    ConnectionClosed { connection_id: ConnectionId },

    /// The transport refused the packet
    #[error("Failed to send packet on connection {connection_id}: {reason}")]
    SendFailed {
        connection_id: ConnectionId,
        reason: String,
    },
}
