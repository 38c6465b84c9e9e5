use crate::{ConnectionId, Packet, TransportError};

/// Why a connection was terminated
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DisconnectReason {
    /// The server tore the connection down, e.g. because the controlled entity was removed
    TerminatedByServer,
    /// The remote client asked to leave
    TerminatedByClient,
    /// The client was redirected to another host and is reconnecting there
    ClientMigrated,
    /// A migration handoff could not be completed
    MigrationFailed,
}

/// Which side of the connection initiated the termination
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TerminationEndpoint {
    Local,
    Remote,
}

/// Transport capability consumed by the replication layer.
///
/// Every method is a synchronous, non-blocking enqueue; the transport owns its own I/O
/// and serializes delivery per connection.
pub trait Connection: Send + Sync {
    fn connection_id(&self) -> ConnectionId;

    fn send_reliable_packet(&self, packet: Packet) -> Result<(), TransportError>;

    fn send_unreliable_packet(&self, packet: Packet) -> Result<(), TransportError>;

    fn disconnect(&self, reason: DisconnectReason, endpoint: TerminationEndpoint);

    fn is_open(&self) -> bool;
}
