use std::net::SocketAddr;

use keystone_shared::{ConnectionId, HostId, Packet, TransportError};

/// Host-to-host messaging used while migrating a client between hosts
pub trait HostNetwork: Send + Sync {
    fn local_host_id(&self) -> HostId;

    /// Address clients should reconnect to in order to reach `host`
    fn host_address(&self, host: &HostId) -> Option<SocketAddr>;

    fn send_reliable_packet(
        &self,
        connection_id: ConnectionId,
        packet: Packet,
    ) -> Result<(), TransportError>;
}
