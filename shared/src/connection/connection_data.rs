use std::sync::Arc;

use crate::{Connection, EntityReplicationManager, GameInstant, Packet};

/// Role tag used by the simulation framework to dispatch on a connection's direction
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConnectionDataType {
    ServerToClient,
    ClientToServer,
}

/// Binds one transport connection to exactly one [`EntityReplicationManager`].
///
/// Implemented by `ServerToClientConnectionData` (keystone-server) and
/// `ClientToServerConnectionData` (keystone-client). Both share this lifecycle: created
/// when the connection's replication context is established, driven once per simulation
/// step through [`update`](ConnectionData::update), and cleared without flush when dropped.
pub trait ConnectionData {
    fn connection_data_type(&self) -> ConnectionDataType;

    /// The transport connection, if it is still alive
    fn connection(&self) -> Option<Arc<dyn Connection>>;

    fn replication_manager(&self) -> &EntityReplicationManager;

    fn replication_manager_mut(&mut self) -> &mut EntityReplicationManager;

    /// Called once per simulation step
    fn update(&mut self, now: GameInstant);

    /// Feeds a packet received from the remote peer
    fn handle_packet(&mut self, packet: Packet, now: GameInstant);

    fn can_send_updates(&self) -> bool;

    fn set_can_send_updates(&mut self, can_send_updates: bool);

    /// Called exactly once, when gameplay begins, to switch flow control to its post-init cap
    fn on_gameplay_started(&mut self);

    /// Whether this connection data has reached a terminal state and can be dropped
    fn is_finished(&self) -> bool;
}
