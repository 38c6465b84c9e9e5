use std::{
    collections::BTreeSet,
    sync::{Arc, Weak},
};

use log::{debug, info, trace, warn};

use keystone_shared::{
    Connection, ConnectionData, ConnectionDataType, ConnectionId, DisconnectReason,
    EntityReplicationManager, GameInstant, GlobalEntity, HostType, LiveReplicationConfig,
    MigrationPacket, NetworkEntityHandle, Packet, ReplicationPacket, ReplicationWindow,
    TerminationEndpoint,
};

use crate::{ClientConfig, MigrationRedirect};

/// The client's view of its connection to the server.
///
/// Tracks which server entities exist locally, acknowledging each creation so the
/// server's flow control can release its budget, and replicates client-owned entities
/// upstream through its own [`EntityReplicationManager`].
pub struct ClientToServerConnectionData {
    connection_id: ConnectionId,
    connection: Weak<dyn Connection>,
    replication_manager: EntityReplicationManager,
    controlled_entity: NetworkEntityHandle,
    replication_config: LiveReplicationConfig,
    can_send_updates: bool,
    remote_entities: BTreeSet<GlobalEntity>,
    migration_redirect: Option<MigrationRedirect>,
    migrated: bool,
}

impl ClientToServerConnectionData {
    pub fn new(
        connection: &Arc<dyn Connection>,
        controlled_entity: NetworkEntityHandle,
        config: &ClientConfig,
    ) -> Self {
        let replication_config = config.replication.clone();
        let replication_manager = EntityReplicationManager::new(
            HostType::Client,
            Arc::downgrade(connection),
            &replication_config.snapshot(),
        );

        Self {
            connection_id: connection.connection_id(),
            connection: Arc::downgrade(connection),
            replication_manager,
            controlled_entity,
            replication_config,
            can_send_updates: true,
            remote_entities: BTreeSet::new(),
            migration_redirect: None,
            migrated: false,
        }
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    pub fn controlled_entity(&self) -> &NetworkEntityHandle {
        &self.controlled_entity
    }

    pub fn set_replication_window(&mut self, replication_window: Box<dyn ReplicationWindow>) {
        self.replication_manager.set_replication_window(replication_window);
    }

    /// Server entities instantiated on this client, in ascending order
    pub fn remote_entities(&self) -> impl Iterator<Item = &GlobalEntity> {
        self.remote_entities.iter()
    }

    pub fn has_remote_entity(&self, entity: &GlobalEntity) -> bool {
        self.remote_entities.contains(entity)
    }

    /// Hands the redirect to the framework so it can reconnect to the destination host
    pub fn take_migration_redirect(&mut self) -> Option<MigrationRedirect> {
        self.migration_redirect.take()
    }

    fn on_entity_created(&mut self, entity: GlobalEntity) {
        // a retransmitted create is acknowledged again
        if !self.remote_entities.insert(entity) {
            trace!(
                "ClientToServerConnectionData({}): duplicate creation of {}",
                self.connection_id,
                entity
            );
        }

        let Some(connection) = self.connection.upgrade() else {
            return;
        };
        let ack = ReplicationPacket::EntityCreateAck { entity };
        if let Err(error) = connection.send_reliable_packet(ack.into()) {
            warn!(
                "ClientToServerConnectionData({}): acknowledging {} failed: {}",
                self.connection_id, entity, error
            );
        }
    }

    fn on_client_migration(&mut self, redirect: MigrationRedirect) {
        info!(
            "ClientToServerConnectionData({}): redirected to {} with token {}",
            self.connection_id, redirect.destination, redirect.token
        );
        self.can_send_updates = false;
        self.replication_manager.clear(false);
        self.remote_entities.clear();
        self.migration_redirect = Some(redirect);
        self.migrated = true;

        if let Some(connection) = self.connection.upgrade() {
            connection.disconnect(DisconnectReason::ClientMigrated, TerminationEndpoint::Local);
        }
    }
}

impl ConnectionData for ClientToServerConnectionData {
    fn connection_data_type(&self) -> ConnectionDataType {
        ConnectionDataType::ClientToServer
    }

    fn connection(&self) -> Option<Arc<dyn Connection>> {
        self.connection.upgrade()
    }

    fn replication_manager(&self) -> &EntityReplicationManager {
        &self.replication_manager
    }

    fn replication_manager_mut(&mut self) -> &mut EntityReplicationManager {
        &mut self.replication_manager
    }

    fn update(&mut self, now: GameInstant) {
        if !self.can_send_updates {
            return;
        }
        self.replication_manager
            .apply_config(&self.replication_config.snapshot());
        self.replication_manager.send_updates(now);
    }

    fn handle_packet(&mut self, packet: Packet, now: GameInstant) {
        match packet {
            Packet::Replication(ReplicationPacket::EntityCreate { entity, .. }) => {
                self.on_entity_created(entity);
            }
            Packet::Replication(ReplicationPacket::EntityUpdate { entity, .. }) => {
                if !self.remote_entities.contains(&entity) {
                    debug!(
                        "ClientToServerConnectionData({}): update for unknown {}",
                        self.connection_id, entity
                    );
                }
            }
            Packet::Replication(ReplicationPacket::EntityRemove { entity }) => {
                if !self.remote_entities.remove(&entity) {
                    debug!(
                        "ClientToServerConnectionData({}): removal of unknown {}",
                        self.connection_id, entity
                    );
                }
            }
            Packet::Replication(ReplicationPacket::EntityCreateAck { entity }) => {
                if let Err(error) = self.replication_manager.handle_entity_create_ack(&entity) {
                    warn!(
                        "ClientToServerConnectionData({}): {}",
                        self.connection_id, error
                    );
                }
            }
            Packet::Migration(MigrationPacket::ClientMigration {
                token,
                destination,
                snapshot,
            }) => {
                self.on_client_migration(MigrationRedirect {
                    token,
                    destination,
                    snapshot,
                });
            }
            other => {
                debug!(
                    "ClientToServerConnectionData({}): ignoring {} at {}",
                    self.connection_id,
                    other.name(),
                    now
                );
            }
        }
    }

    fn can_send_updates(&self) -> bool {
        self.can_send_updates
    }

    fn set_can_send_updates(&mut self, can_send_updates: bool) {
        self.can_send_updates = can_send_updates;
    }

    fn on_gameplay_started(&mut self) {
        self.replication_manager
            .apply_config(&self.replication_config.snapshot());
        self.replication_manager.on_gameplay_started();
    }

    fn is_finished(&self) -> bool {
        self.migrated || self.connection.upgrade().map_or(true, |connection| !connection.is_open())
    }
}

impl Drop for ClientToServerConnectionData {
    fn drop(&mut self) {
        self.replication_manager.clear(false);
    }
}
