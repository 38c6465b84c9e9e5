use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard, Weak,
    },
};

use log::{debug, info, trace, warn};

use keystone_shared::{
    Connection, ConnectionData, ConnectionDataType, ConnectionId, DisconnectReason,
    EntityMigrationEvent, EntityReplicationManager, EntityStopEvent, EventHandler, GameInstant,
    GlobalEntity, HostType, LiveReplicationConfig, MigrationPacket, MigrationToken,
    NetEntityRole, NetworkEntityHandle, Packet, ReplicationPacket, ReplicationWindow,
    TerminationEndpoint, TransportError,
};

use crate::{HostNetwork, MigrationConfig, MigrationError, OutgoingMigration, ServerConfig};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Replicating to the client
    Active,
    /// Client redirected, waiting for the destination host to confirm
    Migrating,
    /// Destination confirmed; this connection data may be dropped
    Migrated,
    /// The controlled entity stopped and the connection was terminated
    EntityRemoved,
    /// Terminated after a failed migration
    Disconnected,
}

enum ControlledEntityEvent {
    Stopped(EntityStopEvent),
    Migrating(EntityMigrationEvent),
}

type EventInbox = Arc<Mutex<VecDeque<ControlledEntityEvent>>>;

fn terminate(connection: &Weak<dyn Connection>, reason: DisconnectReason) {
    if let Some(connection) = connection.upgrade().filter(|connection| connection.is_open()) {
        connection.disconnect(reason, TerminationEndpoint::Local);
    }
}

fn lock_inbox(inbox: &Mutex<VecDeque<ControlledEntityEvent>>) -> MutexGuard<'_, VecDeque<ControlledEntityEvent>> {
    match inbox.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// The server's view of one connected client.
///
/// Binds the client's transport connection to its own [`EntityReplicationManager`] and to
/// the entity the client controls. Stop and migration events raised by that entity only
/// close the send gate and queue the event; the work happens at the start of the next
/// [`update`](ConnectionData::update) or [`process_events`](Self::process_events).
pub struct ServerToClientConnectionData {
    connection_id: ConnectionId,
    connection: Weak<dyn Connection>,
    replication_manager: EntityReplicationManager,
    controlled_entity: NetworkEntityHandle,
    host_network: Arc<dyn HostNetwork>,
    replication_config: LiveReplicationConfig,
    migration_config: MigrationConfig,
    can_send_updates: Arc<AtomicBool>,
    authority_handed_off: Arc<AtomicBool>,
    inbox: EventInbox,
    stop_event_handler: Option<EventHandler>,
    migration_event_handler: Option<EventHandler>,
    outgoing_migration: Option<OutgoingMigration>,
    state: ConnectionState,
}

impl ServerToClientConnectionData {
    pub fn new(
        connection: &Arc<dyn Connection>,
        controlled_entity: NetworkEntityHandle,
        host_network: Arc<dyn HostNetwork>,
        config: &ServerConfig,
    ) -> Self {
        let connection_id = connection.connection_id();
        let replication_config = config.replication.clone();
        let replication_manager = EntityReplicationManager::new(
            HostType::Server,
            Arc::downgrade(connection),
            &replication_config.snapshot(),
        );

        let can_send_updates = Arc::new(AtomicBool::new(true));
        let authority_handed_off = Arc::new(AtomicBool::new(false));
        let inbox: EventInbox = Arc::new(Mutex::new(VecDeque::new()));

        let (stop_event_handler, migration_event_handler) =
            match controlled_entity.net_bind_component() {
                Some(net_bind) => {
                    let stop_event_handler = {
                        let can_send_updates = can_send_updates.clone();
                        let authority_handed_off = authority_handed_off.clone();
                        let inbox = inbox.clone();
                        let connection = Arc::downgrade(connection);
                        let clear_handle = replication_manager.clear_handle();
                        net_bind.add_entity_stop_event_handler(Box::new(
                            move |event: &EntityStopEvent| {
                                can_send_updates.store(false, Ordering::SeqCst);
                                // a handed-off client is reconnecting elsewhere and keeps its transport
                                if !authority_handed_off.load(Ordering::SeqCst) {
                                    terminate(&connection, DisconnectReason::TerminatedByServer);
                                }
                                clear_handle.clear();
                                lock_inbox(&inbox).push_back(ControlledEntityEvent::Stopped(*event));
                            },
                        ))
                    };
                    let migration_event_handler = {
                        let can_send_updates = can_send_updates.clone();
                        let inbox = inbox.clone();
                        net_bind.add_entity_migration_event_handler(Box::new(
                            move |event: &EntityMigrationEvent| {
                                // close the gate before anything else can be sent for the entity
                                can_send_updates.store(false, Ordering::SeqCst);
                                lock_inbox(&inbox)
                                    .push_back(ControlledEntityEvent::Migrating(*event));
                            },
                        ))
                    };
                    (Some(stop_event_handler), Some(migration_event_handler))
                }
                None => {
                    warn!(
                        "ServerToClientConnectionData({}): controlled entity has no net bind component",
                        connection_id
                    );
                    (None, None)
                }
            };

        info!(
            "ServerToClientConnectionData({}): established, controlling {:?}",
            connection_id, controlled_entity
        );

        Self {
            connection_id,
            connection: Arc::downgrade(connection),
            replication_manager,
            controlled_entity,
            host_network,
            replication_config,
            migration_config: config.migration,
            can_send_updates,
            authority_handed_off,
            inbox,
            stop_event_handler,
            migration_event_handler,
            outgoing_migration: None,
            state: ConnectionState::Active,
        }
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn controlled_entity(&self) -> &NetworkEntityHandle {
        &self.controlled_entity
    }

    pub fn outgoing_migration(&self) -> Option<&OutgoingMigration> {
        self.outgoing_migration.as_ref()
    }

    pub fn set_replication_window(&mut self, replication_window: Box<dyn ReplicationWindow>) {
        self.replication_manager.set_replication_window(replication_window);
    }

    /// Applies queued stop and migration events of the controlled entity.
    ///
    /// A stop has already disconnected the transport and dropped every record from
    /// inside the handler; this finishes the teardown.
    pub fn process_events(&mut self, now: GameInstant) {
        let events: Vec<ControlledEntityEvent> = lock_inbox(&self.inbox).drain(..).collect();
        for event in events {
            match event {
                ControlledEntityEvent::Stopped(event) => self.on_controlled_entity_stopped(&event),
                ControlledEntityEvent::Migrating(event) => {
                    self.on_controlled_entity_migrating(&event, now)
                }
            }
        }
    }

    fn on_controlled_entity_stopped(&mut self, event: &EntityStopEvent) {
        self.can_send_updates.store(false, Ordering::SeqCst);
        match self.state {
            ConnectionState::Active => {
                info!(
                    "ServerToClientConnectionData({}): controlled {} stopped, disconnecting",
                    self.connection_id, event.entity
                );
                terminate(&self.connection, DisconnectReason::TerminatedByServer);
                self.replication_manager.clear(false);
                self.controlled_entity.reset();
                self.state = ConnectionState::EntityRemoved;
            }
            ConnectionState::Migrating | ConnectionState::Migrated => {
                // authority already handed off, the client is reconnecting elsewhere
                debug!(
                    "ServerToClientConnectionData({}): {} stopped after migration",
                    self.connection_id, event.entity
                );
                self.replication_manager.clear(false);
                self.controlled_entity.reset();
            }
            ConnectionState::EntityRemoved | ConnectionState::Disconnected => {}
        }
    }

    fn on_controlled_entity_migrating(&mut self, event: &EntityMigrationEvent, now: GameInstant) {
        self.can_send_updates.store(false, Ordering::SeqCst);
        match self.begin_migration(event, now) {
            Ok(()) => {}
            Err(MigrationError::AlreadyInProgress { entity }) => {
                warn!(
                    "ServerToClientConnectionData({}): migration of {} already in progress, ignoring repeated event",
                    self.connection_id, entity
                );
            }
            Err(error) => self.fail_migration(&error),
        }
    }

    fn begin_migration(
        &mut self,
        event: &EntityMigrationEvent,
        now: GameInstant,
    ) -> Result<(), MigrationError> {
        if let Some(migration) = &self.outgoing_migration {
            return Err(MigrationError::AlreadyInProgress {
                entity: migration.entity(),
            });
        }
        if self.state != ConnectionState::Active {
            warn!(
                "ServerToClientConnectionData({}): ignoring migration of {} in state {:?}",
                self.connection_id, event.entity, self.state
            );
            return Ok(());
        }

        let Some(net_bind) = self.controlled_entity.net_bind_component() else {
            return Err(MigrationError::NoControlledEntity {
                connection_id: self.connection_id,
            });
        };
        let snapshot = net_bind.last_input_time().unwrap_or(now);

        let connection = self
            .connection
            .upgrade()
            .ok_or(MigrationError::RedirectFailed {
                connection_id: self.connection_id,
                source: TransportError::ConnectionClosed {
                    connection_id: self.connection_id,
                },
            })?;

        let migration = OutgoingMigration::begin(
            self.host_network.as_ref(),
            connection.as_ref(),
            event,
            snapshot,
            now,
            &self.migration_config,
        )?;

        // the source relinquishes authority as soon as the client is redirected
        self.authority_handed_off.store(true, Ordering::SeqCst);
        self.controlled_entity.reset();
        self.outgoing_migration = Some(migration);
        self.state = ConnectionState::Migrating;
        Ok(())
    }

    fn fail_migration(&mut self, error: &MigrationError) {
        warn!(
            "ServerToClientConnectionData({}): migration failed: {}",
            self.connection_id, error
        );
        terminate(&self.connection, DisconnectReason::MigrationFailed);
        self.can_send_updates.store(false, Ordering::SeqCst);
        self.replication_manager.clear(false);
        self.controlled_entity.reset();
        self.outgoing_migration = None;
        self.state = ConnectionState::Disconnected;
    }

    fn check_migration_timeout(&mut self, now: GameInstant) {
        let timed_out = self
            .outgoing_migration
            .as_ref()
            .filter(|migration| migration.is_expired(now))
            .map(|migration| MigrationError::NegotiationTimedOut {
                entity: migration.entity(),
                deadline: migration.deadline(),
            });
        if let Some(error) = timed_out {
            self.fail_migration(&error);
        }
    }

    /// The destination host confirmed it assumed authority.
    ///
    /// A confirmation that does not match the outgoing migration fails it: authority is
    /// never left ambiguous between two hosts.
    pub fn on_migration_accepted(
        &mut self,
        token: MigrationToken,
        entity: GlobalEntity,
    ) -> Result<(), MigrationError> {
        let Some(migration) = self.outgoing_migration.as_mut() else {
            return Err(MigrationError::UnknownToken { token });
        };

        if let Err(error) = migration.confirm(token, entity) {
            self.fail_migration(&error);
            return Err(error);
        }

        info!(
            "ServerToClientConnectionData({}): {} migrated to {}",
            self.connection_id,
            entity,
            migration.destination_host()
        );
        self.state = ConnectionState::Migrated;
        Ok(())
    }
}

impl ConnectionData for ServerToClientConnectionData {
    fn connection_data_type(&self) -> ConnectionDataType {
        ConnectionDataType::ServerToClient
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
        self.process_events(now);
        self.check_migration_timeout(now);

        if self.state != ConnectionState::Active || !self.can_send_updates() {
            return;
        }

        // the role can change before the migration event reaches us
        let role = self
            .controlled_entity
            .net_bind_component()
            .map(|net_bind| net_bind.net_entity_role());
        if role != Some(NetEntityRole::Authority) {
            trace!(
                "ServerToClientConnectionData({}): not authoritative ({:?}), skipping send",
                self.connection_id,
                role
            );
            return;
        }

        self.replication_manager
            .apply_config(&self.replication_config.snapshot());
        self.replication_manager.send_updates(now);
    }

    fn handle_packet(&mut self, packet: Packet, now: GameInstant) {
        match packet {
            Packet::Replication(ReplicationPacket::EntityCreateAck { entity }) => {
                if let Err(error) = self.replication_manager.handle_entity_create_ack(&entity) {
                    warn!(
                        "ServerToClientConnectionData({}): {}",
                        self.connection_id, error
                    );
                }
            }
            Packet::Migration(MigrationPacket::MigrationAccepted { token, entity }) => {
                if let Err(error) = self.on_migration_accepted(token, entity) {
                    warn!(
                        "ServerToClientConnectionData({}): {}",
                        self.connection_id, error
                    );
                }
            }
            other => {
                debug!(
                    "ServerToClientConnectionData({}): ignoring {} at {}",
                    self.connection_id,
                    other.name(),
                    now
                );
            }
        }
    }

    fn can_send_updates(&self) -> bool {
        self.can_send_updates.load(Ordering::SeqCst)
    }

    fn set_can_send_updates(&mut self, can_send_updates: bool) {
        self.can_send_updates
            .store(can_send_updates, Ordering::SeqCst);
    }

    fn on_gameplay_started(&mut self) {
        self.replication_manager
            .apply_config(&self.replication_config.snapshot());
        self.replication_manager.on_gameplay_started();
    }

    fn is_finished(&self) -> bool {
        matches!(
            self.state,
            ConnectionState::Migrated | ConnectionState::EntityRemoved | ConnectionState::Disconnected
        )
    }
}

impl Drop for ServerToClientConnectionData {
    fn drop(&mut self) {
        self.replication_manager.clear(false);
        if let Some(mut handler) = self.stop_event_handler.take() {
            handler.disconnect();
        }
        if let Some(mut handler) = self.migration_event_handler.take() {
            handler.disconnect();
        }
    }
}
