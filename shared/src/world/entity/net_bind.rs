use std::{fmt, sync::Arc};

use crate::{ConnectionId, EventHandler, GameInstant, GlobalEntity, HostId};

/// The local host's network role for an entity
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NetEntityRole {
    /// A proxy of an entity owned elsewhere, displayed on a client
    Client,
    /// A client-side proxy that predicts and sends input for the entity
    Autonomous,
    /// A server-side proxy of an entity another server owns
    Server,
    /// The single host permitted to issue authoritative updates
    Authority,
}

/// Raised when the entity stops (is removed from the simulation)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EntityStopEvent {
    pub entity: GlobalEntity,
}

/// Raised when the simulation decides to hand the entity's authority to another host
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EntityMigrationEvent {
    pub entity: GlobalEntity,
    /// The host that will assume authority
    pub remote_host: HostId,
    /// The host-to-host connection used to reach `remote_host`
    pub connection_id: ConnectionId,
}

pub type EntityStopHandler = Box<dyn Fn(&EntityStopEvent) + Send + Sync>;
pub type EntityMigrationHandler = Box<dyn Fn(&EntityMigrationEvent) + Send + Sync>;

/// The slice of the simulation framework's network binding that replication depends on
pub trait NetBindComponent: Send + Sync {
    fn net_entity_id(&self) -> GlobalEntity;

    fn net_entity_role(&self) -> NetEntityRole;

    /// Subscribes to the stop event. The subscription lasts as long as the returned guard.
    fn add_entity_stop_event_handler(&self, handler: EntityStopHandler) -> EventHandler;

    /// Subscribes to the migration event. The subscription lasts as long as the returned guard.
    fn add_entity_migration_event_handler(&self, handler: EntityMigrationHandler) -> EventHandler;

    /// Game time of the last input processed for this entity, used as the migration snapshot
    fn last_input_time(&self) -> Option<GameInstant> {
        None
    }
}

/// Shared handle to a networked entity. May be empty, or reset once the entity is gone.
#[derive(Clone, Default)]
pub struct NetworkEntityHandle {
    net_bind: Option<Arc<dyn NetBindComponent>>,
}

impl NetworkEntityHandle {
    pub fn new(net_bind: Arc<dyn NetBindComponent>) -> Self {
        Self {
            net_bind: Some(net_bind),
        }
    }

    pub fn empty() -> Self {
        Self { net_bind: None }
    }

    pub fn net_bind_component(&self) -> Option<&dyn NetBindComponent> {
        self.net_bind.as_deref()
    }

    pub fn entity(&self) -> Option<GlobalEntity> {
        self.net_bind.as_ref().map(|net_bind| net_bind.net_entity_id())
    }

    pub fn exists(&self) -> bool {
        self.net_bind.is_some()
    }

    pub fn reset(&mut self) {
        self.net_bind = None;
    }
}

impl fmt::Debug for NetworkEntityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.entity() {
            Some(entity) => write!(f, "NetworkEntityHandle({})", entity),
            None => write!(f, "NetworkEntityHandle(empty)"),
        }
    }
}
