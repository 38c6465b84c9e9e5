//! # Keystone Shared
//! Per-connection entity replication primitives shared between keystone-server &
//! keystone-client: replication records, flow control, the replication manager and the
//! packets exchanged between hosts.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

mod connection;
mod event;
mod game_time;
mod messages;
mod types;
mod world;

pub use connection::{
    connection::{Connection, DisconnectReason, TerminationEndpoint},
    connection_data::{ConnectionData, ConnectionDataType},
    error::TransportError,
};
pub use event::{Event, EventHandler};
pub use game_time::GameInstant;
pub use messages::{
    migration_token::MigrationToken,
    packet::{MigrationPacket, Packet, ReplicationPacket},
};
pub use types::{ConnectionId, HostId, HostType};
pub use world::{
    entity::{
        global_entity::GlobalEntity,
        net_bind::{
            EntityMigrationEvent, EntityMigrationHandler, EntityStopEvent, EntityStopHandler,
            NetBindComponent, NetEntityRole, NetworkEntityHandle,
        },
    },
    host::{
        entity_replication_manager::{EntityReplicationManager, ReplicationClearHandle},
        error::{ConfigError, ReplicationError},
        flow_control::{FlowControl, GameplayPhase},
        replication_record::{ReplicationRecord, ReplicationState},
    },
    replication_config::{
        LiveReplicationConfig, PendingCreationLimit, ReplicationConfig,
        DEFAULT_PENDING_REMOVAL_MS, MAX_PENDING_REMOVAL_MS,
    },
    replication_window::ReplicationWindow,
};
