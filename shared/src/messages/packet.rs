use std::net::SocketAddr;

use crate::{GameInstant, GlobalEntity, HostId, MigrationToken};

/// Entity lifecycle traffic between a host and one remote peer
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReplicationPacket {
    /// The entity now exists for the peer; `state` is its full encoded state
    EntityCreate {
        entity: GlobalEntity,
        sent_at: GameInstant,
        state: Vec<u8>,
    },
    /// Delta for an entity the peer has acknowledged
    EntityUpdate {
        entity: GlobalEntity,
        sent_at: GameInstant,
        state: Vec<u8>,
    },
    /// Terminal notification, the peer should tear the entity down
    EntityRemove { entity: GlobalEntity },
    /// Sent back by the peer once it has fully instantiated a created entity
    EntityCreateAck { entity: GlobalEntity },
}

/// Authority handoff traffic. Host-to-host packets travel over the server network,
/// the redirect travels over the client's own connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MigrationPacket {
    /// Source host → destination host: a client holding `token` is about to arrive
    NotifyClientMigration {
        token: MigrationToken,
        entity: GlobalEntity,
        source_host: HostId,
        snapshot: GameInstant,
    },
    /// Source host → client: reconnect to `destination` presenting `token`
    ClientMigration {
        token: MigrationToken,
        destination: SocketAddr,
        snapshot: GameInstant,
    },
    /// Destination host → source host: the client arrived and authority was assumed
    MigrationAccepted {
        token: MigrationToken,
        entity: GlobalEntity,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Packet {
    Replication(ReplicationPacket),
    Migration(MigrationPacket),
}

impl Packet {
    /// The entity this packet is about, if any
    pub fn entity(&self) -> Option<GlobalEntity> {
        match self {
            Packet::Replication(ReplicationPacket::EntityCreate { entity, .. })
            | Packet::Replication(ReplicationPacket::EntityUpdate { entity, .. })
            | Packet::Replication(ReplicationPacket::EntityRemove { entity })
            | Packet::Replication(ReplicationPacket::EntityCreateAck { entity })
            | Packet::Migration(MigrationPacket::NotifyClientMigration { entity, .. })
            | Packet::Migration(MigrationPacket::MigrationAccepted { entity, .. }) => Some(*entity),
            Packet::Migration(MigrationPacket::ClientMigration { .. }) => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Packet::Replication(ReplicationPacket::EntityCreate { .. }) => "EntityCreate",
            Packet::Replication(ReplicationPacket::EntityUpdate { .. }) => "EntityUpdate",
            Packet::Replication(ReplicationPacket::EntityRemove { .. }) => "EntityRemove",
            Packet::Replication(ReplicationPacket::EntityCreateAck { .. }) => "EntityCreateAck",
            Packet::Migration(MigrationPacket::NotifyClientMigration { .. }) => {
                "NotifyClientMigration"
            }
            Packet::Migration(MigrationPacket::ClientMigration { .. }) => "ClientMigration",
            Packet::Migration(MigrationPacket::MigrationAccepted { .. }) => "MigrationAccepted",
        }
    }
}

impl From<ReplicationPacket> for Packet {
    fn from(packet: ReplicationPacket) -> Self {
        Packet::Replication(packet)
    }
}

impl From<MigrationPacket> for Packet {
    fn from(packet: MigrationPacket) -> Self {
        Packet::Migration(packet)
    }
}
