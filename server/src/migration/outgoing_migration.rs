use log::info;

use keystone_shared::{
    Connection, EntityMigrationEvent, GameInstant, GlobalEntity, HostId,
    MigrationPacket, MigrationToken,
};

use crate::{generate_migration_token, HostNetwork, MigrationConfig, MigrationError};

/// Source-side half of one authority handoff.
///
/// Created once the destination host has been notified and the client redirected;
/// lives until the destination confirms or the negotiation deadline passes.
#[derive(Clone, Debug)]
pub struct OutgoingMigration {
    entity: GlobalEntity,
    destination_host: HostId,
    token: MigrationToken,
    snapshot: GameInstant,
    deadline: GameInstant,
    accepted: bool,
}

impl OutgoingMigration {
    /// Starts the handoff of `event.entity` to `event.remote_host`.
    ///
    /// 1. generates a single-use token
    /// 2. resolves the destination's client-facing address
    /// 3. notifies the destination host, over the host network, that a client holding
    ///    the token is coming
    /// 4. redirects the client to the destination, with the token and `snapshot`
    pub fn begin(
        host_network: &dyn HostNetwork,
        client_connection: &dyn Connection,
        event: &EntityMigrationEvent,
        snapshot: GameInstant,
        now: GameInstant,
        config: &MigrationConfig,
    ) -> Result<Self, MigrationError> {
        let token = generate_migration_token();

        let destination = host_network.host_address(&event.remote_host).ok_or(
            MigrationError::DestinationUnknown {
                host: event.remote_host,
            },
        )?;

        let notify = MigrationPacket::NotifyClientMigration {
            token,
            entity: event.entity,
            source_host: host_network.local_host_id(),
            snapshot,
        };
        host_network
            .send_reliable_packet(event.connection_id, notify.into())
            .map_err(|source| MigrationError::NotifyFailed {
                host: event.remote_host,
                source,
            })?;

        let redirect = MigrationPacket::ClientMigration {
            token,
            destination,
            snapshot,
        };
        client_connection
            .send_reliable_packet(redirect.into())
            .map_err(|source| MigrationError::RedirectFailed {
                connection_id: client_connection.connection_id(),
                source,
            })?;

        info!(
            "Migrating {} to {} ({}), token {}, snapshot {}",
            event.entity, event.remote_host, destination, token, snapshot
        );

        Ok(Self {
            entity: event.entity,
            destination_host: event.remote_host,
            token,
            snapshot,
            deadline: now.add_duration(config.negotiation_timeout),
            accepted: false,
        })
    }

    /// The destination reports that the client arrived and authority was assumed
    pub fn confirm(
        &mut self,
        token: MigrationToken,
        entity: GlobalEntity,
    ) -> Result<(), MigrationError> {
        if token != self.token {
            return Err(MigrationError::TokenMismatch {
                expected: self.token,
                received: token,
            });
        }
        if entity != self.entity {
            return Err(MigrationError::EntityMismatch {
                token,
                expected: self.entity,
                actual: entity,
            });
        }
        self.accepted = true;
        Ok(())
    }

    /// Still unconfirmed at or after the negotiation deadline
    pub fn is_expired(&self, now: GameInstant) -> bool {
        !self.accepted && now >= self.deadline
    }

    pub fn entity(&self) -> GlobalEntity {
        self.entity
    }

    pub fn destination_host(&self) -> HostId {
        self.destination_host
    }

    pub fn token(&self) -> MigrationToken {
        self.token
    }

    pub fn snapshot(&self) -> GameInstant {
        self.snapshot
    }

    pub fn deadline(&self) -> GameInstant {
        self.deadline
    }
}
