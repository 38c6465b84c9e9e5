use std::{collections::HashMap, time::Duration};

use log::{info, warn};

use keystone_shared::{GameInstant, GlobalEntity, HostId, MigrationPacket, MigrationToken, Packet};

use crate::{MigrationConfig, MigrationError};

/// A client the destination host has been told to expect
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingMigration {
    pub token: MigrationToken,
    pub source_host: HostId,
    pub entity: GlobalEntity,
    pub snapshot: GameInstant,
    pub expires_at: GameInstant,
}

/// A migrated client whose token was redeemed. The destination now holds authority.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AcceptedMigration {
    pub token: MigrationToken,
    pub source_host: HostId,
    pub entity: GlobalEntity,
    pub snapshot: GameInstant,
}

impl AcceptedMigration {
    /// Confirmation for the source host, which may then drop its connection data
    pub fn accepted_packet(&self) -> Packet {
        MigrationPacket::MigrationAccepted {
            token: self.token,
            entity: self.entity,
        }
        .into()
    }
}

/// Destination-side registry of clients expected to reconnect.
///
/// Tokens are single use: redeeming one removes its slot whether or not the attempt
/// succeeds, so at most one host ever assumes authority for a given handoff.
pub struct PendingMigrations {
    reconnect_timeout: Duration,
    slots: HashMap<MigrationToken, PendingMigration>,
}

impl PendingMigrations {
    pub fn new(config: &MigrationConfig) -> Self {
        Self {
            reconnect_timeout: config.reconnect_timeout,
            slots: HashMap::new(),
        }
    }

    pub fn register(
        &mut self,
        source_host: HostId,
        token: MigrationToken,
        entity: GlobalEntity,
        snapshot: GameInstant,
        now: GameInstant,
    ) -> Result<(), MigrationError> {
        if self.slots.contains_key(&token) {
            return Err(MigrationError::DuplicateToken { token });
        }

        let expires_at = now.add_duration(self.reconnect_timeout);
        info!(
            "Expecting migrated client for {} from {} until {}",
            entity, source_host, expires_at
        );
        self.slots.insert(
            token,
            PendingMigration {
                token,
                source_host,
                entity,
                snapshot,
                expires_at,
            },
        );
        Ok(())
    }

    /// Registers the slot described by a `NotifyClientMigration` packet. Other packets
    /// are not for this registry and are ignored.
    pub fn handle_packet(
        &mut self,
        packet: &MigrationPacket,
        now: GameInstant,
    ) -> Result<(), MigrationError> {
        match packet {
            MigrationPacket::NotifyClientMigration {
                token,
                entity,
                source_host,
                snapshot,
            } => self.register(*source_host, *token, *entity, *snapshot, now),
            MigrationPacket::ClientMigration { .. } | MigrationPacket::MigrationAccepted { .. } => {
                Ok(())
            }
        }
    }

    /// Redeems `token` for a reconnecting client claiming `entity`
    pub fn accept(
        &mut self,
        token: MigrationToken,
        entity: GlobalEntity,
        now: GameInstant,
    ) -> Result<AcceptedMigration, MigrationError> {
        let slot = self
            .slots
            .remove(&token)
            .ok_or(MigrationError::UnknownToken { token })?;

        if now >= slot.expires_at {
            warn!("Migration token {} presented after it expired", token);
            return Err(MigrationError::TokenExpired {
                token,
                expired_at: slot.expires_at,
            });
        }
        if slot.entity != entity {
            warn!(
                "Migration token {} presented for {}, issued for {}",
                token, entity, slot.entity
            );
            return Err(MigrationError::EntityMismatch {
                token,
                expected: slot.entity,
                actual: entity,
            });
        }

        info!("Migrated client arrived for {}, assuming authority", entity);
        Ok(AcceptedMigration {
            token,
            source_host: slot.source_host,
            entity: slot.entity,
            snapshot: slot.snapshot,
        })
    }

    /// Discards slots whose client never arrived, oldest first
    pub fn expire(&mut self, now: GameInstant) -> Vec<PendingMigration> {
        let expired_tokens: Vec<MigrationToken> = self
            .slots
            .values()
            .filter(|slot| now >= slot.expires_at)
            .map(|slot| slot.token)
            .collect();

        let mut expired: Vec<PendingMigration> = expired_tokens
            .iter()
            .filter_map(|token| self.slots.remove(token))
            .collect();
        expired.sort_by_key(|slot| (slot.expires_at, slot.token));

        for slot in &expired {
            warn!(
                "Migrated client for {} from {} never arrived, discarding slot",
                slot.entity, slot.source_host
            );
        }
        expired
    }

    pub fn contains(&self, token: &MigrationToken) -> bool {
        self.slots.contains_key(token)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
