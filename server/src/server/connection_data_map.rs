use std::collections::HashMap;

use log::info;

use keystone_shared::{ConnectionData, ConnectionId, GameInstant, GlobalEntity, MigrationToken};

use crate::{MigrationError, ServerToClientConnectionData};

/// Server-to-client connection data, driven in registration order
#[derive(Default)]
pub struct ConnectionDataMap {
    order: Vec<ConnectionId>,
    entries: HashMap<ConnectionId, ServerToClientConnectionData>,
}

impl ConnectionDataMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `connection_data`, replacing (in place) any entry for the same connection
    pub fn insert(
        &mut self,
        connection_data: ServerToClientConnectionData,
    ) -> Option<ServerToClientConnectionData> {
        let connection_id = connection_data.connection_id();
        let previous = self.entries.insert(connection_id, connection_data);
        if previous.is_none() {
            self.order.push(connection_id);
        }
        previous
    }

    pub fn remove(&mut self, connection_id: &ConnectionId) -> Option<ServerToClientConnectionData> {
        let removed = self.entries.remove(connection_id)?;
        self.order.retain(|id| id != connection_id);
        Some(removed)
    }

    pub fn get(&self, connection_id: &ConnectionId) -> Option<&ServerToClientConnectionData> {
        self.entries.get(connection_id)
    }

    pub fn get_mut(
        &mut self,
        connection_id: &ConnectionId,
    ) -> Option<&mut ServerToClientConnectionData> {
        self.entries.get_mut(connection_id)
    }

    /// Connection ids in registration order
    pub fn connection_ids(&self) -> &[ConnectionId] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Runs one simulation step for every connection, in registration order
    pub fn update_all(&mut self, now: GameInstant) {
        for connection_id in &self.order {
            if let Some(connection_data) = self.entries.get_mut(connection_id) {
                connection_data.update(now);
            }
        }
    }

    pub fn on_gameplay_started_all(&mut self) {
        for connection_id in &self.order {
            if let Some(connection_data) = self.entries.get_mut(connection_id) {
                connection_data.on_gameplay_started();
            }
        }
    }

    /// Routes a destination host's confirmation to the connection whose outgoing
    /// migration issued `token`
    pub fn handle_migration_accepted(
        &mut self,
        token: MigrationToken,
        entity: GlobalEntity,
    ) -> Result<ConnectionId, MigrationError> {
        let connection_id = self
            .order
            .iter()
            .copied()
            .find(|connection_id| {
                self.entries
                    .get(connection_id)
                    .and_then(|connection_data| connection_data.outgoing_migration())
                    .map(|migration| migration.token())
                    == Some(token)
            })
            .ok_or(MigrationError::UnknownToken { token })?;

        let connection_data = self
            .entries
            .get_mut(&connection_id)
            .ok_or(MigrationError::UnknownToken { token })?;
        connection_data.on_migration_accepted(token, entity)?;
        Ok(connection_id)
    }

    /// Drops connection data that reached a terminal state, returning the dropped ids
    pub fn retain_live(&mut self) -> Vec<ConnectionId> {
        let finished: Vec<ConnectionId> = self
            .order
            .iter()
            .copied()
            .filter(|connection_id| {
                self.entries
                    .get(connection_id)
                    .map_or(true, |connection_data| connection_data.is_finished())
            })
            .collect();

        for connection_id in &finished {
            if let Some(connection_data) = self.remove(connection_id) {
                info!(
                    "Dropping connection data for {} ({:?})",
                    connection_id,
                    connection_data.state()
                );
            }
        }
        finished
    }
}
