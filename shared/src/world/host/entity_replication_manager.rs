use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak},
    time::Duration,
};

use log::{debug, info, trace, warn};

use crate::{
    world::host::{
        flow_control::FlowControl,
        replication_record::{ReplicationRecord, ReplicationState},
    },
    Connection, GameInstant, GlobalEntity, HostType, PendingCreationLimit, ReplicationConfig,
    ReplicationError, ReplicationPacket, ReplicationWindow,
};

type RecordMap = BTreeMap<GlobalEntity, ReplicationRecord>;

fn read_records(records: &RwLock<RecordMap>) -> RwLockReadGuard<'_, RecordMap> {
    match records.read() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn write_records(records: &RwLock<RecordMap>) -> RwLockWriteGuard<'_, RecordMap> {
    match records.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Drops every record of an [`EntityReplicationManager`] without sending anything.
///
/// Handed to event handlers that must tear replication down synchronously, outside the
/// simulation step that owns the manager. Does nothing once the manager is gone.
#[derive(Clone)]
pub struct ReplicationClearHandle {
    records: Weak<RwLock<RecordMap>>,
}

impl ReplicationClearHandle {
    /// Returns how many records were dropped
    pub fn clear(&self) -> usize {
        let Some(records) = self.records.upgrade() else {
            return 0;
        };
        let mut records = write_records(&records);
        let count = records.len();
        records.clear();
        count
    }
}

/// Decides which entities one remote peer knows about.
///
/// Owns one [`ReplicationRecord`] per entity for a single connection, throttles how many
/// creations may be awaiting acknowledgement, and schedules delayed removal of entities
/// that leave the peer's replication window.
///
/// The transport connection is held weakly: once it is gone every send operation is a
/// no-op, and teardown is left to whoever owns the connection.
pub struct EntityReplicationManager {
    host_type: HostType,
    connection: Weak<dyn Connection>,
    flow_control: FlowControl,
    // BTreeMap: sends go out in ascending entity order, so retransmission is reproducible
    records: Arc<RwLock<RecordMap>>,
    replication_window: Option<Box<dyn ReplicationWindow>>,
    deferred_creation_count: usize,
}

impl EntityReplicationManager {
    pub fn new(
        host_type: HostType,
        connection: Weak<dyn Connection>,
        config: &ReplicationConfig,
    ) -> Self {
        Self {
            host_type,
            connection,
            flow_control: FlowControl::new(config),
            records: Arc::new(RwLock::new(BTreeMap::new())),
            replication_window: None,
            deferred_creation_count: 0,
        }
    }

    // Flow control

    /// Only gates new creations; records already awaiting an ack are never cancelled
    pub fn set_max_remote_entities_pending_creation_count(&mut self, limit: PendingCreationLimit) {
        self.flow_control.set_max_pending_creation(limit);
    }

    pub fn set_max_remote_entities_pending_creation_count_post_init(
        &mut self,
        limit: PendingCreationLimit,
    ) {
        self.flow_control.set_max_pending_creation_post_init(limit);
    }

    /// Only removals scheduled after this call use the new delay
    pub fn set_entity_pending_removal(&mut self, delay: Duration) {
        self.flow_control.set_pending_removal_delay(delay);
    }

    pub fn apply_config(&mut self, config: &ReplicationConfig) {
        self.flow_control.apply_config(config);
    }

    pub fn on_gameplay_started(&mut self) -> bool {
        self.flow_control.on_gameplay_started()
    }

    pub fn flow_control(&self) -> &FlowControl {
        &self.flow_control
    }

    pub fn set_replication_window(&mut self, replication_window: Box<dyn ReplicationWindow>) {
        self.replication_window = Some(replication_window);
    }

    // Accessors

    pub fn host_type(&self) -> HostType {
        self.host_type
    }

    pub fn connection(&self) -> Option<Arc<dyn Connection>> {
        self.connection.upgrade()
    }

    pub fn clear_handle(&self) -> ReplicationClearHandle {
        ReplicationClearHandle {
            records: Arc::downgrade(&self.records),
        }
    }

    pub fn record(&self, entity: &GlobalEntity) -> Option<ReplicationRecord> {
        read_records(&self.records).get(entity).cloned()
    }

    /// Copies of the records, in ascending entity order
    pub fn records(&self) -> impl Iterator<Item = ReplicationRecord> {
        read_records(&self.records)
            .values()
            .cloned()
            .collect::<Vec<_>>()
            .into_iter()
    }

    pub fn len(&self) -> usize {
        read_records(&self.records).len()
    }

    pub fn is_empty(&self) -> bool {
        read_records(&self.records).is_empty()
    }

    pub fn pending_creation_count(&self) -> usize {
        pending_creation_count(&read_records(&self.records))
    }

    /// Relevant entities the last pass could not create because the cap was reached
    pub fn deferred_creation_count(&self) -> usize {
        self.deferred_creation_count
    }

    fn live_connection(&self) -> Option<Arc<dyn Connection>> {
        self.connection
            .upgrade()
            .filter(|connection| connection.is_open())
    }

    // Outgoing

    /// Runs one scheduling pass.
    ///
    /// In ascending entity order: relevant entities without a record are created while
    /// the flow-control budget lasts (the rest are retried on a later pass); acknowledged
    /// entities get delta updates; entities that left the window are scheduled for
    /// removal; removals past their deadline are finalized and evicted. Destroyed
    /// entities are removed in the same pass, even if their removal was already pending.
    pub fn send_updates(&mut self, now: GameInstant) {
        let Some(connection) = self.live_connection() else {
            trace!(
                "EntityReplicationManager({:?}): connection gone, skipping send",
                self.host_type
            );
            return;
        };

        let window = self.replication_window.as_deref();
        let mut records = write_records(&self.records);
        let relevant: BTreeSet<GlobalEntity> = window
            .map(|window| window.replication_set())
            .unwrap_or_default();

        let mut creation_budget = self
            .flow_control
            .creation_budget(pending_creation_count(&records));
        let mut deferred = 0;
        let mut evicted = Vec::new();

        let candidates: BTreeSet<GlobalEntity> = relevant
            .iter()
            .copied()
            .chain(records.keys().copied())
            .collect();

        for entity in candidates {
            let is_relevant = relevant.contains(&entity);

            if !records.contains_key(&entity) {
                if creation_budget == 0 {
                    deferred += 1;
                    continue;
                }
                if let Some(record) = create_entity(connection.as_ref(), window, entity, now) {
                    records.insert(entity, record);
                    creation_budget -= 1;
                }
                continue;
            }
            let Some(record) = records.get_mut(&entity) else {
                continue;
            };

            match record.state() {
                ReplicationState::PendingCreate => {
                    // waiting on the peer's ack
                }
                ReplicationState::Active => {
                    if is_relevant {
                        send_entity_update(connection.as_ref(), window, record, now);
                    } else {
                        let alive = window.map_or(true, |window| window.is_entity_alive(&entity));
                        let deadline = if alive {
                            self.flow_control.removal_deadline(now)
                        } else {
                            now
                        };
                        match record.schedule_removal(deadline) {
                            Ok(()) => debug!(
                                "EntityReplicationManager({:?}): {} left the window, removal at {}",
                                self.host_type, entity, deadline
                            ),
                            Err(error) => warn!("EntityReplicationManager: {}", error),
                        }
                    }
                }
                ReplicationState::PendingRemove => {
                    let destroyed = window.map_or(false, |window| !window.is_entity_alive(&entity));
                    if !is_relevant && destroyed {
                        record.expedite_removal(now);
                    } else if is_relevant {
                        match record.transition(ReplicationState::Active) {
                            Ok(()) => {
                                debug!(
                                    "EntityReplicationManager({:?}): {} re-entered the window",
                                    self.host_type, entity
                                );
                                send_entity_update(connection.as_ref(), window, record, now);
                            }
                            Err(error) => warn!("EntityReplicationManager: {}", error),
                        }
                    }
                }
                ReplicationState::NotReplicated | ReplicationState::Removed => {
                    warn!(
                        "EntityReplicationManager({:?}): evicting stale {:?} record for {}",
                        self.host_type,
                        record.state(),
                        entity
                    );
                    evicted.push(entity);
                    continue;
                }
            }

            if record.removal_due(now) {
                finalize_removal(connection.as_ref(), record);
                evicted.push(entity);
            }
        }

        for entity in evicted {
            records.remove(&entity);
        }
        drop(records);

        if deferred > 0 {
            debug!(
                "EntityReplicationManager({:?}): deferred {} creations, cap {:?} reached",
                self.host_type,
                deferred,
                self.flow_control.active_limit()
            );
        }
        self.deferred_creation_count = deferred;
    }

    // Incoming

    /// The peer finished instantiating `entity`.
    ///
    /// Duplicate acks are ignored. Acks for entities without a record (already removed,
    /// or never created) return an error and never resurrect a record.
    pub fn handle_entity_create_ack(&mut self, entity: &GlobalEntity) -> Result<(), ReplicationError> {
        let mut records = write_records(&self.records);
        let Some(record) = records.get_mut(entity) else {
            return Err(ReplicationError::UnknownEntity {
                entity_id: entity.to_u64(),
                operation: "acknowledge creation of",
            });
        };

        if record.state() != ReplicationState::PendingCreate {
            trace!(
                "EntityReplicationManager({:?}): duplicate creation ack for {}",
                self.host_type,
                entity
            );
            return Ok(());
        }

        record.transition(ReplicationState::Active)?;
        trace!(
            "EntityReplicationManager({:?}): {} acknowledged",
            self.host_type,
            entity
        );
        Ok(())
    }

    // Lifecycle

    /// Drops every record.
    ///
    /// With `flush`, first sends one removal per entity the peer still holds: every
    /// PendingCreate and Active record, plus PendingRemove records whose removal was not
    /// sent yet. Without, discards immediately (the connection is gone, or there is
    /// nothing left to announce).
    pub fn clear(&mut self, flush: bool) {
        let mut records = write_records(&self.records);
        if flush {
            match self.live_connection() {
                Some(connection) => {
                    for record in records.values().filter(|record| record.is_known_to_peer()) {
                        let packet = ReplicationPacket::EntityRemove {
                            entity: record.entity(),
                        };
                        if let Err(error) = connection.send_reliable_packet(packet.into()) {
                            warn!(
                                "EntityReplicationManager({:?}): flushing removal of {} failed: {}",
                                self.host_type,
                                record.entity(),
                                error
                            );
                        }
                    }
                }
                None => {
                    debug!(
                        "EntityReplicationManager({:?}): connection gone, clearing without flush",
                        self.host_type
                    );
                }
            }
        }

        if !records.is_empty() {
            info!(
                "EntityReplicationManager({:?}): cleared {} records (flush: {})",
                self.host_type,
                records.len(),
                flush
            );
        }
        records.clear();
        self.deferred_creation_count = 0;
    }
}

fn pending_creation_count(records: &RecordMap) -> usize {
    records
        .values()
        .filter(|record| record.state() == ReplicationState::PendingCreate)
        .count()
}

fn create_entity(
    connection: &dyn Connection,
    window: Option<&dyn ReplicationWindow>,
    entity: GlobalEntity,
    now: GameInstant,
) -> Option<ReplicationRecord> {
    let mut record = ReplicationRecord::new(entity);
    if let Err(error) = record.transition(ReplicationState::PendingCreate) {
        warn!("EntityReplicationManager: {}", error);
        return None;
    }

    let state = window
        .and_then(|window| window.entity_state(&entity, None))
        .unwrap_or_default();
    let packet = ReplicationPacket::EntityCreate {
        entity,
        sent_at: now,
        state,
    };
    if let Err(error) = connection.send_reliable_packet(packet.into()) {
        // retried on the next pass
        warn!("EntityReplicationManager: creation of {} not sent: {}", entity, error);
        return None;
    }

    record.record_sent(now);
    Some(record)
}

fn send_entity_update(
    connection: &dyn Connection,
    window: Option<&dyn ReplicationWindow>,
    record: &mut ReplicationRecord,
    now: GameInstant,
) {
    let Some(window) = window else {
        return;
    };
    let entity = record.entity();
    let Some(state) = window.entity_state(&entity, record.last_sent()) else {
        return;
    };

    let packet = ReplicationPacket::EntityUpdate {
        entity,
        sent_at: now,
        state,
    };
    match connection.send_unreliable_packet(packet.into()) {
        Ok(()) => record.record_sent(now),
        Err(error) => warn!("EntityReplicationManager: update of {} not sent: {}", entity, error),
    }
}

fn finalize_removal(connection: &dyn Connection, record: &mut ReplicationRecord) {
    let entity = record.entity();
    if !record.removal_sent() {
        let packet = ReplicationPacket::EntityRemove { entity };
        if let Err(error) = connection.send_reliable_packet(packet.into()) {
            warn!("EntityReplicationManager: removal of {} not sent: {}", entity, error);
        }
        record.mark_removal_sent();
    }

    if let Err(error) = record.transition(ReplicationState::Removed) {
        warn!("EntityReplicationManager: {}", error);
    }
}
