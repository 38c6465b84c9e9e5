use crate::{GameInstant, GlobalEntity, ReplicationError};

/// Where an entity stands, from one remote peer's point of view
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReplicationState {
    /// Relevant, but nothing has been sent yet
    NotReplicated,
    /// Creation sent, waiting for the peer's acknowledgement
    PendingCreate,
    /// The peer has the entity and receives updates
    Active,
    /// Left the replication window; removal happens at the deadline
    PendingRemove,
    /// Removal finalized; the record is about to be evicted
    Removed,
}

impl ReplicationState {
    /// Lifecycle edges. A record moves forward only, except that a pending removal may
    /// be cancelled when the entity becomes relevant again before its deadline.
    pub fn can_transition_to(self, next: ReplicationState) -> bool {
        matches!(
            (self, next),
            (ReplicationState::NotReplicated, ReplicationState::PendingCreate)
                | (ReplicationState::PendingCreate, ReplicationState::Active)
                | (ReplicationState::Active, ReplicationState::PendingRemove)
                | (ReplicationState::PendingRemove, ReplicationState::Active)
                | (ReplicationState::PendingRemove, ReplicationState::Removed)
        )
    }
}

/// Per-entity, per-connection replication bookkeeping
#[derive(Clone, Debug)]
pub struct ReplicationRecord {
    entity: GlobalEntity,
    state: ReplicationState,
    last_sent: Option<GameInstant>,
    removal_deadline: Option<GameInstant>,
    removal_sent: bool,
}

impl ReplicationRecord {
    pub fn new(entity: GlobalEntity) -> Self {
        Self {
            entity,
            state: ReplicationState::NotReplicated,
            last_sent: None,
            removal_deadline: None,
            removal_sent: false,
        }
    }

    pub fn entity(&self) -> GlobalEntity {
        self.entity
    }

    pub fn state(&self) -> ReplicationState {
        self.state
    }

    pub fn last_sent(&self) -> Option<GameInstant> {
        self.last_sent
    }

    pub fn removal_deadline(&self) -> Option<GameInstant> {
        self.removal_deadline
    }

    pub fn removal_sent(&self) -> bool {
        self.removal_sent
    }

    /// Whether the peer currently holds (or is about to hold) this entity
    pub fn is_known_to_peer(&self) -> bool {
        match self.state {
            ReplicationState::PendingCreate | ReplicationState::Active => true,
            ReplicationState::PendingRemove => !self.removal_sent,
            ReplicationState::NotReplicated | ReplicationState::Removed => false,
        }
    }

    pub fn transition(&mut self, next: ReplicationState) -> Result<(), ReplicationError> {
        if !self.state.can_transition_to(next) {
            return Err(ReplicationError::InvalidTransition {
                entity_id: self.entity.to_u64(),
                from: self.state,
                to: next,
            });
        }

        match next {
            ReplicationState::Active => {
                self.removal_deadline = None;
            }
            ReplicationState::PendingCreate
            | ReplicationState::PendingRemove
            | ReplicationState::Removed
            | ReplicationState::NotReplicated => {}
        }

        self.state = next;
        Ok(())
    }

    /// Moves to `PendingRemove` with a fixed deadline. Later delay changes never touch it.
    pub fn schedule_removal(&mut self, deadline: GameInstant) -> Result<(), ReplicationError> {
        self.transition(ReplicationState::PendingRemove)?;
        self.removal_deadline = Some(deadline);
        Ok(())
    }

    /// Brings a pending removal forward to `now`; never pushes it back
    pub fn expedite_removal(&mut self, now: GameInstant) {
        if self.state != ReplicationState::PendingRemove {
            return;
        }
        self.removal_deadline = Some(match self.removal_deadline {
            Some(deadline) if deadline < now => deadline,
            _ => now,
        });
    }

    pub fn removal_due(&self, now: GameInstant) -> bool {
        match (self.state, self.removal_deadline) {
            (ReplicationState::PendingRemove, Some(deadline)) => now >= deadline,
            _ => false,
        }
    }

    pub fn record_sent(&mut self, now: GameInstant) {
        // last_sent never moves backwards
        self.last_sent = Some(match self.last_sent {
            Some(previous) if previous > now => previous,
            _ => now,
        });
    }

    pub fn mark_removal_sent(&mut self) {
        self.removal_sent = true;
    }
}
