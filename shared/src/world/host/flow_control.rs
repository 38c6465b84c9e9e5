use std::time::Duration;

use log::{info, warn};

use crate::{GameInstant, PendingCreationLimit, ReplicationConfig};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GameplayPhase {
    /// Bulk initial world population, governed by the pre-init cap
    Initializing,
    /// Gameplay has begun, governed by the post-init cap
    Started,
}

/// Back-pressure policy for one connection.
///
/// Caps only gate *new* creations: lowering a cap never revokes creations that were
/// already dispatched, and only records awaiting a creation ack count against it.
/// Changing the removal delay only affects removals scheduled afterwards.
pub struct FlowControl {
    max_pending_creation: PendingCreationLimit,
    max_pending_creation_post_init: PendingCreationLimit,
    pending_removal_delay: Duration,
    phase: GameplayPhase,
}

impl FlowControl {
    pub fn new(config: &ReplicationConfig) -> Self {
        Self {
            max_pending_creation: config.max_pending_creation,
            max_pending_creation_post_init: config.max_pending_creation_post_init,
            pending_removal_delay: config.pending_removal_delay,
            phase: GameplayPhase::Initializing,
        }
    }

    pub fn apply_config(&mut self, config: &ReplicationConfig) {
        self.max_pending_creation = config.max_pending_creation;
        self.max_pending_creation_post_init = config.max_pending_creation_post_init;
        self.pending_removal_delay = config.pending_removal_delay;
    }

    pub fn set_max_pending_creation(&mut self, limit: PendingCreationLimit) {
        self.max_pending_creation = limit;
    }

    pub fn set_max_pending_creation_post_init(&mut self, limit: PendingCreationLimit) {
        self.max_pending_creation_post_init = limit;
    }

    pub fn set_pending_removal_delay(&mut self, delay: Duration) {
        self.pending_removal_delay = delay;
    }

    /// Switches to the post-init cap. Returns false if gameplay had already started.
    pub fn on_gameplay_started(&mut self) -> bool {
        if self.phase == GameplayPhase::Started {
            warn!("FlowControl: gameplay already started, ignoring repeated transition");
            return false;
        }
        self.phase = GameplayPhase::Started;
        info!(
            "FlowControl: gameplay started, pending creation cap {:?} -> {:?}",
            self.max_pending_creation, self.max_pending_creation_post_init
        );
        true
    }

    pub fn phase(&self) -> GameplayPhase {
        self.phase
    }

    /// The cap in force for the current phase
    pub fn active_limit(&self) -> PendingCreationLimit {
        match self.phase {
            GameplayPhase::Initializing => self.max_pending_creation,
            GameplayPhase::Started => self.max_pending_creation_post_init,
        }
    }

    /// How many new creations may be dispatched while `pending` are awaiting acks
    pub fn creation_budget(&self, pending: usize) -> usize {
        self.active_limit().remaining(pending)
    }

    pub fn pending_removal_delay(&self) -> Duration {
        self.pending_removal_delay
    }

    /// Deadline for a removal scheduled at `now` under the current delay
    pub fn removal_deadline(&self, now: GameInstant) -> GameInstant {
        now.add_duration(self.pending_removal_delay)
    }
}
