use std::{
    sync::{Arc, RwLock},
    time::Duration,
};

use crate::ConfigError;

/// Default grace period before an entity that left the replication window is removed
pub const DEFAULT_PENDING_REMOVAL_MS: u64 = 10_000;
/// Largest pending removal delay accepted at the configuration boundary
pub const MAX_PENDING_REMOVAL_MS: u64 = 60 * 60 * 1_000;

/// Ceiling on the number of entities whose creation the peer has not yet acknowledged
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PendingCreationLimit {
    #[default]
    Unbounded,
    Limited(u32),
}

impl PendingCreationLimit {
    /// Maps a raw console value to a limit; `u32::MAX` means unbounded
    pub fn from_raw(value: u32) -> Self {
        if value == u32::MAX {
            PendingCreationLimit::Unbounded
        } else {
            PendingCreationLimit::Limited(value)
        }
    }

    /// How many more creations may be dispatched while `pending` are outstanding
    pub fn remaining(&self, pending: usize) -> usize {
        match self {
            PendingCreationLimit::Unbounded => usize::MAX,
            PendingCreationLimit::Limited(limit) => (*limit as usize).saturating_sub(pending),
        }
    }
}

/// Replication tunables for one kind of connection.
///
/// The pre-init cap applies while the world is being populated; once gameplay starts
/// the post-init cap takes over.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReplicationConfig {
    /// Entities sent to the peer but not yet acknowledged, before gameplay starts
    pub max_pending_creation: PendingCreationLimit,
    /// Same as `max_pending_creation`, after gameplay has begun
    pub max_pending_creation_post_init: PendingCreationLimit,
    /// How long an entity that left the replication window lingers on the peer.
    /// Entity deletes are still immediate.
    pub pending_removal_delay: Duration,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            max_pending_creation: PendingCreationLimit::Unbounded,
            max_pending_creation_post_init: PendingCreationLimit::Unbounded,
            pending_removal_delay: Duration::from_millis(DEFAULT_PENDING_REMOVAL_MS),
        }
    }
}

impl ReplicationConfig {
    /// Validates raw console/config-file values.
    ///
    /// Negative values are rejected, counts at or above `u32::MAX` are treated as
    /// unbounded, and removal delays above [`MAX_PENDING_REMOVAL_MS`] are rejected.
    pub fn from_raw_values(
        max_pending_creation: i64,
        max_pending_creation_post_init: i64,
        pending_removal_ms: i64,
    ) -> Result<Self, ConfigError> {
        let max_pending_creation = limit_from_raw("max_pending_creation", max_pending_creation)?;
        let max_pending_creation_post_init =
            limit_from_raw("max_pending_creation_post_init", max_pending_creation_post_init)?;

        let pending_removal_ms =
            u64::try_from(pending_removal_ms).map_err(|_| ConfigError::NegativeValue {
                field: "pending_removal_ms",
                value: pending_removal_ms,
            })?;
        if pending_removal_ms > MAX_PENDING_REMOVAL_MS {
            return Err(ConfigError::RemovalDelayTooLarge {
                requested_ms: pending_removal_ms,
                max_ms: MAX_PENDING_REMOVAL_MS,
            });
        }

        Ok(Self {
            max_pending_creation,
            max_pending_creation_post_init,
            pending_removal_delay: Duration::from_millis(pending_removal_ms),
        })
    }
}

fn limit_from_raw(field: &'static str, value: i64) -> Result<PendingCreationLimit, ConfigError> {
    if value < 0 {
        return Err(ConfigError::NegativeValue { field, value });
    }
    if value >= u32::MAX as i64 {
        return Ok(PendingCreationLimit::Unbounded);
    }
    Ok(PendingCreationLimit::Limited(value as u32))
}

/// Process-wide, runtime-tunable replication settings.
///
/// Cloning the handle shares the underlying values. Readers take a whole-struct
/// [`snapshot`](LiveReplicationConfig::snapshot), so within one update they observe
/// either the old or the new settings, never a mix.
#[derive(Clone, Default)]
pub struct LiveReplicationConfig {
    inner: Arc<RwLock<ReplicationConfig>>,
}

impl LiveReplicationConfig {
    pub fn new(config: ReplicationConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    pub fn snapshot(&self) -> ReplicationConfig {
        match self.inner.read() {
            Ok(config) => *config,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    pub fn set(&self, config: ReplicationConfig) {
        self.update(|current| *current = config);
    }

    pub fn update<F: FnOnce(&mut ReplicationConfig)>(&self, mutate: F) {
        match self.inner.write() {
            Ok(mut config) => mutate(&mut *config),
            Err(poisoned) => mutate(&mut *poisoned.into_inner()),
        }
    }

    pub fn set_max_pending_creation(&self, limit: PendingCreationLimit) {
        self.update(|config| config.max_pending_creation = limit);
    }

    pub fn set_max_pending_creation_post_init(&self, limit: PendingCreationLimit) {
        self.update(|config| config.max_pending_creation_post_init = limit);
    }

    pub fn set_pending_removal_delay(&self, delay: Duration) {
        self.update(|config| config.pending_removal_delay = delay);
    }
}
