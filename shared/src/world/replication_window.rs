use std::collections::BTreeSet;

use crate::{GameInstant, GlobalEntity};

/// Interest-management capability: which entities are relevant to one remote peer, and
/// what to put on the wire for them.
///
/// Relevance computation and state encoding both live outside the replication layer; the
/// manager only asks for the current set and for opaque state payloads.
pub trait ReplicationWindow: Send {
    /// Entities currently relevant to the remote peer
    fn replication_set(&self) -> BTreeSet<GlobalEntity>;

    /// Encoded state for `entity`.
    ///
    /// `since` is `None` for a creation (full state) and otherwise the time of the last
    /// update sent to this peer. Returns `None` when there is nothing new to send.
    fn entity_state(&self, entity: &GlobalEntity, since: Option<GameInstant>) -> Option<Vec<u8>>;

    /// Whether `entity` still exists in the simulation. Destroyed entities are removed
    /// from the peer immediately instead of after the pending-removal delay.
    fn is_entity_alive(&self, _entity: &GlobalEntity) -> bool {
        true
    }
}
