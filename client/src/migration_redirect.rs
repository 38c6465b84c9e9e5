use std::net::SocketAddr;

use keystone_shared::{GameInstant, MigrationToken};

/// Where the server told this client to reconnect after migrating its controlled entity.
///
/// The client presents `token` to the host at `destination`. Locally predicted state newer
/// than `snapshot` was never seen by the old host and must be reconciled with the new one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MigrationRedirect {
    pub token: MigrationToken,
    pub destination: SocketAddr,
    pub snapshot: GameInstant,
}

impl MigrationRedirect {
    pub fn is_newer_than_snapshot(&self, instant: &GameInstant) -> bool {
        instant.is_after(&self.snapshot)
    }
}
