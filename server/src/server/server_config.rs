use std::{default::Default, time::Duration};

use keystone_shared::LiveReplicationConfig;

/// Contains Config properties which will be used by the Server
#[derive(Clone)]
pub struct ServerConfig {
    /// Live-tunable replication settings, shared by every client connection. Changes
    /// take effect on each connection's next update.
    pub replication: LiveReplicationConfig,
    /// Timeouts used when handing a controlled entity to another host
    pub migration: MigrationConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            replication: LiveReplicationConfig::default(),
            migration: MigrationConfig::default(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MigrationConfig {
    /// How long the source host waits for the destination to confirm a handoff before
    /// disconnecting the client
    pub negotiation_timeout: Duration,
    /// How long the destination host keeps a slot open for a redirected client
    pub reconnect_timeout: Duration,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            negotiation_timeout: Duration::from_secs(10),
            reconnect_timeout: Duration::from_secs(10),
        }
    }
}
