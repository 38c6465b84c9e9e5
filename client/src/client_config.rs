use std::default::Default;

use keystone_shared::LiveReplicationConfig;

/// Contains Config properties which will be used by a Client
#[derive(Clone)]
pub struct ClientConfig {
    /// Live-tunable settings for entities the client replicates to the server
    pub replication: LiveReplicationConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            replication: LiveReplicationConfig::default(),
        }
    }
}
