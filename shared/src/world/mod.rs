pub mod entity;
pub mod host;
pub mod replication_config;
pub mod replication_window;
