//! # Keystone Server
//! Binds each client connection to its own entity replication manager, tears the
//! connection down when the client's controlled entity stops, and hands authority over
//! a controlled entity to another host when the simulation migrates it.

#![deny(
    trivial_casts,
    trivial_numeric_casts,
    unstable_features,
    unused_import_braces
)]

mod connection;
mod error;
mod host_network;
mod migration;
mod server;

pub use connection::{ConnectionState, ServerToClientConnectionData};
pub use error::MigrationError;
pub use host_network::HostNetwork;
pub use migration::{
    generate_migration_token, AcceptedMigration, OutgoingMigration, PendingMigration,
    PendingMigrations,
};
pub use server::{ConnectionDataMap, MigrationConfig, ServerConfig};
