//! # Keystone Client
//! The client's side of a replication connection: acknowledges entities the server
//! creates, replicates client-owned entities back to the server, and follows migration
//! redirects to a new host.

#![deny(
    trivial_casts,
    trivial_numeric_casts,
    unstable_features,
    unused_import_braces
)]

mod client_config;
mod connection;
mod migration_redirect;

pub use client_config::ClientConfig;
pub use connection::ClientToServerConnectionData;
pub use migration_redirect::MigrationRedirect;
