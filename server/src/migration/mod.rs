mod migration_token;
pub use migration_token::generate_migration_token;

mod outgoing_migration;
pub use outgoing_migration::OutgoingMigration;

mod pending_migrations;
pub use pending_migrations::{AcceptedMigration, PendingMigration, PendingMigrations};
