use keystone_shared::MigrationToken;

/// Generates a fresh single-use migration token. Zero is never issued.
pub fn generate_migration_token() -> MigrationToken {
    MigrationToken::from_u64(fastrand::u64(1..))
}
