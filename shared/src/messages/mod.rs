pub mod migration_token;
pub mod packet;
