mod server_config;
pub use server_config::{MigrationConfig, ServerConfig};

mod connection_data_map;
pub use connection_data_map::ConnectionDataMap;
