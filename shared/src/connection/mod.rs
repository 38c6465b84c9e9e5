pub mod connection;
pub mod connection_data;
pub mod error;
