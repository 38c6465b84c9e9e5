mod client_to_server_connection_data;
pub use client_to_server_connection_data::ClientToServerConnectionData;
