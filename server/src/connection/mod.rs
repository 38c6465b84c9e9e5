mod server_to_client_connection_data;
pub use server_to_client_connection_data::{ConnectionState, ServerToClientConnectionData};
