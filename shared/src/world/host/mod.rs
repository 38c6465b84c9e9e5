pub mod entity_replication_manager;
pub mod error;
pub mod flow_control;
pub mod replication_record;
