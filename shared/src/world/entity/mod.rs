pub mod global_entity;
pub mod net_bind;
