pub mod cluster_scope;
pub mod local_storage;
pub mod random;
pub mod zone_wide;
