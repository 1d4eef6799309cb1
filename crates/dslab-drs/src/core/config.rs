//! DRS configuration.

pub mod drs_config;
pub mod options;

pub use drs_config::{DrsConfig, DrsConfigStore, DrsSettings};
pub use options::ConfigValue;
