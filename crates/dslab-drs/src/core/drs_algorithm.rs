//! DRS algorithms.

use crate::core::cluster_state::ClusterState;
use crate::core::common::{HostId, VmId};
use crate::core::config::{ConfigValue, DrsConfig};
use crate::core::cost_benefit::MigrationMetrics;
use crate::core::drs_algorithms::balanced::Balanced;
use crate::core::drs_algorithms::condensed::Condensed;
use crate::error::ConfigurationError;

/// Trait for implementation of DRS algorithms.
///
/// The algorithm decides whether the cluster needs DRS at all and scores every candidate migration, the plan
/// generator picks the candidate with the greatest improvement. Both functions must apply the same metric rule from
/// the passed config, otherwise generated plans may oscillate.
pub trait DrsAlgorithm: Send + Sync {
    fn name(&self) -> &str;

    fn needs_drs(&self, state: &ClusterState, config: &DrsConfig) -> bool;

    fn get_metrics(&self, state: &ClusterState, vm_id: VmId, destination: HostId, config: &DrsConfig) -> MigrationMetrics;
}

/// Resolves algorithm by its config name (`drs.algorithm`).
pub fn drs_algorithm_resolver(config_str: &str) -> Result<Box<dyn DrsAlgorithm>, ConfigurationError> {
    let value = ConfigValue::parse(config_str);
    match value.name().to_lowercase().as_str() {
        "balanced" => Ok(Box::new(Balanced::new())),
        "condensed" => Ok(Box::new(Condensed::new())),
        _ => Err(ConfigurationError::UnknownAlgorithm(config_str.to_string())),
    }
}
