//! Condensed algorithm.

use crate::core::cluster_state::ClusterState;
use crate::core::common::{HostId, VmId};
use crate::core::config::DrsConfig;
use crate::core::cost_benefit::{ImbalanceGoal, MigrationCostBenefitEstimator, MigrationMetrics};
use crate::core::drs_algorithm::DrsAlgorithm;
use crate::core::imbalance::ClusterImbalance;

/// Packs workloads onto fewer hosts so that idle hosts can be powered off.
///
/// The cluster needs DRS while its imbalance stays below the threshold, migrations are ranked by imbalance increase.
pub struct Condensed;

impl Condensed {
    pub fn new() -> Self {
        Self {}
    }
}

impl Default for Condensed {
    fn default() -> Self {
        Self::new()
    }
}

impl DrsAlgorithm for Condensed {
    fn name(&self) -> &str {
        "condensed"
    }

    fn needs_drs(&self, state: &ClusterState, config: &DrsConfig) -> bool {
        let imbalance = ClusterImbalance::of(state);
        let result = imbalance.below(config.metric, config.threshold);
        log::debug!(
            "cluster {}: cpu imbalance {:.4}, memory imbalance {:.4} -> needs condensing: {}",
            state.cluster_id(),
            imbalance.cpu,
            imbalance.memory,
            result
        );
        result
    }

    fn get_metrics(&self, state: &ClusterState, vm_id: VmId, destination: HostId, config: &DrsConfig) -> MigrationMetrics {
        MigrationCostBenefitEstimator::new(config.metric, ImbalanceGoal::Increase).estimate(state, vm_id, destination)
    }
}
