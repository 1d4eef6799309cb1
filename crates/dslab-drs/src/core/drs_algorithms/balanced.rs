//! Balanced algorithm.

use crate::core::cluster_state::ClusterState;
use crate::core::common::{HostId, VmId};
use crate::core::config::DrsConfig;
use crate::core::cost_benefit::{ImbalanceGoal, MigrationCostBenefitEstimator, MigrationMetrics};
use crate::core::drs_algorithm::DrsAlgorithm;
use crate::core::imbalance::ImbalanceEvaluator;

/// Spreads workloads evenly across the cluster hosts.
///
/// The cluster needs DRS when its imbalance exceeds the threshold, migrations are ranked by imbalance reduction.
pub struct Balanced;

impl Balanced {
    pub fn new() -> Self {
        Self {}
    }
}

impl Default for Balanced {
    fn default() -> Self {
        Self::new()
    }
}

impl DrsAlgorithm for Balanced {
    fn name(&self) -> &str {
        "balanced"
    }

    fn needs_drs(&self, state: &ClusterState, config: &DrsConfig) -> bool {
        ImbalanceEvaluator::new(config.metric, config.threshold).needs_drs(state)
    }

    fn get_metrics(&self, state: &ClusterState, vm_id: VmId, destination: HostId, config: &DrsConfig) -> MigrationMetrics {
        MigrationCostBenefitEstimator::new(config.metric, ImbalanceGoal::Decrease).estimate(state, vm_id, destination)
    }
}
