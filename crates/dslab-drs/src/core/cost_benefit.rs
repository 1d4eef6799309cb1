//! Cost and benefit estimation of a single migration.

use serde::Serialize;

use crate::core::cluster_state::ClusterState;
use crate::core::common::{HostId, VmId};
use crate::core::imbalance::{ClusterImbalance, DrsMetric};

/// Estimated effect of moving a workload to another host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MigrationMetrics {
    /// Value used to rank candidate migrations, positive means the migration is worth doing.
    pub improvement: f64,
    /// Memory committed by the workload (MB), a proxy for migration overhead.
    pub cost: f64,
    /// Imbalance change scaled by the destination host memory, comparable to cost.
    pub benefit: f64,
}

/// Direction in which a migration should move the cluster imbalance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImbalanceGoal {
    /// Spread the load, imbalance should decrease.
    Decrease,
    /// Consolidate the load, imbalance should increase.
    Increase,
}

pub struct MigrationCostBenefitEstimator {
    metric: DrsMetric,
    goal: ImbalanceGoal,
}

impl MigrationCostBenefitEstimator {
    pub fn new(metric: DrsMetric, goal: ImbalanceGoal) -> Self {
        Self { metric, goal }
    }

    /// Estimates moving the workload to the destination host.
    ///
    /// Unknown workload or host, as well as a move to the current host, result in zero metrics.
    pub fn estimate(&self, state: &ClusterState, vm_id: VmId, destination: HostId) -> MigrationMetrics {
        let workload = match state.get_workload(vm_id) {
            Some(workload) if workload.host_id != destination => workload,
            _ => return MigrationMetrics::default(),
        };
        let destination_host = match state.get_host(destination) {
            Some(host) => host,
            None => return MigrationMetrics::default(),
        };
        let (cpu_after, memory_after) = match state.used_lists_after_migration(vm_id, destination) {
            Some(lists) => lists,
            None => return MigrationMetrics::default(),
        };

        let pre = ClusterImbalance::of(state).score(self.metric);
        let post = ClusterImbalance::from_lists(&cpu_after, &memory_after).score(self.metric);
        let delta = match self.goal {
            ImbalanceGoal::Decrease => pre - post,
            ImbalanceGoal::Increase => post - pre,
        };

        let cost = workload.offering.memory as f64;
        let benefit = delta * destination_host.host.memory_total as f64;
        let improvement = if self.metric.is_combined() { benefit - cost } else { delta };

        MigrationMetrics {
            improvement,
            cost,
            benefit,
        }
    }
}
