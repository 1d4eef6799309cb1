//! DRS plan generation.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::core::cluster_state::ClusterState;
use crate::core::common::{AllocationVerdict, HostId, VmId};
use crate::core::config::drs_config::validate_iterations;
use crate::core::config::DrsConfig;
use crate::core::cost_benefit::MigrationMetrics;
use crate::core::drs_algorithm::DrsAlgorithm;
use crate::core::plan::{ClusterDrsPlan, PlannedMigration};
use crate::error::{CapacityError, DrsError};
use crate::storage::affinity_planner::StorageAffinityPlanner;
use crate::storage::mapping::VolumeToPoolMapping;
use crate::storage::overlay::StorageOverlay;

/// Returns the maximum number of migrations in a plan: `max(1, floor(fraction * workload_count))`,
/// never more than the number of workloads.
pub fn iteration_budget(iterations: f64, workload_count: usize) -> usize {
    let budget = (iterations * workload_count as f64).floor() as usize;
    budget.min(workload_count).max(1)
}

struct Candidate {
    vm_id: VmId,
    source_host: HostId,
    destination_host: HostId,
    metrics: MigrationMetrics,
}

/// Greedy balancing loop over a single cluster.
///
/// Every iteration scores all (workload, destination host) pairs and applies the best one to the working copy of
/// the cluster state. When a storage planner is attached, a candidate is accepted only if storage of the workload
/// can be placed for the destination host, otherwise the next best candidate is tried. Volume moves of accepted
/// migrations are kept in a storage overlay, so later candidates see the planned pool usage.
pub struct DrsPlanGenerator<'a> {
    algorithm: &'a dyn DrsAlgorithm,
    config: &'a DrsConfig,
    storage_planner: Option<&'a StorageAffinityPlanner>,
}

impl<'a> DrsPlanGenerator<'a> {
    pub fn new(algorithm: &'a dyn DrsAlgorithm, config: &'a DrsConfig) -> Self {
        Self {
            algorithm,
            config,
            storage_planner: None,
        }
    }

    pub fn with_storage_planner(mut self, planner: &'a StorageAffinityPlanner) -> Self {
        self.storage_planner = Some(planner);
        self
    }

    /// Generates plan for the cluster. The baseline state is not modified.
    ///
    /// `iterations` overrides the configured iterations fraction.
    pub fn generate(&self, baseline: &ClusterState, iterations: Option<f64>) -> Result<ClusterDrsPlan, DrsError> {
        let iterations = match iterations {
            Some(value) => validate_iterations(value)?,
            None => self.config.iterations,
        };
        let mut plan = ClusterDrsPlan::new(baseline.cluster_id(), self.algorithm.name());

        if !self.algorithm.needs_drs(baseline, self.config) {
            log::info!("cluster {} does not need DRS", baseline.cluster_id());
            return Ok(plan);
        }

        let mut state = baseline.clone();
        let mut storage = StorageOverlay::new();
        let budget = iteration_budget(iterations, state.workload_count());
        log::debug!(
            "cluster {}: generating {} plan with up to {} migrations",
            state.cluster_id(),
            self.algorithm.name(),
            budget
        );

        for iteration in 0..budget {
            if iteration > 0 && !self.algorithm.needs_drs(&state, self.config) {
                log::debug!("cluster {} is balanced after {} migrations", state.cluster_id(), iteration);
                break;
            }
            let migration = match self.best_migration(&state, &storage) {
                Ok(Some(migration)) => migration,
                Ok(None) => {
                    log::debug!("cluster {}: no migration improves the cluster", state.cluster_id());
                    break;
                }
                Err(DrsError::Capacity(e)) => {
                    log::info!("stopping plan generation early: {}", e);
                    break;
                }
                Err(e) => return Err(e),
            };
            log::info!(
                "cluster {}: plan migration of vm {} from host {} to host {} (improvement {:.4}, cost {:.1}, benefit {:.1})",
                state.cluster_id(),
                migration.vm_id,
                migration.source_host,
                migration.destination_host,
                migration.improvement,
                migration.cost_estimate,
                migration.benefit_estimate
            );
            if let Some(planner) = self.storage_planner {
                planner.apply_mapping(migration.vm_id, &migration.storage_mapping, &mut storage)?;
            }
            state.migrate(migration.vm_id, migration.destination_host);
            plan.migrations.push(migration);
        }

        Ok(plan)
    }

    /// Selects the migration with the greatest positive improvement.
    ///
    /// Candidates are enumerated by source host, then by workload, then by destination host, ties keep this order.
    fn best_migration(
        &self,
        state: &ClusterState,
        storage: &StorageOverlay,
    ) -> Result<Option<PlannedMigration>, DrsError> {
        let mut candidates = Vec::new();
        let mut has_capacity = false;

        for workload in state.workloads() {
            if !workload.migratable {
                continue;
            }
            let req = workload.requirement();
            for host_id in state.get_hosts_list() {
                if host_id == workload.host_id {
                    continue;
                }
                let verdict = state.can_allocate(&req, host_id);
                if verdict != AllocationVerdict::Success {
                    log::trace!("vm {} does not fit host {}: {:?}", workload.id, host_id, verdict);
                    continue;
                }
                has_capacity = true;

                let metrics = self.algorithm.get_metrics(state, workload.id, host_id, self.config);
                log::trace!(
                    "vm {} -> host {}: improvement {:.4}, cost {:.1}, benefit {:.1}",
                    workload.id,
                    host_id,
                    metrics.improvement,
                    metrics.cost,
                    metrics.benefit
                );
                if metrics.improvement > 0. {
                    candidates.push(Candidate {
                        vm_id: workload.id,
                        source_host: workload.host_id,
                        destination_host: host_id,
                        metrics,
                    });
                }
            }
        }

        if !has_capacity {
            return Err(CapacityError::NoSuitableHost {
                cluster_id: state.cluster_id(),
            }
            .into());
        }

        // stable sort keeps enumeration order for equal improvements
        candidates.sort_by(|a, b| {
            b.metrics
                .improvement
                .partial_cmp(&a.metrics.improvement)
                .unwrap_or(Ordering::Equal)
        });

        for candidate in candidates {
            let storage_mapping = match self.storage_mapping(state, storage, &candidate) {
                Ok(mapping) => mapping,
                Err(DrsError::Placement(e)) => {
                    log::warn!(
                        "skipping migration of vm {} to host {} in cluster {}: {}",
                        candidate.vm_id,
                        candidate.destination_host,
                        state.cluster_id(),
                        e
                    );
                    continue;
                }
                Err(e) => return Err(e),
            };
            return Ok(Some(PlannedMigration {
                vm_id: candidate.vm_id,
                source_host: candidate.source_host,
                destination_host: candidate.destination_host,
                cost_estimate: candidate.metrics.cost,
                benefit_estimate: candidate.metrics.benefit,
                improvement: candidate.metrics.improvement,
                storage_mapping,
            }));
        }
        Ok(None)
    }

    fn storage_mapping(
        &self,
        state: &ClusterState,
        storage: &StorageOverlay,
        candidate: &Candidate,
    ) -> Result<VolumeToPoolMapping, DrsError> {
        let planner = match self.storage_planner {
            Some(planner) => planner,
            None => return Ok(VolumeToPoolMapping::new()),
        };
        let (workload, source, destination) = match (
            state.get_workload(candidate.vm_id),
            state.get_host(candidate.source_host),
            state.get_host(candidate.destination_host),
        ) {
            (Some(workload), Some(source), Some(destination)) => (workload, source, destination),
            _ => return Ok(VolumeToPoolMapping::new()),
        };
        planner.create_mapping_with(workload, &source.host, &destination.host, &BTreeMap::new(), storage)
    }
}
