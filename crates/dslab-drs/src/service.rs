//! Entry point for DRS plan generation requests.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use threadpool::ThreadPool;

use crate::core::cluster_state::ClusterState;
use crate::core::common::ClusterId;
use crate::core::config::DrsConfigStore;
use crate::core::drs_algorithm::drs_algorithm_resolver;
use crate::core::plan::ClusterDrsPlan;
use crate::core::plan_generator::DrsPlanGenerator;
use crate::core::provider::ResourceSnapshotProvider;
use crate::error::{ConfigurationError, DrsError};
use crate::storage::affinity_planner::StorageAffinityPlanner;
use crate::storage::allocator::storage_allocator_chain;
use crate::storage::repository::{PoolRepository, VolumeRepository};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerateDrsPlanRequest {
    pub cluster_id: ClusterId,
    /// Overrides the configured iterations fraction.
    pub iterations: Option<f64>,
    /// If false, the plan is returned without ID and is not stored.
    pub save_plan: bool,
}

impl GenerateDrsPlanRequest {
    pub fn new(cluster_id: ClusterId) -> Self {
        Self {
            cluster_id,
            iterations: None,
            save_plan: true,
        }
    }
}

/// Persistence of generated plans.
pub trait DrsPlanStore: Send + Sync {
    fn save(&self, plan: &ClusterDrsPlan);

    /// Returns plans of the cluster in the order they were saved.
    fn list_by_cluster(&self, cluster_id: ClusterId) -> Vec<ClusterDrsPlan>;
}

#[derive(Default)]
pub struct InMemoryPlanStore {
    plans: Mutex<Vec<ClusterDrsPlan>>,
}

impl InMemoryPlanStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DrsPlanStore for InMemoryPlanStore {
    fn save(&self, plan: &ClusterDrsPlan) {
        lock(&self.plans).push(plan.clone());
    }

    fn list_by_cluster(&self, cluster_id: ClusterId) -> Vec<ClusterDrsPlan> {
        lock(&self.plans)
            .iter()
            .filter(|p| p.cluster_id == cluster_id)
            .cloned()
            .collect()
    }
}

/// Marks the cluster as being processed until dropped.
struct GenerationGuard<'a> {
    in_progress: &'a Mutex<BTreeSet<ClusterId>>,
    cluster_id: ClusterId,
}

impl<'a> GenerationGuard<'a> {
    fn acquire(in_progress: &'a Mutex<BTreeSet<ClusterId>>, cluster_id: ClusterId) -> Result<Self, DrsError> {
        if !lock(in_progress).insert(cluster_id) {
            log::warn!("rejecting DRS request for cluster {}: generation is in progress", cluster_id);
            return Err(DrsError::GenerationInProgress(cluster_id));
        }
        Ok(Self {
            in_progress,
            cluster_id,
        })
    }
}

impl Drop for GenerationGuard<'_> {
    fn drop(&mut self) {
        lock(self.in_progress).remove(&self.cluster_id);
    }
}

/// Generates DRS plans for clusters.
///
/// Requests for the same cluster are serialized: a request arriving while another one for the same cluster is
/// processed is rejected with [`DrsError::GenerationInProgress`]. Different clusters are processed independently.
pub struct ClusterDrsService {
    provider: Arc<dyn ResourceSnapshotProvider>,
    configs: DrsConfigStore,
    storage_planner: Option<StorageAffinityPlanner>,
    plan_store: Arc<dyn DrsPlanStore>,
    in_progress: Mutex<BTreeSet<ClusterId>>,
}

impl ClusterDrsService {
    pub fn new(
        provider: Arc<dyn ResourceSnapshotProvider>,
        configs: DrsConfigStore,
        plan_store: Arc<dyn DrsPlanStore>,
    ) -> Self {
        Self {
            provider,
            configs,
            storage_planner: None,
            plan_store,
            in_progress: Mutex::new(BTreeSet::new()),
        }
    }

    pub fn with_storage_planner(mut self, planner: StorageAffinityPlanner) -> Self {
        self.storage_planner = Some(planner);
        self
    }

    /// Attaches storage planner with the allocator chain from the configuration.
    pub fn with_storage(
        self,
        pools: Arc<dyn PoolRepository>,
        volumes: Arc<dyn VolumeRepository>,
    ) -> Result<Self, ConfigurationError> {
        let allocators = storage_allocator_chain(self.configs.storage_allocators(), pools.clone())?;
        let planner = StorageAffinityPlanner::new(pools, volumes, allocators);
        Ok(self.with_storage_planner(planner))
    }

    pub fn storage_planner(&self) -> Option<&StorageAffinityPlanner> {
        self.storage_planner.as_ref()
    }

    pub fn generate_drs_plan(&self, request: &GenerateDrsPlanRequest) -> Result<ClusterDrsPlan, DrsError> {
        let cluster_id = request.cluster_id;
        let _guard = GenerationGuard::acquire(&self.in_progress, cluster_id)?;

        let config = self.configs.resolve(cluster_id)?;
        let algorithm = drs_algorithm_resolver(&config.algorithm)?;
        let state = ClusterState::fetch(self.provider.as_ref(), cluster_id)?;

        let mut generator = DrsPlanGenerator::new(algorithm.as_ref(), &config);
        if let Some(planner) = &self.storage_planner {
            generator = generator.with_storage_planner(planner);
        }
        let mut plan = generator.generate(&state, request.iterations)?;
        log::info!(
            "generated {} plan for cluster {} with {} migrations",
            plan.algorithm,
            cluster_id,
            plan.len()
        );

        if request.save_plan {
            self.plan_store.save(&plan);
        } else {
            plan.clear_id();
        }
        Ok(plan)
    }

    pub fn list_drs_plans(&self, cluster_id: ClusterId) -> Vec<ClusterDrsPlan> {
        self.plan_store.list_by_cluster(cluster_id)
    }

    /// Processes requests in parallel, results are returned in the order of requests.
    pub fn generate_drs_plans(
        self: &Arc<Self>,
        requests: Vec<GenerateDrsPlanRequest>,
        num_threads: usize,
    ) -> Vec<(ClusterId, Result<ClusterDrsPlan, DrsError>)> {
        let total = requests.len();
        let finished = Arc::new(AtomicUsize::new(0));
        let results = Arc::new(Mutex::new(Vec::with_capacity(total)));

        let pool = ThreadPool::new(num_threads.max(1));
        let start_time = Instant::now();
        for (idx, request) in requests.into_iter().enumerate() {
            let service = self.clone();
            let finished = finished.clone();
            let results = results.clone();
            pool.execute(move || {
                let result = service.generate_drs_plan(&request);
                if let Err(e) = &result {
                    log::warn!("DRS plan generation for cluster {} failed: {}", request.cluster_id, e);
                }
                lock(&results).push((idx, request.cluster_id, result));
                let done = finished.fetch_add(1, Ordering::SeqCst) + 1;
                log::debug!("finished {}/{} DRS requests in {:.2?}", done, total, start_time.elapsed());
            });
        }
        pool.join();

        let mut results = std::mem::take(&mut *lock(&results));
        results.sort_by_key(|(idx, _, _)| *idx);
        results
            .into_iter()
            .map(|(_, cluster_id, result)| (cluster_id, result))
            .collect()
    }
}
