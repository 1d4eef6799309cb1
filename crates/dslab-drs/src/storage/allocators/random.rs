//! Random storage allocator.

use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_pcg::Pcg64;

use crate::core::model::{StoragePool, StorageScope};
use crate::error::DrsError;
use crate::storage::allocator::{pool_is_suitable, StoragePoolAllocator};
use crate::storage::profile::{DeploymentPlan, DiskProfile, ExcludeList, VmProfile};
use crate::storage::repository::PoolRepository;

/// Returns all pools reachable from the plan's location in random order.
///
/// The order depends only on the seed and the volume, so repeated calls return the same result.
pub struct RandomAllocator {
    pools: Arc<dyn PoolRepository>,
    seed: u64,
}

impl RandomAllocator {
    pub fn new(pools: Arc<dyn PoolRepository>, seed: u64) -> Self {
        Self { pools, seed }
    }
}

impl StoragePoolAllocator for RandomAllocator {
    fn name(&self) -> &str {
        "Random"
    }

    fn allocate_candidates(
        &self,
        disk: &DiskProfile,
        _vm: &VmProfile,
        plan: &DeploymentPlan,
        avoid: &ExcludeList,
        max_results: usize,
    ) -> Result<Vec<StoragePool>, DrsError> {
        let mut pools: Vec<StoragePool> = self
            .pools
            .list_pools()?
            .into_iter()
            .filter(|pool| match pool.scope {
                StorageScope::Host => disk.use_local_storage && pool.host_id == Some(plan.host_id),
                StorageScope::Cluster => !disk.use_local_storage && pool.cluster_id == Some(plan.cluster_id),
                StorageScope::Zone => !disk.use_local_storage && pool.zone_id == plan.zone_id,
            })
            .filter(|pool| pool_is_suitable(pool, disk, avoid))
            .collect();
        let mut rng = Pcg64::seed_from_u64(self.seed ^ disk.volume_id as u64);
        pools.shuffle(&mut rng);
        pools.truncate(max_results);
        Ok(pools)
    }
}
