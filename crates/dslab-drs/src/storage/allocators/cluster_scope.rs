//! Cluster-wide storage allocator.

use std::sync::Arc;

use crate::core::model::{StoragePool, StorageScope};
use crate::error::DrsError;
use crate::storage::allocator::{pool_is_suitable, StoragePoolAllocator};
use crate::storage::profile::{DeploymentPlan, DiskProfile, ExcludeList, VmProfile};
use crate::storage::repository::PoolRepository;

/// Returns shared pools of the plan's cluster, preferring pools with more free capacity.
pub struct ClusterScopeAllocator {
    pools: Arc<dyn PoolRepository>,
}

impl ClusterScopeAllocator {
    pub fn new(pools: Arc<dyn PoolRepository>) -> Self {
        Self { pools }
    }
}

impl StoragePoolAllocator for ClusterScopeAllocator {
    fn name(&self) -> &str {
        "ClusterScope"
    }

    fn allocate_candidates(
        &self,
        disk: &DiskProfile,
        _vm: &VmProfile,
        plan: &DeploymentPlan,
        avoid: &ExcludeList,
        max_results: usize,
    ) -> Result<Vec<StoragePool>, DrsError> {
        if disk.use_local_storage {
            return Ok(Vec::new());
        }
        let mut pools: Vec<StoragePool> = self
            .pools
            .list_pools()?
            .into_iter()
            .filter(|pool| {
                pool.scope == StorageScope::Cluster
                    && pool.cluster_id == Some(plan.cluster_id)
                    && pool.zone_id == plan.zone_id
            })
            .filter(|pool| pool_is_suitable(pool, disk, avoid))
            .collect();
        // stable, pools with equal free capacity keep ID order
        pools.sort_by(|a, b| b.free_capacity().cmp(&a.free_capacity()));
        pools.truncate(max_results);
        Ok(pools)
    }
}
