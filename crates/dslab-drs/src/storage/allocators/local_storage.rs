//! Local storage allocator.

use std::sync::Arc;

use crate::core::model::{StoragePool, StorageScope};
use crate::error::DrsError;
use crate::storage::allocator::{pool_is_suitable, StoragePoolAllocator};
use crate::storage::profile::{DeploymentPlan, DiskProfile, ExcludeList, VmProfile};
use crate::storage::repository::PoolRepository;

/// Returns host-local pools of the plan's host, serves only disks which require local storage.
pub struct LocalStorageAllocator {
    pools: Arc<dyn PoolRepository>,
}

impl LocalStorageAllocator {
    pub fn new(pools: Arc<dyn PoolRepository>) -> Self {
        Self { pools }
    }
}

impl StoragePoolAllocator for LocalStorageAllocator {
    fn name(&self) -> &str {
        "LocalStorage"
    }

    fn allocate_candidates(
        &self,
        disk: &DiskProfile,
        _vm: &VmProfile,
        plan: &DeploymentPlan,
        avoid: &ExcludeList,
        max_results: usize,
    ) -> Result<Vec<StoragePool>, DrsError> {
        if !disk.use_local_storage {
            return Ok(Vec::new());
        }
        let pools = self
            .pools
            .list_pools()?
            .into_iter()
            .filter(|pool| pool.scope == StorageScope::Host && pool.host_id == Some(plan.host_id))
            .filter(|pool| pool_is_suitable(pool, disk, avoid))
            .take(max_results)
            .collect();
        Ok(pools)
    }
}
