//! Zone-wide storage allocator.

use std::sync::Arc;

use crate::core::model::{StoragePool, StorageScope};
use crate::error::DrsError;
use crate::storage::allocator::{pool_is_suitable, StoragePoolAllocator};
use crate::storage::profile::{DeploymentPlan, DiskProfile, ExcludeList, VmProfile};
use crate::storage::repository::PoolRepository;

/// Returns zone-wide pools of the plan's zone.
pub struct ZoneWideAllocator {
    pools: Arc<dyn PoolRepository>,
}

impl ZoneWideAllocator {
    pub fn new(pools: Arc<dyn PoolRepository>) -> Self {
        Self { pools }
    }
}

impl StoragePoolAllocator for ZoneWideAllocator {
    fn name(&self) -> &str {
        "ZoneWide"
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
        let pools = self
            .pools
            .list_pools()?
            .into_iter()
            .filter(|pool| pool.scope == StorageScope::Zone && pool.zone_id == plan.zone_id)
            .filter(|pool| pool_is_suitable(pool, disk, avoid))
            .take(max_results)
            .collect();
        Ok(pools)
    }
}
