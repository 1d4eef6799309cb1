//! Storage pool allocators.

use std::sync::Arc;

use crate::core::config::ConfigValue;
use crate::core::model::{PoolStatus, StoragePool};
use crate::error::{ConfigurationError, DrsError};
use crate::storage::allocators::cluster_scope::ClusterScopeAllocator;
use crate::storage::allocators::local_storage::LocalStorageAllocator;
use crate::storage::allocators::random::RandomAllocator;
use crate::storage::allocators::zone_wide::ZoneWideAllocator;
use crate::storage::profile::{DeploymentPlan, DiskProfile, ExcludeList, VmProfile};
use crate::storage::repository::PoolRepository;
use crate::storage::tags::matches;

/// Passed as `max_results` to get all suitable pools.
pub const RETURN_UPTO_ALL: usize = usize::MAX;

/// Trait for implementation of storage pool allocators.
///
/// The allocator is defined as a function of disk and VM requirements, a deployment plan scoped to the target
/// location and a list of pools to avoid, which returns suitable pools in preference order. An empty result means
/// the allocator can't serve the request and the next allocator in the chain is consulted.
///
/// Allocators must not have side effects, they can be called repeatedly with the same arguments.
/// Errors of the underlying repository are returned as is.
pub trait StoragePoolAllocator: Send + Sync {
    fn name(&self) -> &str;

    fn allocate_candidates(
        &self,
        disk: &DiskProfile,
        vm: &VmProfile,
        plan: &DeploymentPlan,
        avoid: &ExcludeList,
        max_results: usize,
    ) -> Result<Vec<StoragePool>, DrsError>;
}

/// Checks pool properties shared by all allocators: status, avoid list, tags and free capacity.
pub fn pool_is_suitable(pool: &StoragePool, disk: &DiskProfile, avoid: &ExcludeList) -> bool {
    if pool.status != PoolStatus::Up {
        log::trace!("pool {} is skipped as it is {:?}", pool.id, pool.status);
        return false;
    }
    if avoid.should_avoid(pool.id) {
        return false;
    }
    if !matches(&disk.tags, &pool.tags) {
        log::trace!("pool {} does not have tags {:?}", pool.id, disk.tags);
        return false;
    }
    if pool.free_capacity() < disk.size {
        log::trace!(
            "pool {} has {} bytes free, volume {} needs {}",
            pool.id,
            pool.free_capacity(),
            disk.volume_id,
            disk.size
        );
        return false;
    }
    true
}

/// Resolves allocator by its config name, e.g. `ClusterScope` or `Random[seed=7]`. Names are case-insensitive.
pub fn storage_allocator_resolver(
    config_str: &str,
    pools: Arc<dyn PoolRepository>,
) -> Result<Box<dyn StoragePoolAllocator>, ConfigurationError> {
    let value = ConfigValue::parse(config_str);
    match value.name().to_lowercase().as_str() {
        "localstorage" => Ok(Box::new(LocalStorageAllocator::new(pools))),
        "clusterscope" => Ok(Box::new(ClusterScopeAllocator::new(pools))),
        "zonewide" => Ok(Box::new(ZoneWideAllocator::new(pools))),
        "random" => Ok(Box::new(RandomAllocator::new(pools, value.get("seed")?.unwrap_or(0)))),
        _ => Err(ConfigurationError::UnknownAllocator(config_str.to_string())),
    }
}

/// Resolves the whole allocator chain preserving its order.
pub fn storage_allocator_chain(
    names: &[String],
    pools: Arc<dyn PoolRepository>,
) -> Result<Vec<Box<dyn StoragePoolAllocator>>, ConfigurationError> {
    names
        .iter()
        .map(|name| storage_allocator_resolver(name, pools.clone()))
        .collect()
}
