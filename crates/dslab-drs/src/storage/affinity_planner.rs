//! Storage placement of a migrating VM.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::core::common::{PoolId, VmId, VolumeId};
use crate::core::model::{Host, StoragePool, StorageScope, Volume, VolumeType, Workload};
use crate::error::{DrsError, PlacementError};
use crate::storage::allocator::{pool_is_suitable, StoragePoolAllocator, RETURN_UPTO_ALL};
use crate::storage::mapping::VolumeToPoolMapping;
use crate::storage::overlay::StorageOverlay;
use crate::storage::profile::{DeploymentPlan, DiskProfile, ExcludeList, VmProfile};
use crate::storage::repository::{host_can_access, PoolRepository, VolumeRepository};

fn storage_kind(local: bool) -> &'static str {
    if local {
        "local"
    } else {
        "shared"
    }
}

/// Decides volume to pool mapping for a VM moving to another host.
///
/// The planner combines administrator overrides with the ordered allocator chain:
///
/// 1. every override is validated (the volume must belong to the VM, a volume on a managed pool can't be moved to
///    another pool, the destination host must have access to the requested pool);
/// 2. volumes without an override which are on a managed pool must already be connected to the destination host;
/// 3. volumes on local storage, or on cluster-wide storage of another cluster, get a new pool from the first
///    allocator which returns candidates;
/// 4. all other volumes stay on their current pool and are not included in the mapping.
///
/// Placement failures are returned as [`DrsError::Placement`], repository failures are returned as is.
pub struct StorageAffinityPlanner {
    pools: Arc<dyn PoolRepository>,
    volumes: Arc<dyn VolumeRepository>,
    allocators: Vec<Box<dyn StoragePoolAllocator>>,
}

impl StorageAffinityPlanner {
    pub fn new(
        pools: Arc<dyn PoolRepository>,
        volumes: Arc<dyn VolumeRepository>,
        allocators: Vec<Box<dyn StoragePoolAllocator>>,
    ) -> Self {
        Self {
            pools,
            volumes,
            allocators,
        }
    }

    pub fn allocator_names(&self) -> Vec<&str> {
        self.allocators.iter().map(|a| a.name()).collect()
    }

    /// Builds mapping for moving the VM from `source` to `destination` host.
    ///
    /// The result depends only on the inputs and the repositories state, repeated calls return the same mapping.
    pub fn create_mapping(
        &self,
        vm: &Workload,
        source: &Host,
        destination: &Host,
        overrides: &BTreeMap<VolumeId, PoolId>,
    ) -> Result<VolumeToPoolMapping, DrsError> {
        self.create_mapping_with(vm, source, destination, overrides, &StorageOverlay::new())
    }

    /// Same as [`create_mapping`](Self::create_mapping), with volume locations and pool usage taken after the moves
    /// recorded in `overlay`.
    pub fn create_mapping_with(
        &self,
        vm: &Workload,
        source: &Host,
        destination: &Host,
        overrides: &BTreeMap<VolumeId, PoolId>,
        overlay: &StorageOverlay,
    ) -> Result<VolumeToPoolMapping, DrsError> {
        log::debug!(
            "planning storage of vm {} moving from host {} to host {}",
            vm.id,
            source.id,
            destination.id
        );
        let volumes: Vec<Volume> = self
            .volumes
            .usable_volumes_for_instance(vm.id)?
            .iter()
            .map(|v| overlay.locate(v))
            .collect();
        let mut mapping = self.apply_overrides(vm, &volumes, destination, overrides, overlay)?;

        let unmapped: Vec<&Volume> = volumes.iter().filter(|v| !mapping.contains(v.id)).collect();
        let mut current_pools = Vec::with_capacity(unmapped.len());
        for volume in unmapped {
            let current = self.find_pool(volume.pool_id, overlay)?;
            self.check_managed_connection(volume, &current, destination)?;
            current_pools.push((volume, current));
        }

        for (volume, current) in current_pools {
            if !current.is_local() && !is_cross_cluster(&current, destination) {
                log::trace!("volume {} stays on pool {}", volume.id, current.id);
                continue;
            }
            self.map_if_needed(vm, volume, &current, destination, overlay, &mut mapping)?;
        }

        Ok(mapping)
    }

    /// Records volume moves of an accepted migration in the overlay.
    pub fn apply_mapping(
        &self,
        vm_id: VmId,
        mapping: &VolumeToPoolMapping,
        overlay: &mut StorageOverlay,
    ) -> Result<(), DrsError> {
        for volume in self.volumes.usable_volumes_for_instance(vm_id)? {
            if let Some(target) = mapping.get(volume.id) {
                overlay.move_volume(&volume, target);
            }
        }
        Ok(())
    }

    fn apply_overrides(
        &self,
        vm: &Workload,
        volumes: &[Volume],
        destination: &Host,
        overrides: &BTreeMap<VolumeId, PoolId>,
        overlay: &StorageOverlay,
    ) -> Result<VolumeToPoolMapping, DrsError> {
        let mut mapping = VolumeToPoolMapping::new();
        for (&volume_id, &pool_id) in overrides {
            let volume = volumes
                .iter()
                .find(|v| v.id == volume_id)
                .ok_or(PlacementError::VolumeNotAttached { vm_id: vm.id, volume_id })?;
            let target = self.find_pool(pool_id, overlay)?;
            let current = self.find_pool(volume.pool_id, overlay)?;
            check_managed_target(volume, &current, &target)?;
            if !host_can_access(&target, destination, self.pools.as_ref())? {
                return Err(PlacementError::NoAccessToPool {
                    vm_id: vm.id,
                    volume_id,
                    pool_id,
                    host_id: destination.id,
                }
                .into());
            }
            mapping.insert(volume_id, pool_id);
        }
        Ok(mapping)
    }

    fn map_if_needed(
        &self,
        vm: &Workload,
        volume: &Volume,
        current: &StoragePool,
        destination: &Host,
        overlay: &StorageOverlay,
        mapping: &mut VolumeToPoolMapping,
    ) -> Result<(), DrsError> {
        let candidates = self.candidate_pools(vm, volume, current, destination, overlay)?;
        if candidates.is_empty() {
            return Err(PlacementError::NoCandidatePool {
                vm_id: vm.id,
                volume_id: volume.id,
            }
            .into());
        }
        if candidates.iter().any(|pool| pool.id == current.id) {
            log::debug!("current pool {} of volume {} is a candidate, keeping it", current.id, volume.id);
            return Ok(());
        }
        let target = &candidates[0];
        check_managed_target(volume, current, target)?;
        log::debug!("volume {} is moved from pool {} to pool {}", volume.id, current.id, target.id);
        mapping.insert(volume.id, target.id);
        Ok(())
    }

    /// Returns candidates of the first allocator with non-empty result.
    ///
    /// Candidates are checked once more with the planned pool usage, the current pool of the volume is kept as it
    /// already holds the volume.
    fn candidate_pools(
        &self,
        vm: &Workload,
        volume: &Volume,
        current: &StoragePool,
        destination: &Host,
        overlay: &StorageOverlay,
    ) -> Result<Vec<StoragePool>, DrsError> {
        let disk = DiskProfile::from_volume(volume, current.is_local());
        let vm_profile = VmProfile::from_workload(vm);
        let plan = DeploymentPlan::for_host(destination);
        let avoid = ExcludeList::new();
        for allocator in &self.allocators {
            let pools: Vec<StoragePool> = allocator
                .allocate_candidates(&disk, &vm_profile, &plan, &avoid, RETURN_UPTO_ALL)?
                .into_iter()
                .map(|pool| overlay.adjust(pool))
                .filter(|pool| pool.id == current.id || pool_is_suitable(pool, &disk, &avoid))
                .collect();
            if !pools.is_empty() {
                log::debug!(
                    "allocator {} returned {} pools for volume {}",
                    allocator.name(),
                    pools.len(),
                    volume.id
                );
                return Ok(pools);
            }
            log::debug!("allocator {} returned no pools for volume {}", allocator.name(), volume.id);
        }
        Ok(Vec::new())
    }

    fn check_managed_connection(
        &self,
        volume: &Volume,
        current: &StoragePool,
        destination: &Host,
    ) -> Result<(), DrsError> {
        if current.managed && !self.pools.hosts_connected_to(current.id)?.contains(&destination.id) {
            return Err(PlacementError::ManagedPoolNotConnected {
                volume_id: volume.id,
                pool_id: current.id,
                host_id: destination.id,
            }
            .into());
        }
        Ok(())
    }

    fn find_pool(&self, pool_id: PoolId, overlay: &StorageOverlay) -> Result<StoragePool, DrsError> {
        match self.pools.find_by_id(pool_id)? {
            Some(pool) => Ok(overlay.adjust(pool)),
            None => Err(PlacementError::PoolNotFound { pool_id }.into()),
        }
    }

    fn root_volume(&self, vm_id: VmId) -> Result<Volume, DrsError> {
        self.volumes
            .usable_volumes_for_instance(vm_id)?
            .into_iter()
            .find(|v| v.volume_type == VolumeType::Root)
            .ok_or_else(|| PlacementError::NoRootVolume { vm_id }.into())
    }

    pub fn is_root_volume_on_local_storage(&self, vm_id: VmId) -> Result<bool, DrsError> {
        let root = self.root_volume(vm_id)?;
        Ok(self.find_pool(root.pool_id, &StorageOverlay::new())?.is_local())
    }

    /// Checks that a new service offering keeps the VM on the same kind (local or shared) of storage.
    pub fn check_new_offering_storage_scope(
        &self,
        vm_id: VmId,
        offering_uses_local_storage: bool,
    ) -> Result<(), DrsError> {
        let on_local = self.is_root_volume_on_local_storage(vm_id)?;
        if on_local != offering_uses_local_storage {
            return Err(PlacementError::OfferingScopeMismatch {
                vm_id,
                requested: storage_kind(offering_uses_local_storage),
                current: storage_kind(on_local),
            }
            .into());
        }
        Ok(())
    }
}

fn is_cross_cluster(pool: &StoragePool, destination: &Host) -> bool {
    pool.scope == StorageScope::Cluster && pool.cluster_id != Some(destination.cluster_id)
}

/// A volume on a managed pool can only be "moved" to the same pool.
fn check_managed_target(volume: &Volume, current: &StoragePool, target: &StoragePool) -> Result<(), PlacementError> {
    if current.managed && current.id != target.id {
        return Err(PlacementError::ManagedPoolConflict {
            volume_id: volume.id,
            current_pool_id: current.id,
            target_pool_id: target.id,
        });
    }
    Ok(())
}
