//! Read access to storage inventory.

use std::collections::BTreeSet;

use crate::core::common::{HostId, PoolId, VmId};
use crate::core::model::{Host, StoragePool, StorageScope, Volume};
use crate::error::DrsError;

/// Calls may block on database access. Errors are not retried here, they abort plan generation.
pub trait PoolRepository: Send + Sync {
    /// Returns `Ok(None)` if the pool does not exist.
    fn find_by_id(&self, pool_id: PoolId) -> Result<Option<StoragePool>, DrsError>;

    /// Hosts with an established connection to the pool (meaningful for managed pools).
    fn hosts_connected_to(&self, pool_id: PoolId) -> Result<BTreeSet<HostId>, DrsError>;

    /// All pools ordered by ID.
    fn list_pools(&self) -> Result<Vec<StoragePool>, DrsError>;
}

pub trait VolumeRepository: Send + Sync {
    /// Volumes currently attached to the VM ordered by ID.
    fn usable_volumes_for_instance(&self, vm_id: VmId) -> Result<Vec<Volume>, DrsError>;
}

/// Checks whether the host can use the pool.
///
/// Managed pools require an explicit connection, for other pools access follows from the pool scope.
pub fn host_can_access(pool: &StoragePool, host: &Host, pools: &dyn PoolRepository) -> Result<bool, DrsError> {
    if pool.managed {
        return Ok(pools.hosts_connected_to(pool.id)?.contains(&host.id));
    }
    Ok(match pool.scope {
        StorageScope::Host => pool.host_id == Some(host.id),
        StorageScope::Cluster => pool.cluster_id == Some(host.cluster_id) && pool.zone_id == host.zone_id,
        StorageScope::Zone => pool.zone_id == host.zone_id,
    })
}
