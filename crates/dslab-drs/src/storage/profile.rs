//! Request descriptions passed to storage pool allocators.

use std::collections::BTreeSet;

use crate::core::common::{ClusterId, HostId, PoolId, VmId, VolumeId, ZoneId};
use crate::core::model::{Host, ServiceOffering, Volume, Workload};

/// Storage requirements of a single volume.
#[derive(Debug, Clone, PartialEq)]
pub struct DiskProfile {
    pub volume_id: VolumeId,
    /// Size in bytes.
    pub size: u64,
    pub tags: Vec<String>,
    pub use_local_storage: bool,
}

impl DiskProfile {
    /// Builds profile of a volume. Volumes which currently live on local storage keep requiring local storage.
    pub fn from_volume(volume: &Volume, on_local_storage: bool) -> Self {
        Self {
            volume_id: volume.id,
            size: volume.size,
            tags: volume.disk_offering.tags.clone().unwrap_or_default(),
            use_local_storage: volume.disk_offering.use_local_storage || on_local_storage,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VmProfile {
    pub vm_id: VmId,
    pub offering: ServiceOffering,
}

impl VmProfile {
    pub fn from_workload(workload: &Workload) -> Self {
        Self {
            vm_id: workload.id,
            offering: workload.offering,
        }
    }
}

/// Location the allocation is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeploymentPlan {
    pub zone_id: ZoneId,
    pub cluster_id: ClusterId,
    pub host_id: HostId,
}

impl DeploymentPlan {
    pub fn for_host(host: &Host) -> Self {
        Self {
            zone_id: host.zone_id,
            cluster_id: host.cluster_id,
            host_id: host.id,
        }
    }
}

/// Pools which must not be returned by allocators.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExcludeList {
    pools: BTreeSet<PoolId>,
}

impl ExcludeList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_pool(&mut self, pool_id: PoolId) {
        self.pools.insert(pool_id);
    }

    pub fn should_avoid(&self, pool_id: PoolId) -> bool {
        self.pools.contains(&pool_id)
    }
}
