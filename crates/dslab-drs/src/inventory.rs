//! In-memory inventory of clusters, hosts, workloads and storage.

use std::collections::{BTreeMap, BTreeSet};

use serde::Deserialize;

use crate::core::common::{ClusterId, HostId, PoolId, VmId, VolumeId, ZoneId};
use crate::core::model::{Cluster, Host, HostUtilization, StoragePool, Volume, Workload};
use crate::core::provider::ResourceSnapshotProvider;
use crate::error::{ConfigurationError, DrsError};
use crate::storage::repository::{PoolRepository, VolumeRepository};

/// Host entry of the inventory file, contains both host properties and its current usage.
#[derive(Debug, Deserialize)]
struct HostRecord {
    id: HostId,
    name: String,
    cluster_id: ClusterId,
    zone_id: ZoneId,
    #[serde(default)]
    cpu_total: u64,
    memory_total: u64,
    #[serde(default)]
    cpu_used: u64,
    #[serde(default)]
    cpu_reserved: u64,
    #[serde(default)]
    memory_used: u64,
    #[serde(default)]
    memory_reserved: u64,
}

#[derive(Debug, Deserialize)]
struct PoolConnection {
    pool_id: PoolId,
    host_id: HostId,
}

#[derive(Debug, Default, Deserialize)]
struct RawInventory {
    #[serde(default)]
    clusters: Vec<Cluster>,
    #[serde(default)]
    hosts: Vec<HostRecord>,
    #[serde(default)]
    vms: Vec<Workload>,
    #[serde(default)]
    pools: Vec<StoragePool>,
    #[serde(default)]
    pool_connections: Vec<PoolConnection>,
    #[serde(default)]
    volumes: Vec<Volume>,
}

/// Inventory snapshot kept in memory.
///
/// Serves as the resource snapshot provider and as the storage repositories for tools and tests.
/// Host utilization is taken as is, it is not recomputed from the workloads.
#[derive(Debug, Default, Clone)]
pub struct InMemoryInventory {
    clusters: BTreeMap<ClusterId, Cluster>,
    hosts: BTreeMap<HostId, (Host, HostUtilization)>,
    workloads: BTreeMap<VmId, Workload>,
    pools: BTreeMap<PoolId, StoragePool>,
    connections: BTreeMap<PoolId, BTreeSet<HostId>>,
    volumes: BTreeMap<VolumeId, Volume>,
}

impl InMemoryInventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads inventory from YAML file.
    pub fn from_file(file_name: &str) -> Result<Self, ConfigurationError> {
        let content = std::fs::read_to_string(file_name).map_err(|e| ConfigurationError::Read {
            file: file_name.to_string(),
            message: e.to_string(),
        })?;
        Self::from_yaml(&content, file_name)
    }

    pub fn from_yaml(content: &str, source: &str) -> Result<Self, ConfigurationError> {
        let raw: RawInventory = serde_yaml::from_str(content).map_err(|e| ConfigurationError::Parse {
            file: source.to_string(),
            message: e.to_string(),
        })?;

        let mut inventory = Self::new();
        for cluster in raw.clusters {
            inventory.add_cluster(cluster);
        }
        for record in raw.hosts {
            let utilization = HostUtilization {
                cpu_used: record.cpu_used,
                cpu_reserved: record.cpu_reserved,
                memory_used: record.memory_used,
                memory_reserved: record.memory_reserved,
            };
            let host = Host {
                id: record.id,
                name: record.name,
                cluster_id: record.cluster_id,
                zone_id: record.zone_id,
                cpu_total: record.cpu_total,
                memory_total: record.memory_total,
            };
            inventory.add_host(host, utilization);
        }
        for vm in raw.vms {
            inventory.add_workload(vm);
        }
        for pool in raw.pools {
            inventory.add_pool(pool);
        }
        for connection in raw.pool_connections {
            inventory.connect_pool(connection.pool_id, connection.host_id);
        }
        for volume in raw.volumes {
            inventory.add_volume(volume);
        }
        log::debug!(
            "loaded inventory from {}: {} clusters, {} hosts, {} vms, {} pools, {} volumes",
            source,
            inventory.clusters.len(),
            inventory.hosts.len(),
            inventory.workloads.len(),
            inventory.pools.len(),
            inventory.volumes.len()
        );
        Ok(inventory)
    }

    pub fn add_cluster(&mut self, cluster: Cluster) -> &mut Self {
        self.clusters.insert(cluster.id, cluster);
        self
    }

    /// Adds host together with its current usage. The host cluster is registered if it is unknown.
    pub fn add_host(&mut self, host: Host, utilization: HostUtilization) -> &mut Self {
        self.clusters.entry(host.cluster_id).or_insert_with(|| Cluster {
            id: host.cluster_id,
            name: format!("cluster-{}", host.cluster_id),
            zone_id: host.zone_id,
        });
        self.hosts.insert(host.id, (host, utilization));
        self
    }

    pub fn add_workload(&mut self, workload: Workload) -> &mut Self {
        self.workloads.insert(workload.id, workload);
        self
    }

    pub fn add_pool(&mut self, pool: StoragePool) -> &mut Self {
        self.pools.insert(pool.id, pool);
        self
    }

    /// Registers connection of a host to a (managed) pool.
    pub fn connect_pool(&mut self, pool_id: PoolId, host_id: HostId) -> &mut Self {
        self.connections.entry(pool_id).or_default().insert(host_id);
        self
    }

    pub fn add_volume(&mut self, volume: Volume) -> &mut Self {
        self.volumes.insert(volume.id, volume);
        self
    }

    pub fn cluster_ids(&self) -> Vec<ClusterId> {
        self.clusters.keys().cloned().collect()
    }

    pub fn host(&self, host_id: HostId) -> Option<&Host> {
        self.hosts.get(&host_id).map(|(host, _)| host)
    }

    pub fn workload(&self, vm_id: VmId) -> Option<&Workload> {
        self.workloads.get(&vm_id)
    }
}

impl ResourceSnapshotProvider for InMemoryInventory {
    fn cluster_hosts(&self, cluster_id: ClusterId) -> Result<Vec<Host>, DrsError> {
        if !self.clusters.contains_key(&cluster_id) {
            return Err(DrsError::ClusterNotFound(cluster_id));
        }
        Ok(self
            .hosts
            .values()
            .filter(|(host, _)| host.cluster_id == cluster_id)
            .map(|(host, _)| host.clone())
            .collect())
    }

    fn host_utilization(&self, host_id: HostId) -> Result<HostUtilization, DrsError> {
        self.hosts
            .get(&host_id)
            .map(|(_, utilization)| *utilization)
            .ok_or(DrsError::HostNotFound(host_id))
    }

    fn workloads_on_host(&self, host_id: HostId) -> Result<Vec<Workload>, DrsError> {
        if !self.hosts.contains_key(&host_id) {
            return Err(DrsError::HostNotFound(host_id));
        }
        Ok(self
            .workloads
            .values()
            .filter(|w| w.host_id == host_id)
            .cloned()
            .collect())
    }
}

impl PoolRepository for InMemoryInventory {
    fn find_by_id(&self, pool_id: PoolId) -> Result<Option<StoragePool>, DrsError> {
        Ok(self.pools.get(&pool_id).cloned())
    }

    fn hosts_connected_to(&self, pool_id: PoolId) -> Result<BTreeSet<HostId>, DrsError> {
        Ok(self.connections.get(&pool_id).cloned().unwrap_or_default())
    }

    fn list_pools(&self) -> Result<Vec<StoragePool>, DrsError> {
        Ok(self.pools.values().cloned().collect())
    }
}

impl VolumeRepository for InMemoryInventory {
    fn usable_volumes_for_instance(&self, vm_id: VmId) -> Result<Vec<Volume>, DrsError> {
        Ok(self.volumes.values().filter(|v| v.vm_id == vm_id).cloned().collect())
    }
}
