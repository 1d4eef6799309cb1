//! Inventory entities read by the decision core.

use serde::{Deserialize, Serialize};

use crate::core::common::{ClusterId, HostId, PoolId, ResourceRequirement, VmId, VolumeId, ZoneId};

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub id: ClusterId,
    pub name: String,
    pub zone_id: ZoneId,
}

/// Physical host properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Host {
    pub id: HostId,
    pub name: String,
    pub cluster_id: ClusterId,
    pub zone_id: ZoneId,
    /// Total CPU capacity in MHz, zero means the capacity is not checked.
    #[serde(default)]
    pub cpu_total: u64,
    /// Total memory in MB.
    pub memory_total: u64,
}

/// Current host usage as reported by the capacity subsystem.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HostUtilization {
    pub cpu_used: u64,
    #[serde(default)]
    pub cpu_reserved: u64,
    pub memory_used: u64,
    #[serde(default)]
    pub memory_reserved: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ServiceOffering {
    pub cpu_cores: u32,
    pub cpu_speed: u32,
    /// Memory in MB.
    pub memory: u64,
    #[serde(default)]
    pub dynamically_scalable: bool,
}

impl ServiceOffering {
    pub fn new(cpu_cores: u32, cpu_speed: u32, memory: u64) -> Self {
        Self {
            cpu_cores,
            cpu_speed,
            memory,
            dynamically_scalable: false,
        }
    }

    pub fn requirement(&self) -> ResourceRequirement {
        ResourceRequirement::new(self.cpu_cores, self.cpu_speed, self.memory)
    }
}

/// Virtual machine running on some host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workload {
    pub id: VmId,
    pub name: String,
    pub host_id: HostId,
    pub offering: ServiceOffering,
    /// Workloads which can't be live migrated (system VMs, VMs with host devices) are never moved by DRS.
    #[serde(default = "default_true")]
    pub migratable: bool,
}

impl Workload {
    pub fn new(id: VmId, name: &str, host_id: HostId, offering: ServiceOffering) -> Self {
        Self {
            id,
            name: name.to_string(),
            host_id,
            offering,
            migratable: true,
        }
    }

    pub fn requirement(&self) -> ResourceRequirement {
        self.offering.requirement()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageScope {
    /// Local storage of a single host.
    Host,
    /// Shared between hosts of a single cluster.
    Cluster,
    /// Shared between all clusters of a zone.
    Zone,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PoolStatus {
    #[default]
    Up,
    Maintenance,
    Disabled,
}

/// Primary storage pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoragePool {
    pub id: PoolId,
    pub name: String,
    pub scope: StorageScope,
    pub zone_id: ZoneId,
    /// Not set for zone-wide pools.
    #[serde(default)]
    pub cluster_id: Option<ClusterId>,
    /// Set for host-local pools only.
    #[serde(default)]
    pub host_id: Option<HostId>,
    /// Managed pools require explicit per-host connection before use.
    #[serde(default)]
    pub managed: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Capacity in bytes.
    pub capacity: u64,
    #[serde(default)]
    pub used: u64,
    #[serde(default)]
    pub status: PoolStatus,
}

impl StoragePool {
    pub fn is_local(&self) -> bool {
        self.scope == StorageScope::Host
    }

    pub fn free_capacity(&self) -> u64 {
        self.capacity.saturating_sub(self.used)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VolumeType {
    Root,
    DataDisk,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiskOffering {
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub use_local_storage: bool,
}

/// Disk attached to a virtual machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Volume {
    pub id: VolumeId,
    pub name: String,
    pub vm_id: VmId,
    pub volume_type: VolumeType,
    pub pool_id: PoolId,
    /// Size in bytes.
    pub size: u64,
    #[serde(default)]
    pub disk_offering: DiskOffering,
}
