//! Error types.

use thiserror::Error;

use crate::core::common::{ClusterId, HostId, PoolId, VmId, VolumeId};

/// Invalid or unrecognized configuration. Aborts the whole request.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("unknown imbalance metric '{0}' (expected one of: cpu, memory, both, either)")]
    UnknownMetric(String),

    #[error("imbalance threshold {0} is outside of [0, 1]")]
    InvalidThreshold(f64),

    #[error("iterations fraction {0} is outside of (0, 1]")]
    InvalidIterations(f64),

    #[error("unknown DRS algorithm '{0}'")]
    UnknownAlgorithm(String),

    #[error("unknown storage pool allocator '{0}'")]
    UnknownAllocator(String),

    #[error("invalid value '{value}' of option '{option}' in '{name}'")]
    InvalidOption { name: String, option: String, value: String },

    #[error("can't read config file {file}: {message}")]
    Read { file: String, message: String },

    #[error("can't parse YAML from {file}: {message}")]
    Parse { file: String, message: String },
}

/// Storage placement failure of a single VM migration.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlacementError {
    #[error("volume {volume_id} is not attached to vm {vm_id}")]
    VolumeNotAttached { vm_id: VmId, volume_id: VolumeId },

    #[error("storage pool {pool_id} not found")]
    PoolNotFound { pool_id: PoolId },

    #[error(
        "target host {host_id} has no access to requested pool {pool_id} (volume {volume_id} of vm {vm_id})"
    )]
    NoAccessToPool {
        vm_id: VmId,
        volume_id: VolumeId,
        pool_id: PoolId,
        host_id: HostId,
    },

    #[error("no candidate storage pool found for volume {volume_id} of vm {vm_id}")]
    NoCandidatePool { vm_id: VmId, volume_id: VolumeId },

    #[error(
        "volume {volume_id} is on managed pool {current_pool_id} and can't be moved to pool {target_pool_id}"
    )]
    ManagedPoolConflict {
        volume_id: VolumeId,
        current_pool_id: PoolId,
        target_pool_id: PoolId,
    },

    #[error("target host {host_id} not connected to managed pool {pool_id} (volume {volume_id})")]
    ManagedPoolNotConnected {
        volume_id: VolumeId,
        pool_id: PoolId,
        host_id: HostId,
    },

    #[error("vm {vm_id} has no root volume")]
    NoRootVolume { vm_id: VmId },

    #[error("new offering uses {requested} storage while root volume of vm {vm_id} is on {current} storage")]
    OfferingScopeMismatch {
        vm_id: VmId,
        requested: &'static str,
        current: &'static str,
    },
}

/// No host passes basic resource checks. Plan generation stops early, this is not a failure.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CapacityError {
    #[error("no host in cluster {cluster_id} has capacity for any migratable workload")]
    NoSuitableHost { cluster_id: ClusterId },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DrsError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Placement(#[from] PlacementError),

    #[error(transparent)]
    Capacity(#[from] CapacityError),

    #[error("cluster {0} not found")]
    ClusterNotFound(ClusterId),

    #[error("host {0} not found")]
    HostNotFound(HostId),

    #[error("failed to fetch {resource} of cluster {cluster_id}: {message}")]
    Fetch {
        cluster_id: ClusterId,
        resource: String,
        message: String,
    },

    #[error("DRS plan generation is already in progress for cluster {0}")]
    GenerationInProgress(ClusterId),
}
