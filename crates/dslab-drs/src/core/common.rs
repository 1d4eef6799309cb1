use serde::{Deserialize, Serialize};

pub type ZoneId = u32;
pub type ClusterId = u32;
pub type HostId = u32;
pub type VmId = u32;
pub type PoolId = u32;
pub type VolumeId = u32;

/// Resources committed by a workload, derived from its service offering.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq)]
pub struct ResourceRequirement {
    pub cpu_cores: u32,
    /// CPU speed per core in MHz.
    pub cpu_speed: u32,
    /// Memory in MB.
    pub memory: u64,
}

impl ResourceRequirement {
    pub fn new(cpu_cores: u32, cpu_speed: u32, memory: u64) -> Self {
        Self {
            cpu_cores,
            cpu_speed,
            memory,
        }
    }

    /// CPU capacity in the same units as host CPU usage (cores x speed).
    pub fn cpu_usage(&self) -> u64 {
        self.cpu_cores as u64 * self.cpu_speed as u64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationVerdict {
    NotEnoughCPU,
    NotEnoughMemory,
    Success,
    HostNotFound,
}
