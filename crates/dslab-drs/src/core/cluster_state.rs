//! Cluster state snapshot.

use std::collections::BTreeMap;

use crate::core::common::{AllocationVerdict, ClusterId, HostId, ResourceRequirement, VmId};
use crate::core::model::{Host, HostUtilization, Workload};
use crate::core::provider::ResourceSnapshotProvider;
use crate::error::DrsError;

/// Stores host properties and its current usage.
#[derive(Clone, Debug)]
pub struct HostState {
    pub host: Host,

    pub cpu_used: u64,
    pub memory_used: u64,

    pub cpu_reserved: u64,
    pub memory_reserved: u64,

    pub workloads: BTreeMap<VmId, ResourceRequirement>,
}

impl HostState {
    pub fn new(host: Host, utilization: HostUtilization) -> Self {
        Self {
            host,
            cpu_used: utilization.cpu_used,
            memory_used: utilization.memory_used,
            cpu_reserved: utilization.cpu_reserved,
            memory_reserved: utilization.memory_reserved,
            workloads: BTreeMap::new(),
        }
    }
}

/// Hosts and workloads of a single cluster.
///
/// A snapshot fetched from [`ResourceSnapshotProvider`] is the read-only baseline, plan generation works on its own
/// clone and applies every planned migration to it, so that the next iteration sees the updated usage.
#[derive(Clone, Debug)]
pub struct ClusterState {
    cluster_id: ClusterId,
    hosts: BTreeMap<HostId, HostState>,
    workloads: BTreeMap<VmId, Workload>,
}

impl ClusterState {
    /// Creates empty cluster state.
    pub fn new(cluster_id: ClusterId) -> Self {
        Self {
            cluster_id,
            hosts: BTreeMap::new(),
            workloads: BTreeMap::new(),
        }
    }

    /// Builds cluster state from the current inventory.
    pub fn fetch(provider: &dyn ResourceSnapshotProvider, cluster_id: ClusterId) -> Result<Self, DrsError> {
        let mut state = Self::new(cluster_id);
        for host in provider.cluster_hosts(cluster_id)? {
            let host_id = host.id;
            let utilization = provider.host_utilization(host_id)?;
            state.add_host(host, utilization);
            for workload in provider.workloads_on_host(host_id)? {
                state.add_workload(workload);
            }
        }
        log::debug!(
            "fetched cluster {}: {} hosts, {} workloads",
            cluster_id,
            state.get_host_count(),
            state.workload_count()
        );
        Ok(state)
    }

    pub fn cluster_id(&self) -> ClusterId {
        self.cluster_id
    }

    /// Adds host to the cluster.
    pub fn add_host(&mut self, host: Host, utilization: HostUtilization) {
        self.hosts.insert(host.id, HostState::new(host, utilization));
    }

    /// Registers workload on its current host.
    ///
    /// Host usage is expected to already include the workload, it is not changed here.
    /// Workloads placed on hosts outside of the cluster are ignored.
    pub fn add_workload(&mut self, workload: Workload) {
        match self.hosts.get_mut(&workload.host_id) {
            Some(host) => {
                host.workloads.insert(workload.id, workload.requirement());
                self.workloads.insert(workload.id, workload);
            }
            None => {
                log::warn!(
                    "workload {} is placed on host {} outside of cluster {}",
                    workload.id,
                    workload.host_id,
                    self.cluster_id
                );
            }
        }
    }

    /// Returns IDs of all hosts.
    pub fn get_hosts_list(&self) -> Vec<HostId> {
        self.hosts.keys().cloned().collect()
    }

    /// Returns the number of hosts.
    pub fn get_host_count(&self) -> u32 {
        self.hosts.len() as u32
    }

    pub fn get_host(&self, host_id: HostId) -> Option<&HostState> {
        self.hosts.get(&host_id)
    }

    pub fn get_workload(&self, vm_id: VmId) -> Option<&Workload> {
        self.workloads.get(&vm_id)
    }

    /// Returns workloads ordered by their host ID and then by workload ID.
    pub fn workloads(&self) -> Vec<&Workload> {
        self.hosts
            .values()
            .flat_map(|host| host.workloads.keys())
            .filter_map(|vm_id| self.workloads.get(vm_id))
            .collect()
    }

    pub fn workload_count(&self) -> usize {
        self.workloads.len()
    }

    /// Returns CPU usage of all hosts ordered by host ID.
    pub fn cpu_used_list(&self) -> Vec<f64> {
        self.hosts.values().map(|host| host.cpu_used as f64).collect()
    }

    /// Returns memory usage of all hosts ordered by host ID.
    pub fn memory_used_list(&self) -> Vec<f64> {
        self.hosts.values().map(|host| host.memory_used as f64).collect()
    }

    /// Returns CPU and memory usage lists as they would be after moving the workload to the specified host.
    ///
    /// Returns `None` if the workload or the host is unknown.
    pub fn used_lists_after_migration(&self, vm_id: VmId, host_id: HostId) -> Option<(Vec<f64>, Vec<f64>)> {
        let workload = self.workloads.get(&vm_id)?;
        if !self.hosts.contains_key(&host_id) {
            return None;
        }
        let req = workload.requirement();
        let mut cpu = Vec::with_capacity(self.hosts.len());
        let mut memory = Vec::with_capacity(self.hosts.len());
        for (id, host) in self.hosts.iter() {
            let (mut cpu_used, mut memory_used) = (host.cpu_used as f64, host.memory_used as f64);
            if *id == workload.host_id {
                cpu_used -= req.cpu_usage() as f64;
                memory_used -= req.memory as f64;
            }
            if *id == host_id {
                cpu_used += req.cpu_usage() as f64;
                memory_used += req.memory as f64;
            }
            cpu.push(cpu_used);
            memory.push(memory_used);
        }
        Some((cpu, memory))
    }

    /// Checks if the specified requirement currently fits the specified host.
    pub fn can_allocate(&self, req: &ResourceRequirement, host_id: HostId) -> AllocationVerdict {
        let host = match self.hosts.get(&host_id) {
            Some(host) => host,
            None => return AllocationVerdict::HostNotFound,
        };
        if host.host.cpu_total > 0 && host.cpu_used + host.cpu_reserved + req.cpu_usage() > host.host.cpu_total {
            return AllocationVerdict::NotEnoughCPU;
        }
        if host.memory_used + host.memory_reserved + req.memory > host.host.memory_total {
            return AllocationVerdict::NotEnoughMemory;
        }
        AllocationVerdict::Success
    }

    /// Moves the workload to the specified host updating usage of both hosts.
    pub fn migrate(&mut self, vm_id: VmId, host_id: HostId) {
        let source_id = match self.workloads.get(&vm_id) {
            Some(workload) => workload.host_id,
            None => return,
        };
        if source_id == host_id || !self.hosts.contains_key(&host_id) {
            return;
        }

        let req = match self.hosts.get_mut(&source_id).and_then(|source| {
            let req = source.workloads.remove(&vm_id)?;
            source.cpu_used = source.cpu_used.saturating_sub(req.cpu_usage());
            source.memory_used = source.memory_used.saturating_sub(req.memory);
            Some(req)
        }) {
            Some(req) => req,
            None => return,
        };

        if let Some(target) = self.hosts.get_mut(&host_id) {
            target.cpu_used += req.cpu_usage();
            target.memory_used += req.memory;
            target.workloads.insert(vm_id, req);
        }
        if let Some(workload) = self.workloads.get_mut(&vm_id) {
            workload.host_id = host_id;
        }
    }
}
