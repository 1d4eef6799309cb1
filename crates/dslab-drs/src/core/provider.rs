//! Interface to the inventory subsystem supplying current resource usage.

use crate::core::common::{ClusterId, HostId};
use crate::core::model::{Host, HostUtilization, Workload};
use crate::error::DrsError;

/// Supplies the state of hosts and workloads which the plan generator works on.
///
/// Calls may block on network or database access. They are not retried here, any error aborts plan generation.
pub trait ResourceSnapshotProvider: Send + Sync {
    /// Returns hosts of the cluster ordered by ID.
    fn cluster_hosts(&self, cluster_id: ClusterId) -> Result<Vec<Host>, DrsError>;

    fn host_utilization(&self, host_id: HostId) -> Result<HostUtilization, DrsError>;

    /// Returns workloads currently placed on the host ordered by ID.
    fn workloads_on_host(&self, host_id: HostId) -> Result<Vec<Workload>, DrsError>;
}
