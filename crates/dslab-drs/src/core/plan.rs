//! Cluster DRS plan.

use std::io::Write;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::common::{ClusterId, HostId, VmId};
use crate::storage::mapping::VolumeToPoolMapping;

/// Single step of a DRS plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedMigration {
    pub vm_id: VmId,
    pub source_host: HostId,
    pub destination_host: HostId,
    pub cost_estimate: f64,
    pub benefit_estimate: f64,
    pub improvement: f64,
    /// Volumes which must change their storage pool, empty if all volumes stay where they are.
    #[serde(default)]
    pub storage_mapping: VolumeToPoolMapping,
}

/// Ordered list of migrations generated for a cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterDrsPlan {
    /// Cleared when the plan is not persisted.
    pub id: Option<Uuid>,
    pub cluster_id: ClusterId,
    pub algorithm: String,
    pub created: DateTime<Utc>,
    pub migrations: Vec<PlannedMigration>,
}

/// Flat representation of a plan step, one CSV row per migration.
#[derive(Serialize)]
struct PlanRow {
    plan_id: String,
    cluster_id: ClusterId,
    step: usize,
    vm_id: VmId,
    source_host: HostId,
    destination_host: HostId,
    cost: f64,
    benefit: f64,
    improvement: f64,
    volumes_to_move: usize,
}

impl ClusterDrsPlan {
    pub fn new(cluster_id: ClusterId, algorithm: &str) -> Self {
        Self {
            id: Some(Uuid::new_v4()),
            cluster_id,
            algorithm: algorithm.to_string(),
            created: Utc::now(),
            migrations: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    pub fn clear_id(&mut self) {
        self.id = None;
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Writes plan steps as CSV with header.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), csv::Error> {
        write_plans_csv([self], writer)
    }

    fn rows(&self) -> impl Iterator<Item = PlanRow> + '_ {
        let plan_id = self.id.map(|id| id.to_string()).unwrap_or_default();
        self.migrations.iter().enumerate().map(move |(step, migration)| PlanRow {
            plan_id: plan_id.clone(),
            cluster_id: self.cluster_id,
            step: step + 1,
            vm_id: migration.vm_id,
            source_host: migration.source_host,
            destination_host: migration.destination_host,
            cost: migration.cost_estimate,
            benefit: migration.benefit_estimate,
            improvement: migration.improvement,
            volumes_to_move: migration.storage_mapping.len(),
        })
    }
}

/// Writes steps of all plans as a single CSV table.
pub fn write_plans_csv<'a, W: Write>(
    plans: impl IntoIterator<Item = &'a ClusterDrsPlan>,
    writer: W,
) -> Result<(), csv::Error> {
    let mut wtr = csv::Writer::from_writer(writer);
    for plan in plans {
        for row in plan.rows() {
            wtr.serialize(row)?;
        }
    }
    wtr.flush()?;
    Ok(())
}
