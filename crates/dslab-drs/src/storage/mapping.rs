use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::core::common::{PoolId, VolumeId};

/// Target storage pools of volumes of a migrating VM.
///
/// Every key is a volume attached to the VM. A volume which is absent stays on its current pool,
/// the destination host access to that pool is already validated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VolumeToPoolMapping(IndexMap<VolumeId, PoolId>);

impl VolumeToPoolMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, volume_id: VolumeId, pool_id: PoolId) {
        self.0.insert(volume_id, pool_id);
    }

    pub fn get(&self, volume_id: VolumeId) -> Option<PoolId> {
        self.0.get(&volume_id).copied()
    }

    pub fn contains(&self, volume_id: VolumeId) -> bool {
        self.0.contains_key(&volume_id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over (volume, pool) pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (VolumeId, PoolId)> + '_ {
        self.0.iter().map(|(volume, pool)| (*volume, *pool))
    }
}
