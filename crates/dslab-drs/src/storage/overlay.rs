//! Planned storage changes on top of the repository state.

use std::collections::BTreeMap;

use crate::core::common::{PoolId, VolumeId};
use crate::core::model::{StoragePool, Volume};

/// Storage counterpart of the cluster state working copy.
///
/// Records volume moves of migrations already accepted into a plan, so that later migrations see the volumes on
/// their planned pools and the pools with the planned usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageOverlay {
    locations: BTreeMap<VolumeId, PoolId>,
    usage_delta: BTreeMap<PoolId, i128>,
}

impl StorageOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    /// Returns the planned pool of the volume.
    pub fn pool_of(&self, volume: &Volume) -> PoolId {
        self.locations.get(&volume.id).copied().unwrap_or(volume.pool_id)
    }

    /// Returns the volume as it will be after the planned moves.
    pub fn locate(&self, volume: &Volume) -> Volume {
        Volume {
            pool_id: self.pool_of(volume),
            ..volume.clone()
        }
    }

    /// Returns the pool with usage changed by the planned moves.
    pub fn adjust(&self, pool: StoragePool) -> StoragePool {
        match self.usage_delta.get(&pool.id) {
            Some(&delta) => {
                let used = (pool.used as i128 + delta).max(0) as u64;
                StoragePool { used, ..pool }
            }
            None => pool,
        }
    }

    /// Moves the volume from its planned pool to the target pool.
    pub fn move_volume(&mut self, volume: &Volume, target: PoolId) {
        let current = self.pool_of(volume);
        if current == target {
            return;
        }
        *self.usage_delta.entry(current).or_default() -= volume.size as i128;
        *self.usage_delta.entry(target).or_default() += volume.size as i128;
        self.locations.insert(volume.id, target);
    }
}
