use std::collections::{BTreeMap, HashMap};

use glam::Mat4;
use lemuria_assets::RenderableHandle;
use lemuria_common::ObjectId;

use crate::pool::{InstancedObjectPool, PoolError};
use crate::slot::Slot;

/// Capacities handed to new pools.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolCapacities {
    pub default: u32,
    /// Pools whose geometry is the load-failure placeholder.
    pub placeholder: u32,
}

impl Default for PoolCapacities {
    fn default() -> Self {
        Self {
            default: 1000,
            placeholder: 100,
        }
    }
}

impl PoolCapacities {
    pub fn for_geometry(&self, geometry: &RenderableHandle) -> u32 {
        if geometry.is_placeholder() {
            self.placeholder
        } else {
            self.default
        }
    }
}

/// Occupancy summary of one pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolStats {
    pub name: String,
    pub live: usize,
    pub capacity: u32,
    pub draw_count: u32,
    pub placeholder: bool,
}

/// Every instance pool in the scene, keyed by asset name.
///
/// Keeps an object → pool index so callers can move or despawn by id alone.
/// BTreeMap keeps iteration (and therefore draw order) deterministic.
#[derive(Debug, Clone, Default)]
pub struct PoolRegistry {
    capacities: PoolCapacities,
    pools: BTreeMap<String, InstancedObjectPool>,
    owners: HashMap<ObjectId, String>,
}

impl PoolRegistry {
    pub fn new(capacities: PoolCapacities) -> Self {
        Self {
            capacities,
            ..Default::default()
        }
    }

    pub fn capacities(&self) -> PoolCapacities {
        self.capacities
    }

    /// Return the pool for `name`, creating it around `geometry` if missing.
    pub fn ensure_pool(
        &mut self,
        name: &str,
        geometry: &RenderableHandle,
    ) -> Result<&mut InstancedObjectPool, PoolError> {
        if !self.pools.contains_key(name) {
            let capacity = self.capacities.for_geometry(geometry);
            let pool = InstancedObjectPool::new(name, geometry.clone(), capacity)?;
            tracing::debug!(pool = name, capacity, "created instance pool");
            self.pools.insert(name.to_owned(), pool);
        }
        self.pools
            .get_mut(name)
            .ok_or_else(|| PoolError::UnknownPool(name.to_owned()))
    }

    pub fn has_pool(&self, name: &str) -> bool {
        self.pools.contains_key(name)
    }

    /// Spawn `id` into the existing pool `name`.
    ///
    /// An id already living in a different pool is moved over: it is
    /// despawned there first so the index stays one-to-one.
    pub fn spawn(&mut self, name: &str, id: ObjectId, transform: Mat4) -> Result<Slot, PoolError> {
        let pool = self
            .pools
            .get(name)
            .ok_or_else(|| PoolError::UnknownPool(name.to_owned()))?;
        if !pool.contains(id) && pool.is_full() {
            // Rejected before touching the old pool so the id stays where it was.
            let err = PoolError::Capacity {
                pool: name.to_owned(),
                capacity: pool.capacity(),
            };
            tracing::warn!(pool = name, %id, "{err}");
            return Err(err);
        }

        if let Some(previous) = self.owners.get(&id).filter(|p| p.as_str() != name).cloned() {
            if let Some(old) = self.pools.get_mut(&previous) {
                match old.despawn(id) {
                    Ok(slot) => {
                        tracing::debug!(%id, from = %previous, to = name, %slot, "moved between pools")
                    }
                    Err(error) => tracing::debug!(%id, from = %previous, %error, "stale owner entry"),
                }
            }
        }

        let pool = self
            .pools
            .get_mut(name)
            .ok_or_else(|| PoolError::UnknownPool(name.to_owned()))?;
        let slot = pool.spawn(id, transform)?;
        self.owners.insert(id, name.to_owned());
        Ok(slot)
    }

    pub fn move_to(&mut self, id: ObjectId, transform: Mat4) -> Result<Slot, PoolError> {
        let name = self.owners.get(&id).ok_or(PoolError::NotFound(id))?;
        let pool = self
            .pools
            .get_mut(name)
            .ok_or_else(|| PoolError::UnknownPool(name.clone()))?;
        pool.move_to(id, transform)
    }

    /// Remove `id` from whichever pool holds it. Returns the pool name and freed slot.
    pub fn despawn(&mut self, id: ObjectId) -> Result<(String, Slot), PoolError> {
        let name = self.owners.remove(&id).ok_or(PoolError::NotFound(id))?;
        let pool = self
            .pools
            .get_mut(&name)
            .ok_or_else(|| PoolError::UnknownPool(name.clone()))?;
        let slot = pool.despawn(id)?;
        Ok((name, slot))
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.owners.contains_key(&id)
    }

    /// Name of the pool holding `id`.
    pub fn pool_of(&self, id: ObjectId) -> Option<&str> {
        self.owners.get(&id).map(String::as_str)
    }

    pub fn transform(&self, id: ObjectId) -> Option<Mat4> {
        let name = self.owners.get(&id)?;
        self.pools.get(name)?.transform(id)
    }

    pub fn get(&self, name: &str) -> Option<&InstancedObjectPool> {
        self.pools.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &InstancedObjectPool)> + '_ {
        self.pools.iter().map(|(name, pool)| (name.as_str(), pool))
    }

    /// Names of the pools whose buffers changed since the last drain.
    pub fn drain_dirty(&mut self) -> Vec<String> {
        self.pools
            .iter_mut()
            .filter_map(|(name, pool)| pool.take_dirty().then(|| name.clone()))
            .collect()
    }

    /// Total live instances across all pools.
    pub fn instance_count(&self) -> usize {
        self.owners.len()
    }

    pub fn pool_count(&self) -> usize {
        self.pools.len()
    }

    pub fn stats(&self) -> Vec<PoolStats> {
        self.pools
            .iter()
            .map(|(name, pool)| PoolStats {
                name: name.clone(),
                live: pool.len(),
                capacity: pool.capacity(),
                draw_count: pool.draw_count(),
                placeholder: pool.geometry().is_placeholder(),
            })
            .collect()
    }

    /// Drop every pool and instance.
    pub fn clear(&mut self) {
        self.pools.clear();
        self.owners.clear();
    }
}
