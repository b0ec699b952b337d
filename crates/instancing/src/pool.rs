use glam::Mat4;
use lemuria_assets::RenderableHandle;
use lemuria_common::ObjectId;

use crate::slot::{Slot, SlotAllocator, SlotError};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    #[error("pool {pool} is exhausted ({capacity} instances)")]
    Capacity { pool: String, capacity: u32 },
    #[error("object {0} is not in any pool")]
    NotFound(ObjectId),
    #[error("pool capacity must be at least 1")]
    InvalidCapacity,
    #[error("no pool for asset {0}")]
    UnknownPool(String),
}

/// One object type drawn many times: shared geometry plus a fixed-size
/// buffer of per-instance matrices.
///
/// Any mutation raises the dirty flag; the renderer clears it with
/// [`take_dirty`](Self::take_dirty) when it uploads the buffer.
#[derive(Debug, Clone)]
pub struct InstancedObjectPool {
    name: String,
    geometry: RenderableHandle,
    slots: SlotAllocator<Mat4>,
    dirty: bool,
}

impl InstancedObjectPool {
    pub fn new(
        name: impl Into<String>,
        geometry: RenderableHandle,
        capacity: u32,
    ) -> Result<Self, PoolError> {
        if capacity == 0 {
            return Err(PoolError::InvalidCapacity);
        }
        Ok(Self {
            name: name.into(),
            geometry,
            slots: SlotAllocator::new(capacity, Mat4::ZERO),
            dirty: false,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn geometry(&self) -> &RenderableHandle {
        &self.geometry
    }

    /// Place a new instance. Spawning an id that is already present moves it.
    pub fn spawn(&mut self, id: ObjectId, transform: Mat4) -> Result<Slot, PoolError> {
        let slot = self.slots.allocate(id).map_err(|e| self.map_err(e))?;
        self.slots
            .update(id, transform)
            .map_err(|e| self.map_err(e))?;
        self.dirty = true;
        Ok(slot)
    }

    pub fn move_to(&mut self, id: ObjectId, transform: Mat4) -> Result<Slot, PoolError> {
        let slot = self
            .slots
            .update(id, transform)
            .map_err(|e| self.map_err(e))?;
        self.dirty = true;
        Ok(slot)
    }

    /// Remove an instance. Its slot is zeroed but the draw count does not shrink.
    pub fn despawn(&mut self, id: ObjectId) -> Result<Slot, PoolError> {
        let slot = self.slots.release(id).map_err(|e| self.map_err(e))?;
        self.dirty = true;
        Ok(slot)
    }

    pub fn lookup(&self, id: ObjectId) -> Option<Slot> {
        self.slots.lookup(id).ok()
    }

    pub fn transform(&self, id: ObjectId) -> Option<Mat4> {
        self.slots.payload(id).ok().copied()
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.slots.contains(id)
    }

    /// Instance matrices to upload, one per slot up to the draw count.
    pub fn instances(&self) -> &[Mat4] {
        self.slots.values()
    }

    /// Live instances in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (ObjectId, Slot, &Mat4)> + '_ {
        self.slots.iter()
    }

    pub fn draw_count(&self) -> u32 {
        self.slots.high_water()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn capacity(&self) -> u32 {
        self.slots.capacity()
    }

    pub fn is_full(&self) -> bool {
        self.slots.is_full()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Report whether the buffer changed since the last call, and reset.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    fn map_err(&self, e: SlotError) -> PoolError {
        match e {
            SlotError::Full { capacity } => PoolError::Capacity {
                pool: self.name.clone(),
                capacity,
            },
            SlotError::NotFound(id) => PoolError::NotFound(id),
        }
    }
}
