//! Instance pools: thousands of copies of one object sharing one draw call.
//!
//! # Invariants
//! - Every occupied slot is bound to exactly one [`ObjectId`](lemuria_common::ObjectId).
//! - Every free slot holds the zero matrix, so it draws nothing.
//! - `len() <= capacity()` at all times; running out of slots is an ordinary
//!   error value, never a panic.
//! - Spawn, move and despawn are O(1) and never reallocate the buffer.

mod pool;
mod registry;
mod slot;

pub use pool::{InstancedObjectPool, PoolError};
pub use registry::{PoolCapacities, PoolRegistry, PoolStats};
pub use slot::{Slot, SlotAllocator, SlotError};
