//! Shared types for the Lemuria client.
//!
//! Everything here is plain data: identifiers handed out by the world server,
//! poses as they travel over the wire, and the spatial helpers the pool, the
//! picker and the renderer all agree on.

mod bounds;
mod pose;
mod records;
mod types;

pub use bounds::{Aabb, Ray};
pub use pose::{Orientation, Pose, wrap_angle};
pub use records::{ObjectKind, UserRecord, WorldSnapshot};
pub use types::{ObjectId, Transform};
