//! Records delivered by the transport layer, already parsed.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::pose::{Orientation, Pose};
use crate::types::ObjectId;

/// What kind of thing a world snapshot describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    /// A placed object, usually living in an instance pool.
    Prop,
    /// Another connected user.
    Avatar,
}

/// One pose update for one world object.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldSnapshot {
    pub object_id: ObjectId,
    pub position: Vec3,
    pub orientation: Orientation,
    pub kind: ObjectKind,
}

impl WorldSnapshot {
    pub fn pose(&self) -> Pose {
        Pose::new(self.position, self.orientation)
    }
}

/// Entry of the connected-user list.
///
/// The `old*` fields and `completion` belong to the interpolation; everything
/// else is owned by the transport.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: ObjectId,
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub old_x: f32,
    pub old_y: f32,
    pub old_z: f32,
    pub yaw: f32,
    pub pitch: f32,
    pub roll: f32,
    pub old_yaw: f32,
    pub old_pitch: f32,
    pub old_roll: f32,
    pub completion: f32,
}

impl UserRecord {
    /// Newest pose reported by the server.
    pub fn target(&self) -> Pose {
        Pose::new(
            Vec3::new(self.x, self.y, self.z),
            Orientation::new(self.yaw, self.pitch, self.roll),
        )
    }

    /// Pose the blend started from.
    pub fn previous(&self) -> Pose {
        Pose::new(
            Vec3::new(self.old_x, self.old_y, self.old_z),
            Orientation::new(self.old_yaw, self.old_pitch, self.old_roll),
        )
    }

    pub fn set_previous(&mut self, pose: Pose) {
        self.old_x = pose.position.x;
        self.old_y = pose.position.y;
        self.old_z = pose.position.z;
        self.old_yaw = pose.orientation.yaw;
        self.old_pitch = pose.orientation.pitch;
        self.old_roll = pose.orientation.roll;
    }

    pub fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot {
            object_id: self.id,
            position: Vec3::new(self.x, self.y, self.z),
            orientation: Orientation::new(self.yaw, self.pitch, self.roll),
            kind: ObjectKind::Avatar,
        }
    }
}
