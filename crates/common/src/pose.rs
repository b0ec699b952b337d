use std::f32::consts::{PI, TAU};

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Euler orientation in radians, as carried by world snapshots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Orientation {
    pub yaw: f32,
    pub pitch: f32,
    pub roll: f32,
}

impl Orientation {
    pub const fn new(yaw: f32, pitch: f32, roll: f32) -> Self {
        Self { yaw, pitch, roll }
    }

    /// Per-axis linear blend.
    ///
    /// Angles are not unwrapped: blending from just under +π to just over -π
    /// sweeps the long way round. Remote avatars accept that artifact.
    pub fn lerp(self, target: Self, t: f32) -> Self {
        Self {
            yaw: self.yaw + (target.yaw - self.yaw) * t,
            pitch: self.pitch + (target.pitch - self.pitch) * t,
            roll: self.roll + (target.roll - self.roll) * t,
        }
    }

    pub fn to_vec3(self) -> Vec3 {
        Vec3::new(self.pitch, self.yaw, self.roll)
    }
}

/// Position plus orientation of anything that moves in the world.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vec3,
    pub orientation: Orientation,
}

impl Pose {
    pub const fn new(position: Vec3, orientation: Orientation) -> Self {
        Self {
            position,
            orientation,
        }
    }

    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            orientation: Orientation::default(),
        }
    }

    /// Component-wise blend of position and orientation by `t`.
    pub fn lerp(self, target: Self, t: f32) -> Self {
        Self {
            position: self.position.lerp(target.position, t),
            orientation: self.orientation.lerp(target.orientation, t),
        }
    }
}

/// Wrap an angle into `(-π, π]`.
pub fn wrap_angle(angle: f32) -> f32 {
    let mut a = angle % TAU;
    if a > PI {
        a -= TAU;
    } else if a <= -PI {
        a += TAU;
    }
    a
}
