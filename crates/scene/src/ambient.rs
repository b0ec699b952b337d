use std::collections::BTreeMap;

use glam::{Quat, Vec3};
use lemuria_common::Transform;

/// Per-frame cosmetic motion of a decorative prop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmbientMotion {
    /// Radians added to yaw each frame.
    pub yaw_step: f32,
    /// Distance moved along the prop's own +Z each frame.
    pub drift_step: f32,
}

impl AmbientMotion {
    /// The tractor that circles in the default world.
    pub const TRACTOR: Self = Self {
        yaw_step: 0.01,
        drift_step: -0.005,
    };

    pub fn apply(&self, transform: &Transform) -> Transform {
        let rotation = Quat::from_rotation_y(self.yaw_step) * transform.rotation;
        let heading = rotation * Vec3::Z;
        Transform {
            position: transform.position + heading * self.drift_step,
            rotation,
            scale: transform.scale,
        }
    }
}

/// Decorative props keyed by asset name.
#[derive(Debug, Clone, Default)]
pub struct Ambient {
    motions: BTreeMap<String, AmbientMotion>,
}

impl Ambient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ambient set of the default world.
    pub fn with_defaults() -> Self {
        let mut ambient = Self::new();
        ambient.register("tracteur1.rwx", AmbientMotion::TRACTOR);
        ambient
    }

    pub fn register(&mut self, name: impl Into<String>, motion: AmbientMotion) {
        self.motions.insert(name.into(), motion);
    }

    pub fn get(&self, name: &str) -> Option<&AmbientMotion> {
        self.motions.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AmbientMotion)> + '_ {
        self.motions.iter().map(|(name, motion)| (name.as_str(), motion))
    }

    pub fn is_empty(&self) -> bool {
        self.motions.is_empty()
    }
}
