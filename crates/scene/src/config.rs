use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::camera::CameraDescriptor;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// How navigation steps relate to elapsed time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MovementMode {
    /// Fixed step per frame, whatever the frame rate.
    #[default]
    PerFrame,
    /// Step scaled by `dt * reference_rate`; equal to `PerFrame` at that rate.
    PerSecond { reference_rate: f32 },
}

impl MovementMode {
    /// Multiplier applied to every per-frame step.
    pub fn scale(&self, dt: f32) -> f32 {
        match self {
            MovementMode::PerFrame => 1.0,
            MovementMode::PerSecond { reference_rate } => dt * reference_rate,
        }
    }
}

/// Per-frame navigation steps.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MovementConfig {
    pub mode: MovementMode,
    /// Units along the facing direction.
    pub move_step: f32,
    /// Radians of yaw.
    pub turn_step: f32,
    /// Radians of pitch.
    pub look_step: f32,
    /// Units of height.
    pub rise_step: f32,
    /// Translation multiplier while the secondary modifier is held.
    pub run_multiplier: f32,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            mode: MovementMode::PerFrame,
            move_step: 0.1,
            turn_step: 0.1,
            look_step: 0.1,
            rise_step: 0.1,
            run_multiplier: 3.0,
        }
    }
}

/// Client settings, loaded from JSON. Every field has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Instances per pool.
    pub pool_capacity: u32,
    /// Instances per pool whose asset failed to load.
    pub placeholder_capacity: u32,
    /// Seconds a remote entity takes to reach a new snapshot.
    pub blend_duration: f32,
    /// Upper bound on the per-tick delta, in seconds.
    pub max_frame_delta: f32,
    pub movement: MovementConfig,
    pub first_person: CameraDescriptor,
    pub third_person: CameraDescriptor,
    /// Only objects whose name ends with this can be picked.
    pub pickable_suffix: String,
    /// Root URL of the world's resources.
    pub asset_base: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            pool_capacity: 1000,
            placeholder_capacity: 100,
            blend_duration: 0.2,
            max_frame_delta: 0.1,
            movement: MovementConfig::default(),
            first_person: CameraDescriptor::first_person(),
            third_person: CameraDescriptor::third_person(),
            pickable_suffix: ".rwx".into(),
            asset_base: "http://localhost".into(),
        }
    }
}

impl ClientConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_json(&text)?;
        tracing::debug!(path = %path.as_ref().display(), "loaded client config");
        Ok(config)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        if self.pool_capacity == 0 || self.placeholder_capacity == 0 {
            return invalid("pool capacities must be at least 1");
        }
        if !positive(self.blend_duration) {
            return invalid("blend_duration must be positive");
        }
        if !positive(self.max_frame_delta) {
            return invalid("max_frame_delta must be positive");
        }
        let m = &self.movement;
        let steps = [m.move_step, m.turn_step, m.look_step, m.rise_step, m.run_multiplier];
        if !steps.into_iter().all(positive) {
            return invalid("movement steps must be positive");
        }
        if let MovementMode::PerSecond { reference_rate } = m.mode {
            if !positive(reference_rate) {
                return invalid("reference_rate must be positive");
            }
        }
        for camera in [&self.first_person, &self.third_person] {
            if !positive(camera.near) || camera.far <= camera.near {
                return invalid("camera planes must satisfy 0 < near < far");
            }
            if !positive(camera.fov_degrees) || camera.fov_degrees >= 180.0 {
                return invalid("camera fov must be within (0, 180)");
            }
        }
        Ok(())
    }
}

fn positive(v: f32) -> bool {
    v.is_finite() && v > 0.0
}
