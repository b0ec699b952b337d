//! Live scene of the Lemuria client.
//!
//! [`SceneLoop`] owns everything a frame touches: instance pools, the scene
//! graph, the player, remote avatars and their labels, the camera rig and the
//! selection. Handlers only write input and queue commands; the tick applies
//! them, in order, on the same thread.
//!
//! # Invariants
//! - One tick per [`TickToken`]. After teardown no token is accepted.
//! - Removing a remote user drops its interpolator, label, avatar node and
//!   pending load in the same command, so nothing can reference it mid-frame.
//! - At most one selection highlight exists.
//! - The player never goes below y = 0 and its pitch stays within ±π/2.

pub mod ambient;
pub mod camera;
pub mod config;
pub mod error;
pub mod graph;
pub mod interpolator;
pub mod labels;
pub mod picker;
pub mod player;
pub mod scene_loop;
pub mod scheduler;
pub mod session;

pub use ambient::{Ambient, AmbientMotion};
pub use camera::{CameraDescriptor, CameraMode, CameraRig};
pub use config::{ClientConfig, ConfigError, MovementConfig, MovementMode};
pub use error::SceneError;
pub use graph::{NodeKind, SKYBOX, SceneGraph, SceneNode};
pub use interpolator::{BLEND_DURATION, EntityInterpolator, Phase};
pub use labels::{LabelAnchor, LabelSet};
pub use picker::{Highlight, Hit, PickOutcome, Picker, Selection};
pub use player::PlayerState;
pub use scene_loop::{RemoteEntity, SceneCommand, SceneLoop, SpawnRejection, TickReport};
pub use scheduler::{FrameScheduler, TickToken};
pub use session::{LocalSession, Session, SessionError, SessionUser};
