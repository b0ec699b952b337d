//! wgpu render backend for the Lemuria client.
//!
//! Draws a grid floor, every instance pool with one instanced draw call per
//! pool, the loose draw items and the selection wireframe. Renderables are
//! drawn as their bounding boxes.
//!
//! # Invariants
//! - Renderer never mutates scene state.
//! - A pool's GPU buffer is written only when the frame lists it as dirty or
//!   the backend has not seen the pool before.

mod error;
mod gpu;
mod shaders;

pub use error::{RenderError, acquire_frame};
pub use gpu::{FrameStats, WgpuRenderer, WgpuTarget};
