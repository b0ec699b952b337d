//! Rendering Adapter: renderer-agnostic interface.
//!
//! # Invariants
//! - Renderers read a [`Frame`]; they never mutate scene state.
//! - Pool buffers are re-uploaded only for the pools named in `Frame::dirty`
//!   (or pools the backend has never seen).
//!
//! The debug text renderer stands in for a GPU in the CLI and in tests. The
//! wgpu backend lives in `lemuria-render-wgpu` behind the same trait.

mod frame;
mod renderer;

pub use frame::{Background, DrawItem, Frame, RenderView};
pub use renderer::{DebugTextRenderer, NullRenderer, Renderer};
