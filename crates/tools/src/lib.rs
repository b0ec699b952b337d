//! Developer tooling: read-only views of a running scene and a demo world
//! to run it on.
//!
//! # Invariants
//! - Inspecting never mutates the scene.
//! - The demo world is deterministic: the same time gives the same snapshots.

pub mod demo;
mod inspector;

pub use demo::{DemoLoader, DemoWorld, demo_loader, load_demo_asset};
pub use inspector::{ObjectInfo, ObjectSource, SceneInspector, SceneSummary};
