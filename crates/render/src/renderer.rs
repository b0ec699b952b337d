use std::fmt::Write;

use crate::frame::Frame;

/// Renderer-agnostic interface. All backends implement this trait.
///
/// Takes `&mut self` so backends can keep GPU buffers alive between frames.
pub trait Renderer {
    /// The output type produced by this renderer.
    type Output;

    /// Render one frame.
    fn render(&mut self, frame: &Frame<'_>) -> Self::Output;
}

/// Renderer that draws nothing. Used by headless scene loops.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRenderer;

impl Renderer for NullRenderer {
    type Output = ();

    fn render(&mut self, _frame: &Frame<'_>) {}
}

/// Human-readable dump of a frame, for the CLI and for tests.
///
/// Counts how many pool buffers it would have uploaded, so tests can check
/// that clean pools are skipped.
#[derive(Debug, Default)]
pub struct DebugTextRenderer {
    uploads: u64,
}

impl DebugTextRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pool buffer uploads since construction.
    pub fn uploads(&self) -> u64 {
        self.uploads
    }
}

impl Renderer for DebugTextRenderer {
    type Output = String;

    fn render(&mut self, frame: &Frame<'_>) -> String {
        let mut out = String::new();
        let eye = frame.view.eye;
        let _ = writeln!(
            out,
            "=== Frame {} ({}x{}) ===",
            frame.tick, frame.view.width, frame.view.height
        );
        let _ = writeln!(out, "Camera: eye=({:.2}, {:.2}, {:.2})", eye.x, eye.y, eye.z);
        let _ = writeln!(out, "Instances: {}", frame.instance_count());

        for (name, pool) in frame.pools.iter() {
            let dirty = frame.is_dirty(name);
            if dirty {
                self.uploads += 1;
            }
            let _ = writeln!(
                out,
                "  pool {name}: {}/{} draw={}{}",
                pool.len(),
                pool.capacity(),
                pool.draw_count(),
                if dirty { " [upload]" } else { "" }
            );
        }

        for item in frame.items {
            let p = item.model.w_axis;
            let _ = writeln!(
                out,
                "  item {} {}: pos=({:.2}, {:.2}, {:.2})",
                item.id, item.renderable.name, p.x, p.y, p.z
            );
        }

        if !frame.highlight.is_empty() {
            let _ = writeln!(out, "Highlight: {} edges", frame.highlight.len());
        }

        tracing::trace!(tick = frame.tick, uploads = self.uploads, "debug frame");
        out
    }
}
