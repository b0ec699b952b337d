use glam::{Mat4, Vec3};
use lemuria_assets::{RenderableHandle, TextureHandle};
use lemuria_common::ObjectId;
use lemuria_instancing::PoolRegistry;

/// Camera state a frame is drawn with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderView {
    pub view_proj: Mat4,
    /// Camera position in world space.
    pub eye: Vec3,
    /// Viewport size in pixels.
    pub width: u32,
    pub height: u32,
}

impl Default for RenderView {
    fn default() -> Self {
        Self {
            view_proj: Mat4::IDENTITY,
            eye: Vec3::ZERO,
            width: 1,
            height: 1,
        }
    }
}

/// Scene background: a flat colour or a repeating texture.
#[derive(Debug, Clone, PartialEq)]
pub enum Background {
    Color([f32; 4]),
    Texture(TextureHandle),
}

impl Default for Background {
    fn default() -> Self {
        Background::Color([0.53, 0.81, 0.92, 1.0])
    }
}

impl Background {
    /// Clear colour for backends that cannot sample the texture yet.
    pub fn clear_color(&self) -> [f32; 4] {
        match self {
            Background::Color(c) => *c,
            Background::Texture(_) => [0.5, 0.5, 0.5, 1.0],
        }
    }
}

/// One non-instanced renderable (avatars, attached props, the skybox).
#[derive(Debug, Clone, PartialEq)]
pub struct DrawItem {
    pub id: ObjectId,
    pub renderable: RenderableHandle,
    pub model: Mat4,
}

/// Everything a renderer needs for one frame.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    pub tick: u64,
    pub view: RenderView,
    pub pools: &'a PoolRegistry,
    /// Pools whose instance buffers changed since the previous frame.
    pub dirty: &'a [String],
    pub items: &'a [DrawItem],
    pub background: &'a Background,
    /// Selection wireframe, drawn on top of everything.
    pub highlight: &'a [[Vec3; 2]],
}

impl<'a> Frame<'a> {
    pub fn is_dirty(&self, pool: &str) -> bool {
        self.dirty.iter().any(|name| name == pool)
    }

    /// Instances across every pool, free slots excluded.
    pub fn instance_count(&self) -> usize {
        self.pools.instance_count()
    }
}
