use std::ops::Deref;
use std::sync::Arc;

use glam::Vec3;
use lemuria_common::Aabb;
use serde::{Deserialize, Serialize};

/// Opaque mesh identifier handed out by the loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MeshId(pub u64);

impl MeshId {
    /// Mesh of the fallback cone drawn for assets that failed to load.
    pub const PLACEHOLDER: Self = Self(u64::MAX);
}

/// What the renderer and picker need to know about a loaded object.
#[derive(Debug, Clone, PartialEq)]
pub struct Renderable {
    pub name: String,
    pub mesh: MeshId,
    /// Local-space bounds, used for picking and for the selection wireframe.
    pub bounds: Aabb,
    pub color: [f32; 4],
    pub placeholder: bool,
}

/// Cheaply clonable shared reference to a [`Renderable`].
#[derive(Debug, Clone, PartialEq)]
pub struct RenderableHandle(Arc<Renderable>);

impl RenderableHandle {
    pub fn new(renderable: Renderable) -> Self {
        Self(Arc::new(renderable))
    }

    /// The small black cone substituted for objects that could not be loaded.
    ///
    /// Radius 0.5, height 0.5, centred 0.5 above the object's origin.
    pub fn placeholder(name: &str) -> Self {
        Self::new(Renderable {
            name: name.to_string(),
            mesh: MeshId::PLACEHOLDER,
            bounds: Aabb::new(Vec3::new(-0.5, 0.25, -0.5), Vec3::new(0.5, 0.75, 0.5)),
            color: [0.0, 0.0, 0.0, 1.0],
            placeholder: true,
        })
    }

    pub fn is_placeholder(&self) -> bool {
        self.0.placeholder
    }

    /// True when both handles point at the same loaded object.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Deref for RenderableHandle {
    type Target = Renderable;

    fn deref(&self) -> &Renderable {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextureWrap {
    Clamp,
    Repeat,
}

/// A texture request. The pixels arrive asynchronously on the renderer side.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureHandle(Arc<TextureInfo>);

#[derive(Debug, Clone, PartialEq)]
pub struct TextureInfo {
    pub name: String,
    pub url: String,
    pub wrap_s: TextureWrap,
    pub wrap_t: TextureWrap,
}

impl TextureHandle {
    pub fn repeating(name: &str, url: String) -> Self {
        Self(Arc::new(TextureInfo {
            name: name.to_string(),
            url,
            wrap_s: TextureWrap::Repeat,
            wrap_t: TextureWrap::Repeat,
        }))
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Deref for TextureHandle {
    type Target = TextureInfo;

    fn deref(&self) -> &TextureInfo {
        &self.0
    }
}
