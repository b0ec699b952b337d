//! Asset boundary of the client.
//!
//! Decoding object and texture files happens elsewhere; this crate only sees
//! opaque [`RenderableHandle`]s coming back from an [`AssetLoader`]. The
//! caches guarantee that one name triggers one load, and that a failed load
//! still yields something drawable.
//!
//! # Invariants
//! - Load errors never cross the cache boundary.
//! - Object and texture names live in separate namespaces.

mod avatars;
mod cache;
mod handle;
mod loader;

pub use avatars::{AvatarCatalog, AvatarEntry};
pub use cache::{AssetCaches, ObjectCache, ObjectFuture, TextureCache};
pub use handle::{MeshId, Renderable, RenderableHandle, TextureHandle, TextureInfo, TextureWrap};
pub use loader::{AssetError, AssetLoader, AssetPaths, FnLoader};
