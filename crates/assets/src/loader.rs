use futures::FutureExt;
use futures::future::{self, LocalBoxFuture};

use crate::handle::RenderableHandle;

/// Errors a loader may report. They stop at the cache, which logs them and
/// hands out a placeholder instead.
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("asset not found: {0}")]
    NotFound(String),
    #[error("failed to decode {name}: {reason}")]
    Decode { name: String, reason: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Where object and texture files are served from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetPaths {
    base: String,
}

impl Default for AssetPaths {
    fn default() -> Self {
        Self::new("http://localhost")
    }
}

impl AssetPaths {
    pub fn new(base: impl Into<String>) -> Self {
        let base: String = base.into();
        Self {
            base: base.trim_end_matches('/').to_string(),
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn objects(&self) -> String {
        format!("{}/rwx", self.base)
    }

    pub fn textures(&self) -> String {
        format!("{}/textures", self.base)
    }

    pub fn texture_url(&self, name: &str) -> String {
        format!("{}/{name}", self.textures())
    }

    pub fn avatars(&self) -> String {
        format!("{}/avatars/avatars.dat", self.base)
    }
}

/// The black box that turns an object name into something drawable.
///
/// Implementations do their own I/O. The returned future is polled on the
/// scene thread, so it does not need to be `Send`.
pub trait AssetLoader {
    fn load(&self, name: &str) -> LocalBoxFuture<'static, Result<RenderableHandle, AssetError>>;

    /// Called when the asset base path changes.
    fn set_paths(&mut self, _paths: &AssetPaths) {}
}

/// Loader backed by a synchronous function; the future is ready immediately.
pub struct FnLoader<F>(pub F);

impl<F> AssetLoader for FnLoader<F>
where
    F: Fn(&str) -> Result<RenderableHandle, AssetError>,
{
    fn load(&self, name: &str) -> LocalBoxFuture<'static, Result<RenderableHandle, AssetError>> {
        future::ready((self.0)(name)).boxed_local()
    }
}
