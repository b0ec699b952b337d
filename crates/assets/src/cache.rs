use std::collections::HashMap;

use futures::FutureExt;
use futures::future::{LocalBoxFuture, Shared};

use crate::handle::{RenderableHandle, TextureHandle};
use crate::loader::{AssetLoader, AssetPaths};

/// Pending or resolved object load. Every clone observes the same load.
pub type ObjectFuture = Shared<LocalBoxFuture<'static, RenderableHandle>>;

/// Single-flight cache of object loads keyed by name.
///
/// The first `get` for a name starts the load; every later `get` for that name
/// returns a clone of the same shared future, whether or not it has resolved.
/// A failed load resolves to [`RenderableHandle::placeholder`].
pub struct ObjectCache<L> {
    loader: L,
    entries: HashMap<String, ObjectFuture>,
}

impl<L: AssetLoader> ObjectCache<L> {
    pub fn new(loader: L) -> Self {
        Self {
            loader,
            entries: HashMap::new(),
        }
    }

    pub fn get(&mut self, name: &str) -> ObjectFuture {
        if let Some(pending) = self.entries.get(name) {
            return pending.clone();
        }

        tracing::debug!(asset = name, "loading object");
        let load = self.loader.load(name);
        let owned = name.to_string();
        let shared = async move {
            match load.await {
                Ok(handle) => handle,
                Err(e) => {
                    tracing::warn!(asset = %owned, error = %e, "object load failed, using placeholder");
                    RenderableHandle::placeholder(&owned)
                }
            }
        }
        .boxed_local()
        .shared();

        self.entries.insert(name.to_string(), shared.clone());
        shared
    }

    /// Resolved handle for `name`, if its load has already completed.
    pub fn peek(&self, name: &str) -> Option<RenderableHandle> {
        self.entries.get(name).and_then(|f| f.peek().cloned())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Forget every cached load. Loads already in flight still complete for
    /// whoever holds their future, but the result is not cached.
    pub fn invalidate_all(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    pub fn loader_mut(&mut self) -> &mut L {
        &mut self.loader
    }
}

/// Texture requests keyed by texture name, independent from object names.
#[derive(Debug, Default)]
pub struct TextureCache {
    entries: HashMap<String, TextureHandle>,
}

impl TextureCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&mut self, name: &str, paths: &AssetPaths) -> TextureHandle {
        self.entries
            .entry(name.to_string())
            .or_insert_with(|| TextureHandle::repeating(name, paths.texture_url(name)))
            .clone()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Every asset cache of one scene, cleared together.
pub struct AssetCaches<L> {
    paths: AssetPaths,
    objects: ObjectCache<L>,
    textures: TextureCache,
}

impl<L: AssetLoader> AssetCaches<L> {
    pub fn new(mut loader: L, paths: AssetPaths) -> Self {
        loader.set_paths(&paths);
        Self {
            paths,
            objects: ObjectCache::new(loader),
            textures: TextureCache::new(),
        }
    }

    pub fn paths(&self) -> &AssetPaths {
        &self.paths
    }

    /// Point the loader at another asset server. Cached entries stay.
    pub fn set_path(&mut self, base: impl Into<String>) {
        self.paths = AssetPaths::new(base);
        self.objects.loader_mut().set_paths(&self.paths);
    }

    pub fn object(&mut self, name: &str) -> ObjectFuture {
        self.objects.get(name)
    }

    pub fn texture(&mut self, name: &str) -> TextureHandle {
        self.textures.get(name, &self.paths)
    }

    pub fn objects(&self) -> &ObjectCache<L> {
        &self.objects
    }

    pub fn textures(&self) -> &TextureCache {
        &self.textures
    }

    /// Drop everything at once. There is no finer invalidation.
    pub fn clean_cache(&mut self) {
        tracing::info!(
            objects = self.objects.len(),
            textures = self.textures.len(),
            "clearing asset caches"
        );
        self.objects.invalidate_all();
        self.textures.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::{MeshId, Renderable};
    use crate::loader::AssetError;
    use futures::channel::oneshot;
    use futures::executor::block_on;
    use lemuria_common::Aabb;
    use std::cell::{Cell, RefCell};

    type Reply = oneshot::Sender<Result<RenderableHandle, AssetError>>;

    /// Loader whose loads stay pending until the test answers them.
    #[derive(Default)]
    struct PendingLoader {
        calls: Cell<usize>,
        replies: RefCell<Vec<(String, Reply)>>,
    }

    impl PendingLoader {
        fn answer(&self, result: impl Fn(&str) -> Result<RenderableHandle, AssetError>) {
            for (name, reply) in self.replies.borrow_mut().drain(..) {
                let _ = reply.send(result(&name));
            }
        }
    }

    impl AssetLoader for PendingLoader {
        fn load(&self, name: &str) -> LocalBoxFuture<'static, Result<RenderableHandle, AssetError>> {
            self.calls.set(self.calls.get() + 1);
            let (tx, rx) = oneshot::channel();
            self.replies.borrow_mut().push((name.to_string(), tx));
            async move {
                rx.await
                    .unwrap_or_else(|_| Err(AssetError::NotFound("dropped".into())))
            }
            .boxed_local()
        }
    }

    fn loaded(name: &str) -> Result<RenderableHandle, AssetError> {
        Ok(RenderableHandle::new(Renderable {
            name: name.to_string(),
            mesh: MeshId(1),
            bounds: Aabb::unit(),
            color: [1.0; 4],
            placeholder: false,
        }))
    }

    #[test]
    fn concurrent_gets_share_one_load() {
        let mut cache = ObjectCache::new(PendingLoader::default());
        let a = cache.get("x");
        let b = cache.get("x");
        assert!(a.ptr_eq(&b));
        assert_eq!(cache.loader().calls.get(), 1);

        cache.loader().answer(loaded);
        let ha = block_on(a);
        let hb = block_on(b);
        assert!(ha.ptr_eq(&hb));
        assert!(!ha.is_placeholder());
    }

    #[test]
    fn different_names_load_separately() {
        let mut cache = ObjectCache::new(PendingLoader::default());
        let a = cache.get("a.rwx");
        let b = cache.get("b.rwx");
        assert!(!a.ptr_eq(&b));
        assert_eq!(cache.loader().calls.get(), 2);
    }

    #[test]
    fn failure_resolves_to_placeholder() {
        let mut cache = ObjectCache::new(PendingLoader::default());
        let f = cache.get("broken.rwx");
        cache
            .loader()
            .answer(|name| Err(AssetError::Decode { name: name.into(), reason: "bad".into() }));
        let handle = block_on(f);
        assert!(handle.is_placeholder());
        assert_eq!(handle.name, "broken.rwx");
        // The placeholder is cached like any other result.
        assert!(cache.peek("broken.rwx").unwrap().is_placeholder());
        assert_eq!(cache.loader().calls.get(), 1);
    }

    #[test]
    fn peek_is_none_while_pending() {
        let mut cache = ObjectCache::new(PendingLoader::default());
        let f = cache.get("x");
        assert!(cache.peek("x").is_none());
        cache.loader().answer(loaded);
        block_on(f);
        assert!(cache.peek("x").is_some());
    }

    #[test]
    fn invalidate_all_lets_in_flight_loads_finish_uncached() {
        let mut cache = ObjectCache::new(PendingLoader::default());
        let stale = cache.get("x");
        cache.invalidate_all();
        assert!(cache.is_empty());

        let fresh = cache.get("x");
        assert!(!stale.ptr_eq(&fresh));
        assert_eq!(cache.loader().calls.get(), 2);

        cache.loader().answer(loaded);
        let old = block_on(stale);
        let new = block_on(fresh);
        assert!(!old.ptr_eq(&new));
        assert!(cache.peek("x").unwrap().ptr_eq(&new));
    }

    #[test]
    fn textures_and_objects_do_not_collide() {
        let mut caches = AssetCaches::new(PendingLoader::default(), AssetPaths::new("http://w"));
        let tex = caches.texture("stone");
        let _obj = caches.object("stone");
        assert_eq!(tex.url, "http://w/textures/stone");
        assert_eq!(caches.textures().len(), 1);
        assert_eq!(caches.objects().len(), 1);

        let again = caches.texture("stone");
        assert!(tex.ptr_eq(&again));
    }

    #[test]
    fn clean_cache_clears_both_namespaces() {
        let mut caches = AssetCaches::new(PendingLoader::default(), AssetPaths::default());
        caches.texture("t");
        caches.object("o");
        caches.clean_cache();
        assert!(caches.textures().is_empty());
        assert!(caches.objects().is_empty());
    }

    #[test]
    fn set_path_rebases_texture_urls() {
        let mut caches = AssetCaches::new(PendingLoader::default(), AssetPaths::default());
        caches.set_path("http://other");
        assert_eq!(caches.texture("sky.jpg").url, "http://other/textures/sky.jpg");
    }
}
