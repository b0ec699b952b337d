//! Scene nodes that are not pool instances: avatars, attached props, the skybox.
//!
//! Nodes are stored in BTreeMaps keyed by [`ObjectId`] so draw and pick order
//! is deterministic. Singletons are found through a name-keyed side table that
//! whoever adds them keeps up to date; nothing scans nodes by name.

use std::collections::{BTreeMap, HashMap};

use glam::Mat4;
use lemuria_assets::RenderableHandle;
use lemuria_common::{ObjectId, Transform};
use lemuria_render::DrawItem;

/// Side-table name of the sky box.
pub const SKYBOX: &str = "skybox";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NodeKind {
    Prop,
    /// A remote user; `height` comes from the avatar's bounds.
    Avatar { height: f32 },
    Skybox,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneNode {
    pub id: ObjectId,
    pub renderable: RenderableHandle,
    pub transform: Transform,
    pub kind: NodeKind,
}

impl SceneNode {
    pub fn new(id: ObjectId, renderable: RenderableHandle, transform: Transform, kind: NodeKind) -> Self {
        Self {
            id,
            renderable,
            transform,
            kind,
        }
    }

    pub fn name(&self) -> &str {
        &self.renderable.name
    }

    pub fn model(&self) -> Mat4 {
        self.transform.to_matrix()
    }
}

#[derive(Debug, Clone, Default)]
pub struct SceneGraph {
    nodes: BTreeMap<ObjectId, SceneNode>,
    names: HashMap<String, ObjectId>,
    /// Node transforms relative to the player, for nodes riding on it.
    attached: BTreeMap<ObjectId, Mat4>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a node. Returns the node it replaced.
    pub fn insert(&mut self, node: SceneNode) -> Option<SceneNode> {
        tracing::debug!(id = %node.id, name = node.name(), "scene node added");
        self.nodes.insert(node.id, node)
    }

    /// Remove a node along with its side-table names and player attachment.
    pub fn remove(&mut self, id: ObjectId) -> Option<SceneNode> {
        let node = self.nodes.remove(&id)?;
        self.attached.remove(&id);
        self.names.retain(|_, named| *named != id);
        tracing::debug!(%id, "scene node removed");
        Some(node)
    }

    pub fn get(&self, id: ObjectId) -> Option<&SceneNode> {
        self.nodes.get(&id)
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut SceneNode> {
        self.nodes.get_mut(&id)
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn set_transform(&mut self, id: ObjectId, transform: Transform) -> bool {
        match self.nodes.get_mut(&id) {
            Some(node) => {
                node.transform = transform;
                true
            }
            None => false,
        }
    }

    /// Register `id` under a singleton name, replacing any previous holder.
    pub fn name(&mut self, name: impl Into<String>, id: ObjectId) {
        self.names.insert(name.into(), id);
    }

    pub fn unname(&mut self, name: &str) -> Option<ObjectId> {
        self.names.remove(name)
    }

    pub fn named(&self, name: &str) -> Option<ObjectId> {
        self.names.get(name).copied()
    }

    /// Make a node ride on the player, keeping its current world transform.
    pub fn attach(&mut self, id: ObjectId, player: Mat4) -> bool {
        let Some(node) = self.nodes.get(&id) else {
            return false;
        };
        let local = player.inverse() * node.model();
        self.attached.insert(id, local);
        true
    }

    pub fn detach(&mut self, id: ObjectId) -> bool {
        self.attached.remove(&id).is_some()
    }

    pub fn is_attached(&self, id: ObjectId) -> bool {
        self.attached.contains_key(&id)
    }

    /// Move every attached node with the player.
    pub fn follow_player(&mut self, player: Mat4) {
        for (id, local) in &self.attached {
            if let Some(node) = self.nodes.get_mut(id) {
                node.transform = Transform::from_matrix(&(player * *local));
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &SceneNode> + '_ {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn draw_items(&self) -> Vec<DrawItem> {
        self.nodes
            .values()
            .map(|node| DrawItem {
                id: node.id,
                renderable: node.renderable.clone(),
                model: node.model(),
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.names.clear();
        self.attached.clear();
    }
}
