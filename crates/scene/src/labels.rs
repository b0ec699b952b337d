use std::collections::BTreeMap;

use glam::{Vec2, Vec3};
use lemuria_common::ObjectId;

/// Screen-space name tag of one tracked avatar.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelAnchor {
    pub id: ObjectId,
    pub text: String,
    /// Pixels from the top-left corner. Kept while hidden.
    pub screen: Vec2,
    pub visible: bool,
}

/// Every label the overlay should draw, keyed by entity.
#[derive(Debug, Clone, Default)]
pub struct LabelSet {
    anchors: BTreeMap<ObjectId, LabelAnchor>,
}

impl LabelSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a hidden label. Replaces the text of an existing one.
    pub fn insert(&mut self, id: ObjectId, text: impl Into<String>) {
        let text = text.into();
        self.anchors
            .entry(id)
            .and_modify(|a| a.text.clone_from(&text))
            .or_insert_with(|| LabelAnchor {
                id,
                text,
                screen: Vec2::ZERO,
                visible: false,
            });
    }

    pub fn remove(&mut self, id: ObjectId) -> Option<LabelAnchor> {
        self.anchors.remove(&id)
    }

    /// Position a label from its projected anchor.
    ///
    /// Visible only while `ndc.z < 1`. A hidden label keeps its last screen
    /// position. Depth alone decides: geometry in between does not hide it.
    /// An anchor in the camera plane projects to infinity and is hidden too.
    pub fn place(&mut self, id: ObjectId, ndc: Vec3, screen: Vec2) -> bool {
        let Some(anchor) = self.anchors.get_mut(&id) else {
            return false;
        };
        anchor.visible = ndc.is_finite() && ndc.z < 1.0;
        if anchor.visible {
            anchor.screen = screen;
        }
        anchor.visible
    }

    pub fn get(&self, id: ObjectId) -> Option<&LabelAnchor> {
        self.anchors.get(&id)
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.anchors.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &LabelAnchor> + '_ {
        self.anchors.values()
    }

    pub fn visible(&self) -> impl Iterator<Item = &LabelAnchor> + '_ {
        self.anchors.values().filter(|a| a.visible)
    }

    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    pub fn clear(&mut self) {
        self.anchors.clear();
    }
}
