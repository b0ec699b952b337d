use glam::{Mat4, Vec3};
use lemuria_common::{Aabb, ObjectId, Ray};
use lemuria_instancing::PoolRegistry;

use crate::graph::SceneGraph;

/// Nearest pickable object under a ray.
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub id: ObjectId,
    pub name: String,
    pub distance: f32,
    pub bounds: Aabb,
    pub model: Mat4,
}

/// Casts pick rays against scene nodes and pool instances.
#[derive(Debug, Clone)]
pub struct Picker {
    suffix: String,
}

impl Default for Picker {
    fn default() -> Self {
        Self::new(".rwx")
    }
}

impl Picker {
    pub fn new(suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
        }
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    pub fn matches(&self, name: &str) -> bool {
        name.ends_with(&self.suffix)
    }

    /// Nearest hit whose name passes the suffix filter.
    pub fn pick(&self, ray: &Ray, graph: &SceneGraph, pools: &PoolRegistry) -> Option<Hit> {
        let nodes = graph
            .iter()
            .filter(|node| self.matches(node.name()))
            .map(|node| (node.id, node.name(), node.renderable.bounds, node.model()));

        let instances = pools
            .iter()
            .filter(|(name, _)| self.matches(name))
            .flat_map(|(name, pool)| {
                let bounds = pool.geometry().bounds;
                pool.iter().map(move |(id, _, model)| (id, name, bounds, *model))
            });

        nodes
            .chain(instances)
            .filter_map(|(id, name, bounds, model)| {
                ray.hit_distance(&bounds, &model).map(|distance| Hit {
                    id,
                    name: name.to_string(),
                    distance,
                    bounds,
                    model,
                })
            })
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
    }
}

/// Wireframe box around the selected object.
#[derive(Debug, Clone, PartialEq)]
pub struct Highlight {
    target: ObjectId,
    name: String,
    bounds: Aabb,
    edges: Vec<[Vec3; 2]>,
}

impl Highlight {
    pub fn new(hit: &Hit) -> Self {
        let mut highlight = Self {
            target: hit.id,
            name: hit.name.clone(),
            bounds: hit.bounds,
            edges: Vec::with_capacity(12),
        };
        highlight.follow(&hit.model);
        highlight
    }

    pub fn target(&self) -> ObjectId {
        self.target
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// World-space edges, twelve of them.
    pub fn edges(&self) -> &[[Vec3; 2]] {
        &self.edges
    }

    /// Re-place the wireframe on the target's current transform.
    pub fn follow(&mut self, model: &Mat4) {
        self.edges.clear();
        self.edges.extend(
            self.bounds
                .edges()
                .iter()
                .map(|[a, b]| [model.transform_point3(*a), model.transform_point3(*b)]),
        );
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PickOutcome {
    Selected { id: ObjectId, name: String, distance: f32 },
    /// The highlighted object was picked again and is now deselected.
    Deselected(ObjectId),
    Miss,
}

/// At most one highlight. Replacing or clearing it drops its geometry.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    current: Option<Highlight>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a pick. The old highlight is always dropped first; picking the
    /// same object again leaves nothing selected.
    pub fn toggle(&mut self, hit: Option<Hit>) -> PickOutcome {
        let previous = self.current.take().map(|h| h.target());
        match hit {
            Some(hit) if previous == Some(hit.id) => PickOutcome::Deselected(hit.id),
            Some(hit) => {
                self.current = Some(Highlight::new(&hit));
                PickOutcome::Selected {
                    id: hit.id,
                    name: hit.name,
                    distance: hit.distance,
                }
            }
            None => PickOutcome::Miss,
        }
    }

    pub fn highlight(&self) -> Option<&Highlight> {
        self.current.as_ref()
    }

    pub fn highlight_mut(&mut self) -> Option<&mut Highlight> {
        self.current.as_mut()
    }

    pub fn selected(&self) -> Option<ObjectId> {
        self.current.as_ref().map(Highlight::target)
    }

    pub fn edges(&self) -> &[[Vec3; 2]] {
        self.current.as_ref().map_or(&[], |h| h.edges())
    }

    /// Clear the highlight if it belongs to `id`.
    pub fn forget(&mut self, id: ObjectId) -> bool {
        if self.selected() == Some(id) {
            self.current = None;
            true
        } else {
            false
        }
    }

    pub fn clear(&mut self) {
        self.current = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{NodeKind, SceneNode};
    use lemuria_assets::RenderableHandle;
    use lemuria_common::Transform;
    use lemuria_instancing::PoolCapacities;

    fn ray_down_z() -> Ray {
        Ray::new(Vec3::new(0.0, 0.5, 10.0), Vec3::NEG_Z)
    }

    fn graph_with(name: &str, id: u64, z: f32) -> SceneGraph {
        let mut graph = SceneGraph::new();
        graph.insert(SceneNode::new(
            ObjectId(id),
            RenderableHandle::placeholder(name),
            Transform::from_position(Vec3::new(0.0, 0.0, z)),
            NodeKind::Prop,
        ));
        graph
    }

    #[test]
    fn nearest_hit_wins() {
        let mut graph = graph_with("far.rwx", 1, -5.0);
        graph.insert(SceneNode::new(
            ObjectId(2),
            RenderableHandle::placeholder("near.rwx"),
            Transform::from_position(Vec3::new(0.0, 0.0, 2.0)),
            NodeKind::Prop,
        ));
        let hit = Picker::default()
            .pick(&ray_down_z(), &graph, &PoolRegistry::default())
            .unwrap();
        assert_eq!(hit.id, ObjectId(2));
        assert_eq!(hit.name, "near.rwx");
        approx::assert_relative_eq!(hit.distance, 7.5, epsilon = 1e-4);
    }

    #[test]
    fn suffix_filter_skips_other_names() {
        let graph = graph_with("avatar.dat", 1, 0.0);
        assert!(Picker::default()
            .pick(&ray_down_z(), &graph, &PoolRegistry::default())
            .is_none());
    }

    #[test]
    fn pool_instances_are_pickable() {
        let mut pools = PoolRegistry::new(PoolCapacities::default());
        let cone = RenderableHandle::placeholder("tree.rwx");
        pools.ensure_pool("tree.rwx", &cone).unwrap();
        pools
            .spawn("tree.rwx", ObjectId(5), Mat4::from_translation(Vec3::new(0.0, 0.0, -1.0)))
            .unwrap();
        pools.spawn("tree.rwx", ObjectId(6), Mat4::from_translation(Vec3::X * 50.0)).unwrap();

        let hit = Picker::default()
            .pick(&ray_down_z(), &SceneGraph::new(), &pools)
            .unwrap();
        assert_eq!(hit.id, ObjectId(5));

        // despawned instances drop out of picking
        pools.despawn(ObjectId(5)).unwrap();
        assert!(Picker::default()
            .pick(&ray_down_z(), &SceneGraph::new(), &pools)
            .is_none());
    }

    fn hit(id: u64) -> Hit {
        Hit {
            id: ObjectId(id),
            name: "box.rwx".into(),
            distance: 1.0,
            bounds: Aabb::unit(),
            model: Mat4::from_translation(Vec3::new(id as f32, 0.0, 0.0)),
        }
    }

    #[test]
    fn highlight_has_twelve_world_edges() {
        let h = Highlight::new(&hit(3));
        assert_eq!(h.edges().len(), 12);
        for [a, b] in h.edges() {
            assert!(a.x >= 2.5 && a.x <= 3.5);
            assert!(b.x >= 2.5 && b.x <= 3.5);
        }
    }

    #[test]
    fn repick_same_object_toggles_off() {
        let mut selection = Selection::new();
        assert!(matches!(selection.toggle(Some(hit(1))), PickOutcome::Selected { .. }));
        assert_eq!(selection.toggle(Some(hit(1))), PickOutcome::Deselected(ObjectId(1)));
        assert_eq!(selection.selected(), None);
        assert!(selection.edges().is_empty());
    }

    #[test]
    fn picking_another_object_replaces_the_highlight() {
        let mut selection = Selection::new();
        selection.toggle(Some(hit(1)));
        selection.toggle(Some(hit(2)));
        assert_eq!(selection.selected(), Some(ObjectId(2)));
        assert_eq!(selection.edges().len(), 12);
    }

    #[test]
    fn miss_clears_the_highlight() {
        let mut selection = Selection::new();
        selection.toggle(Some(hit(1)));
        assert_eq!(selection.toggle(None), PickOutcome::Miss);
        assert_eq!(selection.selected(), None);
    }

    #[test]
    fn forget_only_matches_the_target() {
        let mut selection = Selection::new();
        selection.toggle(Some(hit(1)));
        assert!(!selection.forget(ObjectId(2)));
        assert!(selection.forget(ObjectId(1)));
        assert!(selection.highlight().is_none());
    }
}
