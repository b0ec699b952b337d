use std::fmt;

use glam::Vec3;
use lemuria_assets::AssetLoader;
use lemuria_common::{ObjectId, Orientation, Transform};
use lemuria_instancing::{PoolStats, Slot};
use lemuria_scene::{CameraMode, SceneLoop};

/// Scene inspector for developer tooling.
///
/// Read-only queries against a [`SceneLoop`] for the desktop side panel and
/// the CLI.
pub struct SceneInspector;

impl SceneInspector {
    pub fn summary<L: AssetLoader>(scene: &SceneLoop<L>) -> SceneSummary {
        let (position, orientation) = scene.player_pose();
        SceneSummary {
            tick: scene.ticks(),
            user: scene.user().name.clone(),
            camera: scene.rig().active(),
            player_position: position,
            player_orientation: orientation,
            pools: scene.pools().stats(),
            nodes: scene.graph().len(),
            remotes: scene.remotes().count(),
            visible_labels: scene.labels().visible().count(),
            pending_loads: scene.pending_loads(),
            selected: scene.selection().selected(),
        }
    }

    /// Where `id` lives and how it is placed.
    pub fn inspect_object<L: AssetLoader>(scene: &SceneLoop<L>, id: ObjectId) -> Option<ObjectInfo> {
        if let Some(node) = scene.graph().get(id) {
            return Some(ObjectInfo::new(
                id,
                ObjectSource::Node {
                    name: node.name().to_string(),
                },
                &node.transform,
            ));
        }
        let pool_name = scene.pools().pool_of(id)?;
        let pool = scene.pools().get(pool_name)?;
        let transform = Transform::from_matrix(&pool.transform(id)?);
        Some(ObjectInfo::new(
            id,
            ObjectSource::Pool {
                name: pool_name.to_string(),
                slot: pool.lookup(id)?,
            },
            &transform,
        ))
    }

    /// Every placed object: scene nodes first, then pool instances by pool name.
    pub fn list_objects<L: AssetLoader>(scene: &SceneLoop<L>) -> Vec<ObjectId> {
        let nodes = scene.graph().iter().map(|node| node.id);
        let instances = scene
            .pools()
            .iter()
            .flat_map(|(_, pool)| pool.iter().map(|(id, _, _)| id));
        nodes.chain(instances).collect()
    }
}

#[derive(Debug, Clone)]
pub struct SceneSummary {
    pub tick: u64,
    pub user: String,
    pub camera: CameraMode,
    pub player_position: Vec3,
    pub player_orientation: Orientation,
    pub pools: Vec<PoolStats>,
    pub nodes: usize,
    pub remotes: usize,
    pub visible_labels: usize,
    pub pending_loads: usize,
    pub selected: Option<ObjectId>,
}

impl SceneSummary {
    pub fn instance_count(&self) -> usize {
        self.pools.iter().map(|p| p.live).sum()
    }
}

impl fmt::Display for SceneSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let p = self.player_position;
        writeln!(
            f,
            "Scene: tick={} user={} camera={:?} instances={} nodes={} remotes={} labels={} pending={}",
            self.tick,
            self.user,
            self.camera,
            self.instance_count(),
            self.nodes,
            self.remotes,
            self.visible_labels,
            self.pending_loads,
        )?;
        write!(
            f,
            "Player: pos=({:.2}, {:.2}, {:.2}) yaw={:.2} pitch={:.2}",
            p.x, p.y, p.z, self.player_orientation.yaw, self.player_orientation.pitch
        )?;
        for pool in &self.pools {
            write!(
                f,
                "\n  {}: {}/{} draw={}{}",
                pool.name,
                pool.live,
                pool.capacity,
                pool.draw_count,
                if pool.placeholder { " (placeholder)" } else { "" }
            )?;
        }
        if let Some(id) = self.selected {
            write!(f, "\nSelected: {id}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ObjectSource {
    Node { name: String },
    Pool { name: String, slot: Slot },
}

/// Detailed info about a single object.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectInfo {
    pub id: ObjectId,
    pub source: ObjectSource,
    pub position: [f32; 3],
    pub rotation: [f32; 4],
    pub scale: [f32; 3],
}

impl ObjectInfo {
    fn new(id: ObjectId, source: ObjectSource, transform: &Transform) -> Self {
        let (p, r, s) = (transform.position, transform.rotation, transform.scale);
        Self {
            id,
            source,
            position: [p.x, p.y, p.z],
            rotation: [r.x, r.y, r.z, r.w],
            scale: [s.x, s.y, s.z],
        }
    }
}

impl fmt::Display for ObjectInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let source = match &self.source {
            ObjectSource::Node { name } => format!("node {name}"),
            ObjectSource::Pool { name, slot } => format!("pool {name} {slot}"),
        };
        write!(
            f,
            "Object {} ({source}) pos=({:.2}, {:.2}, {:.2}) scale=({:.2}, {:.2}, {:.2})",
            self.id,
            self.position[0],
            self.position[1],
            self.position[2],
            self.scale[0],
            self.scale[1],
            self.scale[2],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lemuria_assets::{AssetError, FnLoader, RenderableHandle};
    use lemuria_render::NullRenderer;
    use lemuria_scene::{ClientConfig, LocalSession, SceneCommand, TickToken};

    type Loader = FnLoader<fn(&str) -> Result<RenderableHandle, AssetError>>;

    fn placeholder(name: &str) -> Result<RenderableHandle, AssetError> {
        Ok(RenderableHandle::placeholder(name))
    }

    fn scene() -> (SceneLoop<Loader>, TickToken) {
        let session = LocalSession::logged_in("inspector");
        let loader: Loader = FnLoader(placeholder as fn(&str) -> Result<RenderableHandle, AssetError>);
        SceneLoop::create_scene(&session, ClientConfig::default(), (320, 200), loader).unwrap()
    }

    #[test]
    fn summary_empty_scene() {
        let (scene, _) = scene();
        let summary = SceneInspector::summary(&scene);
        assert_eq!(summary.tick, 0);
        assert_eq!(summary.instance_count(), 0);
        assert_eq!(summary.user, "inspector");
        assert_eq!(summary.camera, CameraMode::FirstPerson);
    }

    #[test]
    fn summary_counts_pools_and_nodes() {
        let (mut scene, token) = scene();
        scene.enqueue(SceneCommand::Spawn {
            id: ObjectId(1),
            asset: "pine.rwx".into(),
            transform: Transform::from_position(Vec3::new(1.0, 0.0, 2.0)),
        });
        scene.add_renderable(ObjectId(2), RenderableHandle::placeholder("sign.rwx"), Transform::default());
        scene.advance(token, 0.016, &mut NullRenderer).unwrap();

        let summary = SceneInspector::summary(&scene);
        assert_eq!(summary.tick, 1);
        assert_eq!(summary.instance_count(), 1);
        assert_eq!(summary.nodes, 1);
        assert!(summary.pools[0].placeholder);

        let text = summary.to_string();
        assert!(text.contains("tick=1"));
        assert!(text.contains("pine.rwx: 1/100 draw=1 (placeholder)"));
    }

    #[test]
    fn inspect_pool_instance_and_node() {
        let (mut scene, token) = scene();
        scene.enqueue(SceneCommand::Spawn {
            id: ObjectId(1),
            asset: "pine.rwx".into(),
            transform: Transform::from_position(Vec3::new(1.0, 2.0, 3.0)),
        });
        scene.add_renderable(ObjectId(2), RenderableHandle::placeholder("sign.rwx"), Transform::default());
        scene.advance(token, 0.016, &mut NullRenderer).unwrap();

        let info = SceneInspector::inspect_object(&scene, ObjectId(1)).unwrap();
        assert_eq!(
            info.source,
            ObjectSource::Pool {
                name: "pine.rwx".into(),
                slot: Slot(0)
            }
        );
        assert!((info.position[1] - 2.0).abs() < 1e-5);
        assert!(info.to_string().contains("pool pine.rwx slot"));

        let node = SceneInspector::inspect_object(&scene, ObjectId(2)).unwrap();
        assert_eq!(node.source, ObjectSource::Node { name: "sign.rwx".into() });
        assert!(SceneInspector::inspect_object(&scene, ObjectId(99)).is_none());

        assert_eq!(SceneInspector::list_objects(&scene), vec![ObjectId(2), ObjectId(1)]);
    }
}
