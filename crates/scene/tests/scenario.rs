//! End-to-end runs of the scene loop with real pools, caches and renderers.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use futures::FutureExt;
use futures::channel::oneshot;
use futures::future::LocalBoxFuture;
use glam::{Vec2, Vec3};
use lemuria_assets::{AssetError, AssetLoader, MeshId, Renderable, RenderableHandle};
use lemuria_common::{Aabb, ObjectId, ObjectKind, Orientation, Pose, Transform, WorldSnapshot};
use lemuria_instancing::{PoolError, Slot};
use lemuria_render::{DebugTextRenderer, NullRenderer};
use lemuria_scene::{
    ClientConfig, LocalSession, PickOutcome, SceneCommand, SceneError, SceneLoop, TickToken,
};

fn boxed(name: &str) -> RenderableHandle {
    RenderableHandle::new(Renderable {
        name: name.to_string(),
        mesh: MeshId(7),
        bounds: Aabb::unit(),
        color: [0.4, 0.3, 0.2, 1.0],
        placeholder: false,
    })
}

/// Loads stay pending until the test opens their gate.
#[derive(Clone, Default)]
struct GatedLoader {
    loads: Rc<Cell<usize>>,
    gates: Rc<RefCell<Vec<(String, oneshot::Sender<RenderableHandle>)>>>,
}

impl GatedLoader {
    fn open_all(&self) {
        for (name, gate) in self.gates.borrow_mut().drain(..) {
            // the receiver may be gone if the cache was cleared
            let _ = gate.send(boxed(&name));
        }
    }
}

impl AssetLoader for GatedLoader {
    fn load(&self, name: &str) -> LocalBoxFuture<'static, Result<RenderableHandle, AssetError>> {
        self.loads.set(self.loads.get() + 1);
        let (tx, rx) = oneshot::channel();
        self.gates.borrow_mut().push((name.to_string(), tx));
        let name = name.to_string();
        async move { rx.await.map_err(|_| AssetError::NotFound(name)) }.boxed_local()
    }
}

fn scene_with(config: ClientConfig) -> (SceneLoop<GatedLoader>, TickToken, GatedLoader) {
    let loader = GatedLoader::default();
    let session = LocalSession::logged_in("ada");
    let (scene, token) = SceneLoop::create_scene(&session, config, (640, 480), loader.clone())
        .expect("scene");
    (scene, token, loader)
}

fn spawn(id: u64, asset: &str, x: f32) -> SceneCommand {
    SceneCommand::Spawn {
        id: ObjectId(id),
        asset: asset.to_string(),
        transform: Transform::from_position(Vec3::new(x, 0.0, -4.0)),
    }
}

#[test]
fn capacity_two_pool_reuses_the_freed_slot() {
    let config = ClientConfig {
        pool_capacity: 2,
        ..ClientConfig::default()
    };
    let (mut scene, token, loader) = scene_with(config);

    scene.enqueue(spawn(1, "fence.rwx", 0.0));
    scene.enqueue(spawn(2, "fence.rwx", 2.0));
    scene.enqueue(spawn(3, "fence.rwx", 4.0));
    let report = scene.advance(token, 0.016, &mut NullRenderer).unwrap();
    assert!(report.rejections.is_empty());
    assert_eq!(scene.pending_loads(), 3);

    loader.open_all();
    let report = scene.advance(report.next, 0.016, &mut NullRenderer).unwrap();
    assert_eq!(report.rejections.len(), 1);
    assert_eq!(report.rejections[0].id, ObjectId(3));
    assert!(matches!(
        report.rejections[0].error,
        PoolError::Capacity { capacity: 2, .. }
    ));

    let pool = scene.pools().get("fence.rwx").unwrap();
    assert_eq!(pool.lookup(ObjectId(1)), Some(Slot(0)));
    assert_eq!(pool.lookup(ObjectId(2)), Some(Slot(1)));
    let before = pool.instances().to_vec();

    scene.enqueue(SceneCommand::Despawn { id: ObjectId(1) });
    scene.enqueue(spawn(3, "fence.rwx", 4.0));
    let report = scene.advance(report.next, 0.016, &mut NullRenderer).unwrap();
    assert!(report.rejections.is_empty());

    let pool = scene.pools().get("fence.rwx").unwrap();
    assert_eq!(pool.lookup(ObjectId(3)), Some(Slot(0)));
    assert_eq!(pool.lookup(ObjectId(1)), None);
    assert_eq!(pool.instances()[1], before[1]);
}

#[test]
fn one_load_per_asset_name() {
    let (mut scene, token, loader) = scene_with(ClientConfig::default());
    for id in 0..5 {
        scene.enqueue(spawn(id, "tree.rwx", id as f32));
    }
    let report = scene.advance(token, 0.016, &mut NullRenderer).unwrap();
    assert_eq!(loader.loads.get(), 1);
    assert_eq!(scene.pools().instance_count(), 0);

    loader.open_all();
    scene.advance(report.next, 0.016, &mut NullRenderer).unwrap();
    assert_eq!(loader.loads.get(), 1);
    assert_eq!(scene.pools().instance_count(), 5);
}

#[test]
fn clean_cache_forces_a_reload() {
    let (mut scene, token, loader) = scene_with(ClientConfig::default());
    scene.enqueue(spawn(1, "tree.rwx", 0.0));
    let report = scene.advance(token, 0.016, &mut NullRenderer).unwrap();
    loader.open_all();
    let report = scene.advance(report.next, 0.016, &mut NullRenderer).unwrap();

    scene.clean_cache();
    scene.enqueue(spawn(2, "tree.rwx", 1.0));
    scene.advance(report.next, 0.016, &mut NullRenderer).unwrap();
    assert_eq!(loader.loads.get(), 2);
}

#[test]
fn clean_pools_are_not_uploaded_again() {
    let (mut scene, token, loader) = scene_with(ClientConfig::default());
    let mut renderer = DebugTextRenderer::new();
    scene.enqueue(spawn(1, "rock.rwx", 0.0));
    let report = scene.advance(token, 0.016, &mut renderer).unwrap();
    loader.open_all();

    let report = scene.advance(report.next, 0.016, &mut renderer).unwrap();
    assert!(report.output.contains("pool rock.rwx: 1/1000 draw=1 [upload]"));
    assert_eq!(renderer.uploads(), 1);

    let report = scene.advance(report.next, 0.016, &mut renderer).unwrap();
    assert!(report.output.contains("pool rock.rwx: 1/1000 draw=1\n"));
    assert_eq!(renderer.uploads(), 1);
}

#[test]
fn untrack_removes_every_trace_of_a_user() {
    let (mut scene, token, loader) = scene_with(ClientConfig::default());
    scene.enqueue(SceneCommand::Track {
        id: ObjectId(42),
        name: "grace".into(),
        avatar: "grace.rwx".into(),
        pose: Pose::at(Vec3::new(0.0, 0.0, -3.0)),
        labeled: true,
    });
    let report = scene.advance(token, 0.016, &mut NullRenderer).unwrap();
    assert!(scene.remote(ObjectId(42)).is_some());
    assert!(scene.labels().contains(ObjectId(42)));
    assert_eq!(scene.pending_loads(), 1);

    scene.enqueue(SceneCommand::Untrack { id: ObjectId(42) });
    let report = scene.advance(report.next, 0.016, &mut NullRenderer).unwrap();
    assert!(scene.remote(ObjectId(42)).is_none());
    assert!(!scene.labels().contains(ObjectId(42)));
    assert_eq!(scene.pending_loads(), 0);

    // the avatar arriving late must not bring the node back
    loader.open_all();
    scene.advance(report.next, 0.016, &mut NullRenderer).unwrap();
    assert!(!scene.graph().contains(ObjectId(42)));
}

#[test]
fn remote_user_glides_to_its_snapshot() {
    let (mut scene, token, loader) = scene_with(ClientConfig::default());
    scene.enqueue(SceneCommand::Track {
        id: ObjectId(5),
        name: "linus".into(),
        avatar: "linus.rwx".into(),
        pose: Pose::at(Vec3::ZERO),
        labeled: false,
    });
    let report = scene.advance(token, 0.016, &mut NullRenderer).unwrap();
    loader.open_all();
    scene.enqueue(SceneCommand::Snapshot(WorldSnapshot {
        object_id: ObjectId(5),
        position: Vec3::new(10.0, 0.0, 0.0),
        orientation: Orientation::default(),
        kind: ObjectKind::Avatar,
    }));

    let report = scene.advance(report.next, 0.1, &mut NullRenderer).unwrap();
    let node = scene.graph().get(ObjectId(5)).unwrap();
    approx::assert_relative_eq!(node.transform.position.x, 5.0, epsilon = 1e-4);

    let report = scene.advance(report.next, 0.1, &mut NullRenderer).unwrap();
    let node = scene.graph().get(ObjectId(5)).unwrap();
    assert_eq!(node.transform.position.x, 10.0);

    scene.advance(report.next, 0.1, &mut NullRenderer).unwrap();
    let node = scene.graph().get(ObjectId(5)).unwrap();
    assert_eq!(node.transform.position.x, 10.0);
}

#[test]
fn despawning_the_selection_clears_it() {
    let (mut scene, token, loader) = scene_with(ClientConfig::default());
    scene.enqueue(SceneCommand::Spawn {
        id: ObjectId(8),
        asset: "chair.rwx".into(),
        transform: Transform::from_position(Vec3::new(0.0, 0.0, -4.0)),
    });
    let report = scene.advance(token, 0.016, &mut NullRenderer).unwrap();
    loader.open_all();

    scene.input_mut().request_pick(Vec2::new(320.0, 240.0));
    let report = scene.advance(report.next, 0.016, &mut NullRenderer).unwrap();
    assert!(matches!(
        report.pick,
        Some(PickOutcome::Selected { id: ObjectId(8), .. })
    ));

    scene.enqueue(SceneCommand::Despawn { id: ObjectId(8) });
    let mut renderer = DebugTextRenderer::new();
    let report = scene.advance(report.next, 0.016, &mut renderer).unwrap();
    assert_eq!(scene.selection().selected(), None);
    assert!(!report.output.contains("Highlight"));
}

#[test]
fn tokens_are_single_use() {
    let (mut scene, token, _) = scene_with(ClientConfig::default());
    let report = scene.advance(token, 0.016, &mut NullRenderer).unwrap();
    assert!(matches!(
        scene.advance(token, 0.016, &mut NullRenderer),
        Err(SceneError::StaleToken)
    ));
    assert!(scene.advance(report.next, 0.016, &mut NullRenderer).is_ok());
}

#[test]
fn teardown_rejects_ticks_and_survives_late_loads() {
    let (mut scene, token, loader) = scene_with(ClientConfig::default());
    scene.enqueue(spawn(1, "barn.rwx", 0.0));
    let report = scene.advance(token, 0.016, &mut NullRenderer).unwrap();
    scene.input_mut().handle_key("ArrowUp", true);

    scene.teardown();
    assert!(scene.is_torn_down());
    assert!(!scene.input().any_pressed());
    assert_eq!(scene.pending_loads(), 0);

    loader.open_all();
    assert!(matches!(
        scene.advance(report.next, 0.016, &mut NullRenderer),
        Err(SceneError::TornDown)
    ));
    scene.enqueue(spawn(2, "barn.rwx", 1.0));
    assert_eq!(scene.queued_commands(), 0);
    assert_eq!(scene.pools().instance_count(), 0);
}

#[test]
fn camera_toggle_keeps_the_player_still() {
    let (mut scene, token, _) = scene_with(ClientConfig::default());
    scene.input_mut().handle_key("ArrowLeft", true);
    let report = scene.advance(token, 0.016, &mut NullRenderer).unwrap();
    let before = scene.player_pose();

    scene.toggle_camera();
    scene.input_mut().handle_key("ArrowLeft", false);
    let mut renderer = DebugTextRenderer::new();
    let report = scene.advance(report.next, 0.016, &mut renderer).unwrap();
    assert_eq!(scene.player_pose(), before);
    // the third-person eye sits behind and above the player
    assert!(report.output.contains("Camera: eye=("));
    assert!(scene.rig().eye(&Pose::new(before.0, before.1)).y > 0.0);
}
