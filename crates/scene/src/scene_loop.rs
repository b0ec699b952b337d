//! The frame tick and everything it owns.
//!
//! Handlers never touch scene state directly: they write [`InputState`]
//! through [`SceneLoop::input_mut`] and queue [`SceneCommand`]s. A tick drains
//! the queue, polls asset loads, moves the player and remote avatars, places
//! labels, resolves a pending pick and hands a [`Frame`] to the renderer.

use std::collections::{BTreeMap, VecDeque};
use std::f32::consts::PI;
use std::time::Instant;

use futures::FutureExt;
use glam::{Mat4, Vec3};
use lemuria_assets::{AssetCaches, AssetLoader, AssetPaths, ObjectFuture, RenderableHandle};
use lemuria_common::{ObjectId, ObjectKind, Orientation, Pose, Transform, UserRecord, WorldSnapshot};
use lemuria_input::InputState;
use lemuria_instancing::{PoolCapacities, PoolError, PoolRegistry};
use lemuria_render::{Background, Frame, RenderView, Renderer};

use crate::ambient::{Ambient, AmbientMotion};
use crate::camera::{CameraMode, CameraRig};
use crate::config::ClientConfig;
use crate::error::SceneError;
use crate::graph::{NodeKind, SKYBOX, SceneGraph, SceneNode};
use crate::interpolator::EntityInterpolator;
use crate::labels::LabelSet;
use crate::picker::{Hit, PickOutcome, Picker, Selection};
use crate::player::PlayerState;
use crate::scheduler::{FrameScheduler, TickToken};
use crate::session::{Session, SessionUser};

/// Avatar meshes are raised by this fraction of their height.
const AVATAR_LIFT: f32 = 0.6;

/// Scene mutation queued by a handler, applied at the start of the next tick.
#[derive(Debug, Clone, PartialEq)]
pub enum SceneCommand {
    /// Place an instance of `asset`. The pool is created once the asset loads.
    Spawn {
        id: ObjectId,
        asset: String,
        transform: Transform,
    },
    Move {
        id: ObjectId,
        transform: Transform,
    },
    Despawn {
        id: ObjectId,
    },
    /// Start interpolating a remote user.
    Track {
        id: ObjectId,
        name: String,
        avatar: String,
        pose: Pose,
        labeled: bool,
    },
    Snapshot(WorldSnapshot),
    /// Drop a remote user together with its avatar, label and pending load.
    Untrack {
        id: ObjectId,
    },
}

/// A spawn that resolved but found no room.
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnRejection {
    pub id: ObjectId,
    pub asset: String,
    pub error: PoolError,
}

/// What one tick did.
#[derive(Debug)]
pub struct TickReport<T> {
    pub tick: u64,
    /// Seconds simulated, after clamping.
    pub dt: f32,
    /// The only token the next tick will accept.
    pub next: TickToken,
    pub rejections: Vec<SpawnRejection>,
    pub pick: Option<PickOutcome>,
    pub output: T,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum PendingAction {
    Spawn(Transform),
    Avatar,
}

struct PendingLoad {
    id: ObjectId,
    asset: String,
    future: ObjectFuture,
    action: PendingAction,
}

/// A tracked remote user.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteEntity {
    pub name: String,
    pub avatar: String,
    pub interpolator: EntityInterpolator,
    /// Set once the avatar mesh has loaded.
    pub height: Option<f32>,
    pub labeled: bool,
}

pub struct SceneLoop<L> {
    config: ClientConfig,
    user: SessionUser,
    assets: AssetCaches<L>,
    pools: PoolRegistry,
    graph: SceneGraph,
    player: PlayerState,
    rig: CameraRig,
    input: InputState,
    remotes: BTreeMap<ObjectId, RemoteEntity>,
    labels: LabelSet,
    picker: Picker,
    selection: Selection,
    ambient: Ambient,
    scheduler: FrameScheduler,
    commands: VecDeque<SceneCommand>,
    pending: Vec<PendingLoad>,
    background: Background,
    ticks: u64,
}

impl<L: AssetLoader> SceneLoop<L> {
    /// Build the scene for the logged-in user and schedule its first tick.
    pub fn create_scene(
        session: &dyn Session,
        config: ClientConfig,
        viewport: (u32, u32),
        loader: L,
    ) -> Result<(Self, TickToken), SceneError> {
        let user = match session.current_user() {
            Some(user) if session.is_logged() => user,
            _ => return Err(SceneError::NotLoggedIn),
        };
        config.validate()?;

        let (width, height) = viewport;
        let capacities = PoolCapacities {
            default: config.pool_capacity,
            placeholder: config.placeholder_capacity,
        };
        let mut scheduler = FrameScheduler::new();
        let token = scheduler.start();

        let scene = Self {
            assets: AssetCaches::new(loader, AssetPaths::new(config.asset_base.clone())),
            pools: PoolRegistry::new(capacities),
            graph: SceneGraph::new(),
            player: PlayerState::default(),
            rig: CameraRig::new(config.first_person, config.third_person, width, height),
            input: InputState::new(),
            remotes: BTreeMap::new(),
            labels: LabelSet::new(),
            picker: Picker::new(config.pickable_suffix.clone()),
            selection: Selection::new(),
            ambient: Ambient::with_defaults(),
            scheduler,
            commands: VecDeque::new(),
            pending: Vec::new(),
            background: Background::default(),
            ticks: 0,
            user,
            config,
        };
        tracing::info!(user = %scene.user.name, width, height, "scene created");
        Ok((scene, token))
    }

    /// Run the tick scheduled under `token`, timing it against the previous one.
    pub fn tick<R: Renderer>(
        &mut self,
        token: TickToken,
        now: Instant,
        renderer: &mut R,
    ) -> Result<TickReport<R::Output>, SceneError> {
        self.scheduler.begin(token)?;
        let dt = self.scheduler.delta(now);
        Ok(self.run_tick(dt, renderer))
    }

    /// Run the tick scheduled under `token` with an explicit delta.
    pub fn advance<R: Renderer>(
        &mut self,
        token: TickToken,
        dt: f32,
        renderer: &mut R,
    ) -> Result<TickReport<R::Output>, SceneError> {
        self.scheduler.begin(token)?;
        Ok(self.run_tick(dt, renderer))
    }

    fn run_tick<R: Renderer>(&mut self, dt: f32, renderer: &mut R) -> TickReport<R::Output> {
        let _span = tracing::info_span!("scene_tick", tick = self.ticks).entered();
        let dt = dt.clamp(0.0, self.config.max_frame_delta);

        self.apply_commands();
        let rejections = self.poll_pending();

        self.animate_ambient();

        let facing = self.rig.facing(&self.player.pose());
        self.player
            .apply_input(&self.input, &self.config.movement, facing, dt);
        let pose = self.player.pose();
        self.graph.follow_player(Self::player_matrix(&pose));
        if let Some(sky) = self.graph.named(SKYBOX) {
            if let Some(node) = self.graph.get_mut(sky) {
                node.transform.position = pose.position;
            }
        }

        self.advance_remotes(dt);
        self.place_labels(&pose);

        let pick = self.input.take_pick().map(|pointer| {
            let ray = self.rig.ray_through(&pose, self.rig.pointer_to_ndc(pointer));
            let hit = self.picker.pick(&ray, &self.graph, &self.pools);
            let outcome = self.selection.toggle(hit);
            tracing::debug!(?outcome, "pick");
            outcome
        });
        self.follow_selection();

        let dirty = self.pools.drain_dirty();
        let items = self.graph.draw_items();
        let (width, height) = self.rig.viewport();
        let frame = Frame {
            tick: self.ticks,
            view: RenderView {
                view_proj: self.rig.view_projection(&pose),
                eye: self.rig.eye(&pose),
                width,
                height,
            },
            pools: &self.pools,
            dirty: &dirty,
            items: &items,
            background: &self.background,
            highlight: self.selection.edges(),
        };
        let output = renderer.render(&frame);

        let tick = self.ticks;
        self.ticks += 1;
        let next = self.scheduler.finish();
        tracing::trace!(
            tick,
            dt,
            instances = self.pools.instance_count(),
            nodes = self.graph.len(),
            pending = self.pending.len(),
            "tick done"
        );

        TickReport {
            tick,
            dt,
            next,
            rejections,
            pick,
            output,
        }
    }

    fn player_matrix(pose: &Pose) -> Mat4 {
        Mat4::from_rotation_translation(CameraRig::rotation(pose), pose.position)
    }

    fn apply_commands(&mut self) {
        while let Some(command) = self.commands.pop_front() {
            tracing::debug!(?command, "applying command");
            match command {
                SceneCommand::Spawn { id, asset, transform } => {
                    self.pending.retain(|load| load.id != id);
                    let future = self.assets.object(&asset);
                    self.pending.push(PendingLoad {
                        id,
                        asset,
                        future,
                        action: PendingAction::Spawn(transform),
                    });
                }
                SceneCommand::Move { id, transform } => self.move_object(id, transform),
                SceneCommand::Despawn { id } => self.despawn(id),
                SceneCommand::Track {
                    id,
                    name,
                    avatar,
                    pose,
                    labeled,
                } => self.track(id, name, avatar, pose, labeled),
                SceneCommand::Snapshot(snapshot) => self.apply_snapshot(snapshot),
                SceneCommand::Untrack { id } => self.untrack(id),
            }
        }
    }

    fn move_object(&mut self, id: ObjectId, transform: Transform) {
        if self.pools.contains(id) {
            // contains() was checked, move_to cannot miss
            let _ = self.pools.move_to(id, transform.to_matrix());
        } else if let Some(load) = self
            .pending
            .iter_mut()
            .find(|load| load.id == id && matches!(load.action, PendingAction::Spawn(_)))
        {
            load.action = PendingAction::Spawn(transform);
        } else if !self.graph.set_transform(id, transform) {
            tracing::debug!(%id, "move of unknown object ignored");
        }
    }

    fn despawn(&mut self, id: ObjectId) {
        if self.remotes.contains_key(&id) {
            self.untrack(id);
            return;
        }
        let before = self.pending.len();
        self.pending.retain(|load| load.id != id);
        let dropped_load = self.pending.len() != before;
        let pooled = self.pools.despawn(id).is_ok();
        let node = self.graph.remove(id).is_some();
        self.selection.forget(id);
        if !(dropped_load || pooled || node) {
            tracing::debug!(%id, "despawn of unknown object ignored");
        }
    }

    fn track(&mut self, id: ObjectId, name: String, avatar: String, pose: Pose, labeled: bool) {
        if let Some(remote) = self.remotes.get_mut(&id) {
            remote.interpolator.on_snapshot(pose);
            if labeled {
                self.labels.insert(id, name.clone());
            } else {
                self.labels.remove(id);
            }
            remote.labeled = labeled;
            remote.name = name;
            return;
        }

        if labeled {
            self.labels.insert(id, name.clone());
        }
        let future = self.assets.object(&avatar);
        self.pending.push(PendingLoad {
            id,
            asset: avatar.clone(),
            future,
            action: PendingAction::Avatar,
        });
        self.remotes.insert(
            id,
            RemoteEntity {
                name,
                avatar,
                interpolator: EntityInterpolator::new(pose),
                height: None,
                labeled,
            },
        );
    }

    fn apply_snapshot(&mut self, snapshot: WorldSnapshot) {
        let id = snapshot.object_id;
        if let Some(remote) = self.remotes.get_mut(&id) {
            remote.interpolator.on_snapshot(snapshot.pose());
            return;
        }
        match snapshot.kind {
            ObjectKind::Prop => self.move_object(id, Transform::from_pose(&snapshot.pose())),
            ObjectKind::Avatar => tracing::debug!(%id, "snapshot for untracked avatar ignored"),
        }
    }

    fn untrack(&mut self, id: ObjectId) {
        let remote = self.remotes.remove(&id);
        self.labels.remove(id);
        self.graph.remove(id);
        self.pending.retain(|load| load.id != id);
        self.selection.forget(id);
        if remote.is_none() {
            tracing::debug!(%id, "untrack of unknown user ignored");
        }
    }

    /// Apply every load that has resolved; keep the rest for a later tick.
    fn poll_pending(&mut self) -> Vec<SpawnRejection> {
        let mut rejections = Vec::new();
        for load in std::mem::take(&mut self.pending) {
            match load.future.clone().now_or_never() {
                Some(handle) => {
                    if let Some(rejection) = self.resolve(load.id, load.asset, load.action, handle) {
                        rejections.push(rejection);
                    }
                }
                None => self.pending.push(load),
            }
        }
        rejections
    }

    fn resolve(
        &mut self,
        id: ObjectId,
        asset: String,
        action: PendingAction,
        handle: RenderableHandle,
    ) -> Option<SpawnRejection> {
        match action {
            PendingAction::Spawn(transform) => {
                if let Err(error) = self.pools.ensure_pool(&asset, &handle) {
                    tracing::warn!(%id, asset = %asset, %error, "no pool for spawn");
                    return Some(SpawnRejection { id, asset, error });
                }
                match self.pools.spawn(&asset, id, transform.to_matrix()) {
                    Ok(slot) => {
                        tracing::debug!(%id, asset = %asset, %slot, "spawned");
                        None
                    }
                    Err(error) => {
                        tracing::warn!(%id, asset = %asset, %error, "spawn rejected");
                        Some(SpawnRejection { id, asset, error })
                    }
                }
            }
            PendingAction::Avatar => {
                let Some(remote) = self.remotes.get_mut(&id) else {
                    return None;
                };
                let height = handle.bounds.size().y;
                remote.height = Some(height);
                let transform = avatar_transform(&remote.interpolator.current(), height);
                self.graph
                    .insert(SceneNode::new(id, handle, transform, NodeKind::Avatar { height }));
                tracing::debug!(%id, avatar = %asset, height, "avatar loaded");
                None
            }
        }
    }

    fn animate_ambient(&mut self) {
        for (name, motion) in self.ambient.iter() {
            if let Some(id) = self.graph.named(name) {
                if let Some(node) = self.graph.get_mut(id) {
                    node.transform = motion.apply(&node.transform);
                }
            }
            let Some(pool) = self.pools.get(name) else {
                continue;
            };
            let moved: Vec<(ObjectId, Mat4)> = pool
                .iter()
                .map(|(id, _, model)| {
                    let transform = motion.apply(&Transform::from_matrix(model));
                    (id, transform.to_matrix())
                })
                .collect();
            for (id, model) in moved {
                let _ = self.pools.move_to(id, model);
            }
        }
    }

    fn advance_remotes(&mut self, dt: f32) {
        let duration = self.config.blend_duration;
        for (id, remote) in &mut self.remotes {
            let pose = remote.interpolator.advance(dt, duration);
            if let Some(height) = remote.height {
                self.graph.set_transform(*id, avatar_transform(&pose, height));
            }
        }
    }

    fn place_labels(&mut self, player: &Pose) {
        for (id, remote) in &self.remotes {
            let (true, Some(height)) = (remote.labeled, remote.height) else {
                continue;
            };
            let Some(node) = self.graph.get(*id) else {
                continue;
            };
            let anchor = node.transform.position + Vec3::Y * (height / 2.0);
            let ndc = self.rig.project(player, anchor);
            self.labels.place(*id, ndc, self.rig.ndc_to_screen(ndc));
        }
    }

    fn follow_selection(&mut self) {
        let Some(target) = self.selection.selected() else {
            return;
        };
        let model = self
            .graph
            .get(target)
            .map(SceneNode::model)
            .or_else(|| self.pools.transform(target));
        match model {
            Some(model) => {
                if let Some(highlight) = self.selection.highlight_mut() {
                    highlight.follow(&model);
                }
            }
            None => self.selection.clear(),
        }
    }

    /// Queue a command for the next tick. Ignored once torn down.
    pub fn enqueue(&mut self, command: SceneCommand) {
        if self.scheduler.is_cancelled() {
            tracing::debug!(?command, "scene torn down, command dropped");
            return;
        }
        self.commands.push_back(command);
    }

    pub fn input_mut(&mut self) -> &mut InputState {
        &mut self.input
    }

    pub fn input(&self) -> &InputState {
        &self.input
    }

    pub fn player_pose(&self) -> (Vec3, Orientation) {
        let pose = self.player.pose();
        (pose.position, pose.orientation)
    }

    pub fn set_player_pose(&mut self, pose: Pose) {
        self.player.set_pose(pose);
    }

    /// Make a scene node ride along with the player.
    pub fn attach_to_player(&mut self, id: ObjectId) -> bool {
        let player = Self::player_matrix(&self.player.pose());
        self.graph.attach(id, player)
    }

    pub fn set_camera_offset(&mut self, y: f32) {
        self.rig.set_camera_offset(y);
    }

    pub fn toggle_camera(&mut self) -> CameraMode {
        self.rig.toggle()
    }

    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.rig.set_viewport(width, height);
    }

    /// Select an object directly, as a pick on it would.
    pub fn select(&mut self, id: ObjectId) -> PickOutcome {
        let hit = self
            .graph
            .get(id)
            .map(|node| Hit {
                id,
                name: node.name().to_string(),
                distance: 0.0,
                bounds: node.renderable.bounds,
                model: node.model(),
            })
            .or_else(|| {
                let name = self.pools.pool_of(id)?;
                let pool = self.pools.get(name)?;
                Some(Hit {
                    id,
                    name: name.to_string(),
                    distance: 0.0,
                    bounds: pool.geometry().bounds,
                    model: pool.transform(id)?,
                })
            });
        self.selection.toggle(hit)
    }

    /// Add a single renderable outside the pools. Replaces a node with the same id.
    pub fn add_renderable(&mut self, id: ObjectId, renderable: RenderableHandle, transform: Transform) {
        self.graph
            .insert(SceneNode::new(id, renderable, transform, NodeKind::Prop));
    }

    /// Remove a node added through `add_renderable`. A tracked user's avatar
    /// goes with its interpolator and label.
    pub fn remove_renderable(&mut self, id: ObjectId) -> bool {
        if self.remotes.contains_key(&id) {
            let had_node = self.graph.contains(id);
            self.untrack(id);
            return had_node;
        }
        self.selection.forget(id);
        self.graph.remove(id).is_some()
    }

    /// Register the sky box. It follows the player position every tick.
    pub fn set_skybox(&mut self, id: ObjectId, renderable: RenderableHandle) {
        let transform = Transform::from_position(self.player.position());
        self.graph
            .insert(SceneNode::new(id, renderable, transform, NodeKind::Skybox));
        self.graph.name(SKYBOX, id);
    }

    /// Register a singleton node under `name`, e.g. for ambient motion.
    pub fn name_object(&mut self, name: impl Into<String>, id: ObjectId) {
        self.graph.name(name, id);
    }

    pub fn register_ambient(&mut self, name: impl Into<String>, motion: AmbientMotion) {
        self.ambient.register(name, motion);
    }

    pub fn set_background(&mut self, background: Background) {
        self.background = background;
    }

    /// Use a repeating texture from the asset server as background.
    pub fn set_background_texture(&mut self, name: &str) {
        self.background = Background::Texture(self.assets.texture(name));
    }

    pub fn background(&self) -> &Background {
        &self.background
    }

    pub fn set_asset_path(&mut self, base: impl Into<String>) {
        self.assets.set_path(base);
    }

    pub fn clean_cache(&mut self) {
        self.assets.clean_cache();
    }

    pub fn assets(&self) -> &AssetCaches<L> {
        &self.assets
    }

    /// Copy the blend state of a tracked user into its transport record.
    pub fn write_back(&self, record: &mut UserRecord) -> bool {
        match self.remotes.get(&record.id) {
            Some(remote) => {
                remote.interpolator.write_back(record);
                true
            }
            None => false,
        }
    }

    /// Cancel the next tick and drop everything a late callback could reach.
    pub fn teardown(&mut self) {
        if self.scheduler.is_cancelled() {
            return;
        }
        self.scheduler.cancel();
        self.input.clear();
        self.pending.clear();
        self.commands.clear();
        self.labels.clear();
        self.selection.clear();
        tracing::info!(user = %self.user.name, ticks = self.ticks, "scene torn down");
    }

    pub fn is_torn_down(&self) -> bool {
        self.scheduler.is_cancelled()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn user(&self) -> &SessionUser {
        &self.user
    }

    pub fn pools(&self) -> &PoolRegistry {
        &self.pools
    }

    pub fn graph(&self) -> &SceneGraph {
        &self.graph
    }

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn rig(&self) -> &CameraRig {
        &self.rig
    }

    pub fn remote(&self, id: ObjectId) -> Option<&RemoteEntity> {
        self.remotes.get(&id)
    }

    pub fn remotes(&self) -> impl Iterator<Item = (ObjectId, &RemoteEntity)> + '_ {
        self.remotes.iter().map(|(id, remote)| (*id, remote))
    }

    pub fn pending_loads(&self) -> usize {
        self.pending.len()
    }

    pub fn queued_commands(&self) -> usize {
        self.commands.len()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}

/// Where the avatar mesh of a user at `pose` is drawn. Avatar models face
/// backwards, so yaw is turned half a circle.
fn avatar_transform(pose: &Pose, height: f32) -> Transform {
    let o = pose.orientation;
    Transform::from_pose(&Pose::new(
        pose.position + Vec3::Y * (height * AVATAR_LIFT),
        Orientation::new(o.yaw + PI, o.pitch, o.roll),
    ))
}
