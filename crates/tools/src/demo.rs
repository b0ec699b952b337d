//! A small self-contained world for the desktop app and the CLI.
//!
//! Assets come from an in-process loader that sizes and colours boxes by
//! name. Names starting with `missing` fail to load, so the placeholder path
//! is always on screen. Remote users walk circles and report their pose as
//! sparse snapshots.

use glam::Vec3;
use lemuria_assets::{AssetError, FnLoader, MeshId, Renderable, RenderableHandle};
use lemuria_common::{Aabb, ObjectId, ObjectKind, Orientation, Pose, Transform, WorldSnapshot};
use lemuria_scene::SceneCommand;

pub type DemoLoader = FnLoader<fn(&str) -> Result<RenderableHandle, AssetError>>;

pub fn demo_loader() -> DemoLoader {
    FnLoader(load_demo_asset as fn(&str) -> Result<RenderableHandle, AssetError>)
}

/// Resolve a demo asset by name.
pub fn load_demo_asset(name: &str) -> Result<RenderableHandle, AssetError> {
    if name.starts_with("missing") {
        return Err(AssetError::NotFound(name.to_string()));
    }
    let (size, color) = if name.starts_with("tree") {
        (Vec3::new(0.8, 3.0, 0.8), [0.2, 0.55, 0.2, 1.0])
    } else if name.starts_with("tracteur") {
        (Vec3::new(1.5, 1.2, 2.5), [0.8, 0.15, 0.1, 1.0])
    } else if name.starts_with("house") {
        (Vec3::new(4.0, 3.0, 5.0), [0.75, 0.7, 0.6, 1.0])
    } else {
        (Vec3::new(0.6, 1.8, 0.4), [0.2, 0.35, 0.8, 1.0])
    };
    let half = Vec3::new(size.x / 2.0, 0.0, size.z / 2.0);
    Ok(RenderableHandle::new(Renderable {
        name: name.to_string(),
        mesh: MeshId(fnv1a(name)),
        bounds: Aabb::new(-half, half + Vec3::Y * size.y),
        color,
        placeholder: false,
    }))
}

fn fnv1a(name: &str) -> u64 {
    name.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(0x0100_0000_01b3)
    })
}

/// Id of the demo tractor; it circles on its own through ambient motion.
pub const TRACTOR_ID: ObjectId = ObjectId(900);

#[derive(Debug, Clone, PartialEq)]
struct Wanderer {
    id: ObjectId,
    name: String,
    avatar: String,
    center: Vec3,
    radius: f32,
    /// Radians per second along the circle.
    speed: f32,
    phase: f32,
}

impl Wanderer {
    fn pose(&self, time: f32) -> Pose {
        let angle = self.phase + self.speed * time;
        let position = self.center + Vec3::new(angle.cos(), 0.0, angle.sin()) * self.radius;
        // tangent of the circle, as a yaw about +Y with -Z forward
        let heading = Vec3::new(-angle.sin(), 0.0, angle.cos()) * self.speed.signum();
        let yaw = (-heading.x).atan2(-heading.z);
        Pose::new(position, Orientation::new(yaw, 0.0, 0.0))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DemoWorld {
    grid: u32,
    wanderers: Vec<Wanderer>,
}

impl DemoWorld {
    /// A `grid`×`grid` forest and `users` remote users wearing `avatars` in turn.
    pub fn new(grid: u32, users: usize, avatars: &[String]) -> Self {
        let wanderers = (0..users)
            .map(|i| {
                let avatar = if avatars.is_empty() {
                    "andy.rwx".to_string()
                } else {
                    avatars[i % avatars.len()].clone()
                };
                Wanderer {
                    id: ObjectId(i as u64 + 1),
                    name: format!("guest{}", i + 1),
                    avatar,
                    center: Vec3::new(0.0, 0.0, -8.0),
                    radius: 3.0 + i as f32 * 1.5,
                    speed: if i % 2 == 0 { 0.4 } else { -0.3 },
                    phase: i as f32,
                }
            })
            .collect();
        Self { grid, wanderers }
    }

    pub fn users(&self) -> usize {
        self.wanderers.len()
    }

    /// Commands that build the world: props, a failing asset, the tractor and
    /// every remote user.
    pub fn populate(&self) -> Vec<SceneCommand> {
        let mut commands = Vec::new();
        let spacing = 4.0;
        let offset = (self.grid as f32 - 1.0) * spacing / 2.0;
        for row in 0..self.grid {
            for col in 0..self.grid {
                let id = ObjectId(1000 + u64::from(row * self.grid + col));
                let position = Vec3::new(
                    col as f32 * spacing - offset,
                    0.0,
                    -(row as f32 * spacing) - 20.0,
                );
                commands.push(SceneCommand::Spawn {
                    id,
                    asset: "tree.rwx".into(),
                    transform: Transform::from_position(position),
                });
            }
        }
        commands.push(SceneCommand::Spawn {
            id: ObjectId(950),
            asset: "house.rwx".into(),
            transform: Transform::from_position(Vec3::new(8.0, 0.0, -6.0)),
        });
        for i in 0..3u64 {
            commands.push(SceneCommand::Spawn {
                id: ObjectId(960 + i),
                asset: "missing_statue.rwx".into(),
                transform: Transform::from_position(Vec3::new(-6.0 + i as f32 * 2.0, 0.0, -4.0)),
            });
        }
        commands.push(SceneCommand::Spawn {
            id: TRACTOR_ID,
            asset: "tracteur1.rwx".into(),
            transform: Transform::from_position(Vec3::new(-8.0, 0.0, -10.0)),
        });
        for w in &self.wanderers {
            commands.push(SceneCommand::Track {
                id: w.id,
                name: w.name.clone(),
                avatar: w.avatar.clone(),
                pose: w.pose(0.0),
                labeled: true,
            });
        }
        commands
    }

    /// Where every user is at `time` seconds, as the transport would report it.
    pub fn snapshots(&self, time: f32) -> Vec<SceneCommand> {
        self.wanderers
            .iter()
            .map(|w| {
                let pose = w.pose(time);
                SceneCommand::Snapshot(WorldSnapshot {
                    object_id: w.id,
                    position: pose.position,
                    orientation: pose.orientation,
                    kind: ObjectKind::Avatar,
                })
            })
            .collect()
    }
}
