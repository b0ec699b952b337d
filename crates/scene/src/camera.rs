use glam::{EulerRot, Mat4, Quat, Vec2, Vec3};
use lemuria_common::{Pose, Ray};
use serde::{Deserialize, Serialize};

/// Lens and mounting of one camera.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraDescriptor {
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
    /// Mount point. The first-person camera is offset from the player; the
    /// third-person camera is offset from the first-person camera.
    pub offset: Vec3,
}

impl CameraDescriptor {
    pub fn first_person() -> Self {
        Self {
            fov_degrees: 75.0,
            near: 0.1,
            far: 1000.0,
            offset: Vec3::ZERO,
        }
    }

    pub fn third_person() -> Self {
        Self {
            offset: Vec3::new(0.0, 0.1, 0.6),
            ..Self::first_person()
        }
    }

    pub fn projection(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov_degrees.to_radians(), aspect, self.near, self.far)
    }
}

impl Default for CameraDescriptor {
    fn default() -> Self {
        Self::first_person()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraMode {
    #[default]
    FirstPerson,
    ThirdPerson,
}

impl CameraMode {
    pub fn toggled(self) -> Self {
        match self {
            CameraMode::FirstPerson => CameraMode::ThirdPerson,
            CameraMode::ThirdPerson => CameraMode::FirstPerson,
        }
    }
}

/// First- and third-person cameras riding on the player.
///
/// The rig holds no pose of its own: every query takes the player pose, so
/// switching cameras can never move the player.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraRig {
    first: CameraDescriptor,
    third: CameraDescriptor,
    active: CameraMode,
    width: u32,
    height: u32,
}

impl Default for CameraRig {
    fn default() -> Self {
        Self::new(
            CameraDescriptor::first_person(),
            CameraDescriptor::third_person(),
            1,
            1,
        )
    }
}

impl CameraRig {
    pub fn new(first: CameraDescriptor, third: CameraDescriptor, width: u32, height: u32) -> Self {
        Self {
            first,
            third,
            active: CameraMode::FirstPerson,
            width: width.max(1),
            height: height.max(1),
        }
    }

    pub fn active(&self) -> CameraMode {
        self.active
    }

    pub fn set_active(&mut self, mode: CameraMode) {
        self.active = mode;
    }

    /// Swap cameras. Returns the new active mode.
    pub fn toggle(&mut self) -> CameraMode {
        self.active = self.active.toggled();
        tracing::debug!(camera = ?self.active, "camera toggled");
        self.active
    }

    pub fn descriptor(&self, mode: CameraMode) -> &CameraDescriptor {
        match mode {
            CameraMode::FirstPerson => &self.first,
            CameraMode::ThirdPerson => &self.third,
        }
    }

    pub fn active_descriptor(&self) -> &CameraDescriptor {
        self.descriptor(self.active)
    }

    /// Height of the first-person camera above the player origin.
    pub fn set_camera_offset(&mut self, y: f32) {
        self.first.offset.y = y;
    }

    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.width = width.max(1);
        self.height = height.max(1);
    }

    pub fn viewport(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height as f32
    }

    /// Player rotation: yaw about Y, then pitch about X.
    pub fn rotation(pose: &Pose) -> Quat {
        Quat::from_euler(EulerRot::YXZ, pose.orientation.yaw, pose.orientation.pitch, 0.0)
    }

    /// World position of the active camera.
    pub fn eye(&self, pose: &Pose) -> Vec3 {
        let rotation = Self::rotation(pose);
        let first = pose.position + rotation * self.first.offset;
        match self.active {
            CameraMode::FirstPerson => first,
            CameraMode::ThirdPerson => first + rotation * self.third.offset,
        }
    }

    /// Direction the cameras look in. Both look down their local -Z.
    pub fn facing(&self, pose: &Pose) -> Vec3 {
        Self::rotation(pose) * Vec3::NEG_Z
    }

    pub fn view(&self, pose: &Pose) -> Mat4 {
        Mat4::from_rotation_translation(Self::rotation(pose), self.eye(pose)).inverse()
    }

    pub fn projection(&self) -> Mat4 {
        self.active_descriptor().projection(self.aspect())
    }

    pub fn view_projection(&self, pose: &Pose) -> Mat4 {
        self.projection() * self.view(pose)
    }

    /// World point to normalized device coordinates. `z >= 1` means behind
    /// the camera or past the far plane.
    pub fn project(&self, pose: &Pose, point: Vec3) -> Vec3 {
        self.view_projection(pose).project_point3(point)
    }

    /// Normalized device coordinates to window pixels, y down.
    pub fn ndc_to_screen(&self, ndc: Vec3) -> Vec2 {
        Vec2::new(
            (ndc.x + 1.0) / 2.0 * self.width as f32,
            -(ndc.y - 1.0) / 2.0 * self.height as f32,
        )
    }

    /// Window pixels to normalized device coordinates.
    pub fn pointer_to_ndc(&self, pointer: Vec2) -> Vec2 {
        Vec2::new(
            pointer.x / self.width as f32 * 2.0 - 1.0,
            -(pointer.y / self.height as f32) * 2.0 + 1.0,
        )
    }

    /// Ray from the active camera through a point given in NDC.
    pub fn ray_through(&self, pose: &Pose, ndc: Vec2) -> Ray {
        let inverse = self.view_projection(pose).inverse();
        let eye = self.eye(pose);
        let far = inverse.project_point3(ndc.extend(1.0));
        Ray::new(eye, far - eye)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use lemuria_common::Orientation;
    use std::f32::consts::FRAC_PI_2;

    fn rig() -> CameraRig {
        CameraRig::new(
            CameraDescriptor::first_person(),
            CameraDescriptor::third_person(),
            800,
            600,
        )
    }

    fn assert_vec_eq(a: Vec3, b: Vec3) {
        assert_relative_eq!(a.x, b.x, epsilon = 1e-4);
        assert_relative_eq!(a.y, b.y, epsilon = 1e-4);
        assert_relative_eq!(a.z, b.z, epsilon = 1e-4);
    }

    #[test]
    fn facing_follows_yaw() {
        let rig = rig();
        assert_vec_eq(rig.facing(&Pose::default()), Vec3::NEG_Z);
        let left = Pose::new(Vec3::ZERO, Orientation::new(FRAC_PI_2, 0.0, 0.0));
        assert_vec_eq(rig.facing(&left), Vec3::NEG_X);
        let up = Pose::new(Vec3::ZERO, Orientation::new(0.0, FRAC_PI_2, 0.0));
        assert_vec_eq(rig.facing(&up), Vec3::Y);
    }

    #[test]
    fn third_person_sits_behind_and_above() {
        let mut rig = rig();
        rig.set_camera_offset(1.5);
        let pose = Pose::at(Vec3::new(2.0, 0.0, 0.0));
        assert_vec_eq(rig.eye(&pose), Vec3::new(2.0, 1.5, 0.0));
        rig.toggle();
        assert_vec_eq(rig.eye(&pose), Vec3::new(2.0, 1.6, 0.6));
    }

    #[test]
    fn toggle_round_trips() {
        let mut rig = rig();
        assert_eq!(rig.toggle(), CameraMode::ThirdPerson);
        assert_eq!(rig.toggle(), CameraMode::FirstPerson);
    }

    #[test]
    fn point_ahead_projects_inside_the_frustum() {
        let rig = rig();
        let ndc = rig.project(&Pose::default(), Vec3::new(0.0, 0.0, -10.0));
        assert_relative_eq!(ndc.x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(ndc.y, 0.0, epsilon = 1e-5);
        assert!(ndc.z < 1.0);
        let screen = rig.ndc_to_screen(ndc);
        assert_relative_eq!(screen.x, 400.0, epsilon = 1e-3);
        assert_relative_eq!(screen.y, 300.0, epsilon = 1e-3);
    }

    #[test]
    fn point_behind_projects_past_the_far_plane() {
        let rig = rig();
        let ndc = rig.project(&Pose::default(), Vec3::new(0.0, 0.0, 10.0));
        assert!(ndc.z >= 1.0);
    }

    #[test]
    fn screen_corners() {
        let rig = rig();
        assert_eq!(rig.ndc_to_screen(Vec3::new(-1.0, 1.0, 0.0)), Vec2::new(0.0, 0.0));
        assert_eq!(rig.ndc_to_screen(Vec3::new(1.0, -1.0, 0.0)), Vec2::new(800.0, 600.0));
        assert_eq!(rig.pointer_to_ndc(Vec2::new(0.0, 0.0)), Vec2::new(-1.0, 1.0));
        assert_eq!(rig.pointer_to_ndc(Vec2::new(400.0, 300.0)), Vec2::ZERO);
    }

    #[test]
    fn centre_ray_matches_facing() {
        let rig = rig();
        let pose = Pose::new(Vec3::new(1.0, 2.0, 3.0), Orientation::new(0.4, -0.2, 0.0));
        let ray = rig.ray_through(&pose, Vec2::ZERO);
        assert_vec_eq(ray.origin, rig.eye(&pose));
        assert_vec_eq(ray.direction, rig.facing(&pose));
    }

    #[test]
    fn viewport_never_zero() {
        let mut rig = rig();
        rig.set_viewport(0, 0);
        assert_eq!(rig.viewport(), (1, 1));
        assert_eq!(rig.aspect(), 1.0);
    }
}
