use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box in a renderable's local space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for Aabb {
    fn default() -> Self {
        Self::unit()
    }
}

impl Aabb {
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Unit cube centred on the origin.
    pub const fn unit() -> Self {
        Self {
            min: Vec3::splat(-0.5),
            max: Vec3::splat(0.5),
        }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Matrix mapping the unit cube onto this box.
    pub fn unit_cube_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.size(), glam::Quat::IDENTITY, self.center())
    }

    pub fn corners(&self) -> [Vec3; 8] {
        let (a, b) = (self.min, self.max);
        [
            Vec3::new(b.x, b.y, b.z),
            Vec3::new(b.x, b.y, a.z),
            Vec3::new(b.x, a.y, b.z),
            Vec3::new(b.x, a.y, a.z),
            Vec3::new(a.x, b.y, a.z),
            Vec3::new(a.x, b.y, b.z),
            Vec3::new(a.x, a.y, a.z),
            Vec3::new(a.x, a.y, b.z),
        ]
    }

    /// The 12 edges of the box as segment endpoints.
    pub fn edges(&self) -> [[Vec3; 2]; 12] {
        let c = self.corners();
        [
            // +X face
            [c[0], c[1]],
            [c[1], c[3]],
            [c[3], c[2]],
            [c[2], c[0]],
            // -X face
            [c[5], c[4]],
            [c[4], c[6]],
            [c[6], c[7]],
            [c[7], c[5]],
            // edges joining the two faces
            [c[0], c[5]],
            [c[1], c[4]],
            [c[2], c[7]],
            [c[3], c[6]],
        ]
    }

    /// Slab test. Returns the ray parameter of the entry point, or of the
    /// origin when the ray starts inside the box.
    pub fn intersect(&self, ray: &Ray) -> Option<f32> {
        let inv = ray.direction.recip();
        let t1 = (self.min - ray.origin) * inv;
        let t2 = (self.max - ray.origin) * inv;
        let near = t1.min(t2).max_element();
        let far = t1.max(t2).min_element();
        if near.is_nan() || far.is_nan() || far < near.max(0.0) {
            return None;
        }
        Some(near.max(0.0))
    }
}

/// Half-line used for picking.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
        }
    }

    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    /// Distance along this ray to a box placed in the world by `model`.
    ///
    /// The ray is moved into the box's local space for the slab test; the
    /// returned distance is measured in world units. Degenerate matrices
    /// (released pool slots) never hit.
    pub fn hit_distance(&self, bounds: &Aabb, model: &Mat4) -> Option<f32> {
        if model.determinant().abs() <= f32::EPSILON {
            return None;
        }
        let inv = model.inverse();
        let local_origin = inv.transform_point3(self.origin);
        let local_dir = inv.transform_vector3(self.direction);
        let local = Ray {
            origin: local_origin,
            direction: local_dir,
        };
        let t = bounds.intersect(&local)?;
        let world_hit = model.transform_point3(local.at(t));
        Some(world_hit.distance(self.origin))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn ray_hits_unit_box_in_front() {
        let ray = Ray::new(Vec3::new(0.0, 0.0, 5.0), Vec3::NEG_Z);
        let t = Aabb::unit().intersect(&ray).unwrap();
        assert_relative_eq!(t, 4.5);
    }

    #[test]
    fn ray_misses_box_behind() {
        let ray = Ray::new(Vec3::new(0.0, 0.0, 5.0), Vec3::Z);
        assert!(Aabb::unit().intersect(&ray).is_none());
    }

    #[test]
    fn ray_parallel_outside_slab_misses() {
        let ray = Ray::new(Vec3::new(0.0, 2.0, 5.0), Vec3::NEG_Z);
        assert!(Aabb::unit().intersect(&ray).is_none());
    }

    #[test]
    fn hit_distance_respects_model_matrix() {
        let ray = Ray::new(Vec3::ZERO, Vec3::NEG_Z);
        let model = Mat4::from_scale_rotation_translation(
            Vec3::splat(2.0),
            glam::Quat::IDENTITY,
            Vec3::new(0.0, 0.0, -10.0),
        );
        let d = ray.hit_distance(&Aabb::unit(), &model).unwrap();
        assert_relative_eq!(d, 9.0, epsilon = 1e-4);
    }

    #[test]
    fn zero_matrix_never_hits() {
        let ray = Ray::new(Vec3::new(0.0, 0.0, 5.0), Vec3::NEG_Z);
        assert!(ray.hit_distance(&Aabb::unit(), &Mat4::ZERO).is_none());
    }

    #[test]
    fn edges_touch_every_corner_three_times() {
        let b = Aabb::unit();
        let edges = b.edges();
        for corner in b.corners() {
            let touches = edges
                .iter()
                .filter(|e| e[0] == corner || e[1] == corner)
                .count();
            assert_eq!(touches, 3);
        }
    }
}
