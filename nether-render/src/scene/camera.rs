//! Cameras, layers and frustum culling primitives

use glam::{Mat3, Mat4, Vec3, Vec4};

/// 32-slot visibility mask shared by nodes and cameras
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Layers(pub u32);

impl Default for Layers {
    fn default() -> Self {
        Layers(1)
    }
}

impl Layers {
    pub const ALL: Layers = Layers(u32::MAX);

    pub fn set(&mut self, layer: u32) {
        self.0 = 1 << (layer & 31);
    }

    pub fn enable(&mut self, layer: u32) {
        self.0 |= 1 << (layer & 31);
    }

    pub fn disable(&mut self, layer: u32) {
        self.0 &= !(1 << (layer & 31));
    }

    pub fn test(&self, other: Layers) -> bool {
        self.0 & other.0 != 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    /// Vertical field of view in degrees
    Perspective {
        fov: f32,
        aspect: f32,
        near: f32,
        far: f32,
    },
    Orthographic {
        left: f32,
        right: f32,
        top: f32,
        bottom: f32,
        near: f32,
        far: f32,
    },
}

/// A viewpoint: projection plus camera-to-world transform.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub projection: Projection,
    /// Camera-to-world transform
    pub world: Mat4,
    pub layers: Layers,
    /// Zoom factor applied to the projection
    pub zoom: f32,
}

impl Camera {
    pub fn perspective(fov: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            projection: Projection::Perspective {
                fov,
                aspect,
                near,
                far,
            },
            world: Mat4::IDENTITY,
            layers: Layers::default(),
            zoom: 1.0,
        }
    }

    pub fn orthographic(left: f32, right: f32, top: f32, bottom: f32, near: f32, far: f32) -> Self {
        Self {
            projection: Projection::Orthographic {
                left,
                right,
                top,
                bottom,
                near,
                far,
            },
            world: Mat4::IDENTITY,
            layers: Layers::default(),
            zoom: 1.0,
        }
    }

    /// Place the camera at `eye` looking towards `target`.
    pub fn look_at(&mut self, eye: Vec3, target: Vec3, up: Vec3) -> &mut Self {
        self.world = Mat4::look_at_rh(eye, target, up).inverse();
        self
    }

    pub fn with_position(mut self, eye: Vec3, target: Vec3) -> Self {
        self.look_at(eye, target, Vec3::Y);
        self
    }

    pub fn position(&self) -> Vec3 {
        self.world.w_axis.truncate()
    }

    pub fn view_matrix(&self) -> Mat4 {
        self.world.inverse()
    }

    pub fn is_perspective(&self) -> bool {
        matches!(self.projection, Projection::Perspective { .. })
    }

    pub fn near(&self) -> f32 {
        match self.projection {
            Projection::Perspective { near, .. } | Projection::Orthographic { near, .. } => near,
        }
    }

    pub fn far(&self) -> f32 {
        match self.projection {
            Projection::Perspective { far, .. } | Projection::Orthographic { far, .. } => far,
        }
    }

    pub fn set_aspect(&mut self, value: f32) {
        if let Projection::Perspective { aspect, .. } = &mut self.projection {
            *aspect = value;
        }
    }

    /// Projection to GL clip space (depth in -1..1).
    pub fn projection_matrix(&self) -> Mat4 {
        match self.projection {
            Projection::Perspective {
                fov,
                aspect,
                near,
                far,
            } => {
                let fov = 2.0 * ((fov.to_radians() * 0.5).tan() / self.zoom).atan();
                Mat4::perspective_rh_gl(fov, aspect, near, far)
            }
            Projection::Orthographic {
                left,
                right,
                top,
                bottom,
                near,
                far,
            } => {
                let cx = (right + left) * 0.5;
                let cy = (top + bottom) * 0.5;
                let dx = (right - left) / (2.0 * self.zoom);
                let dy = (top - bottom) / (2.0 * self.zoom);
                Mat4::orthographic_rh_gl(cx - dx, cx + dx, cy - dy, cy + dy, near, far)
            }
        }
    }

    /// Projection uploaded to shaders; maps near to 1 when `reversed`.
    pub fn shader_projection_matrix(&self, reversed: bool) -> Mat4 {
        let projection = self.projection_matrix();
        if !reversed {
            return projection;
        }
        // Remap clip z from [-w, w] to [w, 0]
        let remap = Mat4::from_cols(
            Vec4::X,
            Vec4::Y,
            Vec4::new(0.0, 0.0, -0.5, 0.0),
            Vec4::new(0.0, 0.0, 0.5, 1.0),
        );
        remap * projection
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }
}

/// Plane `normal · p + constant = 0`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    pub normal: Vec3,
    pub constant: f32,
}

impl Plane {
    pub fn new(normal: Vec3, constant: f32) -> Self {
        Self { normal, constant }
    }

    fn from_vec4(v: Vec4) -> Self {
        let length = v.truncate().length();
        let inv = if length > 0.0 { 1.0 / length } else { 0.0 };
        Self {
            normal: v.truncate() * inv,
            constant: v.w * inv,
        }
    }

    pub fn distance_to_point(&self, point: Vec3) -> f32 {
        self.normal.dot(point) + self.constant
    }

    /// Transform by `matrix`; `normal_matrix` is its inverse transpose.
    pub fn transformed(&self, matrix: &Mat4, normal_matrix: &Mat3) -> Self {
        let reference = matrix.transform_point3(self.normal * -self.constant);
        let normal = (*normal_matrix * self.normal).normalize_or_zero();
        Self {
            normal,
            constant: -reference.dot(normal),
        }
    }

    pub fn to_vec4(self) -> Vec4 {
        self.normal.extend(self.constant)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Sphere {
    pub center: Vec3,
    pub radius: f32,
}

impl Sphere {
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    pub fn transformed(&self, matrix: &Mat4) -> Self {
        let scale = matrix
            .x_axis
            .truncate()
            .length_squared()
            .max(matrix.y_axis.truncate().length_squared())
            .max(matrix.z_axis.truncate().length_squared())
            .sqrt();
        Self {
            center: matrix.transform_point3(self.center),
            radius: self.radius * scale,
        }
    }
}

/// Six clip planes extracted from a view-projection matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frustum {
    pub planes: [Plane; 6],
}

impl Default for Frustum {
    fn default() -> Self {
        Self::from_matrix(&Mat4::IDENTITY)
    }
}

impl Frustum {
    pub fn from_matrix(m: &Mat4) -> Self {
        let row = |i: usize| m.row(i);
        let (r0, r1, r2, r3) = (row(0), row(1), row(2), row(3));
        Self {
            planes: [
                Plane::from_vec4(r3 - r0),
                Plane::from_vec4(r3 + r0),
                Plane::from_vec4(r3 + r1),
                Plane::from_vec4(r3 - r1),
                Plane::from_vec4(r3 - r2),
                Plane::from_vec4(r3 + r2),
            ],
        }
    }

    pub fn intersects_sphere(&self, sphere: &Sphere) -> bool {
        self.planes
            .iter()
            .all(|plane| plane.distance_to_point(sphere.center) >= -sphere.radius)
    }

    pub fn contains_point(&self, point: Vec3) -> bool {
        self.planes
            .iter()
            .all(|plane| plane.distance_to_point(point) >= 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frustum_culls_sphere_behind_camera() {
        let camera = Camera::perspective(60.0, 1.0, 0.1, 100.0).with_position(Vec3::ZERO, -Vec3::Z);
        let frustum = Frustum::from_matrix(&camera.view_projection());
        assert!(frustum.intersects_sphere(&Sphere::new(Vec3::new(0.0, 0.0, -10.0), 1.0)));
        assert!(!frustum.intersects_sphere(&Sphere::new(Vec3::new(0.0, 0.0, 10.0), 1.0)));
        assert!(!frustum.intersects_sphere(&Sphere::new(Vec3::new(0.0, 0.0, -200.0), 1.0)));
    }

    #[test]
    fn test_layers() {
        let mut layers = Layers::default();
        assert!(layers.test(Layers(1)));
        layers.set(3);
        assert!(!layers.test(Layers(1)));
        layers.enable(0);
        assert!(layers.test(Layers(1)));
        assert!(Layers::ALL.test(layers));
    }

    #[test]
    fn test_plane_transform_preserves_distance() {
        let plane = Plane::new(Vec3::Y, -2.0);
        let matrix = Mat4::from_translation(Vec3::new(0.0, 3.0, 0.0));
        let normal_matrix = Mat3::from_mat4(matrix).inverse().transpose();
        let moved = plane.transformed(&matrix, &normal_matrix);
        assert!((moved.distance_to_point(Vec3::new(0.0, 5.0, 0.0))).abs() < 1e-5);
    }
}
