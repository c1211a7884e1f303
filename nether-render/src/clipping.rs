//! User clipping planes
//!
//! Global planes apply to every draw; local planes come from the material and
//! only apply when local clipping is enabled. Planes are uploaded in view
//! space, globals first. The trailing `num_intersection` planes are combined
//! by intersection instead of union.

use glam::{Mat3, Mat4, Vec4};

use crate::scene::{Material, Plane};

#[derive(Debug, Clone, Default)]
pub struct ClippingState {
    global: Vec<Plane>,
    local_enabled: bool,
    rendering_shadows: bool,
    planes: Vec<Vec4>,
    num_planes: u32,
    num_intersection: u32,
}

impl ClippingState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_global_planes(&mut self, planes: Vec<Plane>) {
        self.global = planes;
    }

    pub fn global_planes(&self) -> &[Plane] {
        &self.global
    }

    pub fn set_local_enabled(&mut self, enabled: bool) {
        self.local_enabled = enabled;
    }

    pub fn local_enabled(&self) -> bool {
        self.local_enabled
    }

    /// Shadow passes drop global planes and keep only local planes of
    /// materials with `clip_shadows`.
    pub fn begin_shadows(&mut self) {
        self.rendering_shadows = true;
    }

    pub fn end_shadows(&mut self) {
        self.rendering_shadows = false;
    }

    /// Plane counts a material will be drawn with; feeds program selection.
    pub fn counts_for(&self, material: &Material) -> (u32, u32) {
        let global = if self.rendering_shadows {
            0
        } else {
            self.global.len() as u32
        };
        let local = self.local_planes(material).len() as u32;
        let intersection = if material.clip_intersection { local } else { 0 };
        (global + local, intersection)
    }

    /// Compute the view-space planes for `material`.
    pub fn set_state(&mut self, material: &Material, view: &Mat4) -> &[Vec4] {
        let normal_matrix = Mat3::from_mat4(*view).inverse().transpose();
        self.planes.clear();
        if !self.rendering_shadows {
            self.planes.extend(
                self.global
                    .iter()
                    .map(|p| p.transformed(view, &normal_matrix).to_vec4()),
            );
        }
        let local = self.local_planes(material);
        self.planes.extend(
            local
                .iter()
                .map(|p| p.transformed(view, &normal_matrix).to_vec4()),
        );
        self.num_planes = self.planes.len() as u32;
        self.num_intersection = if material.clip_intersection {
            local.len() as u32
        } else {
            0
        };
        &self.planes
    }

    fn local_planes<'m>(&self, material: &'m Material) -> &'m [Plane] {
        if self.local_enabled && (!self.rendering_shadows || material.clip_shadows) {
            &material.clipping_planes
        } else {
            &[]
        }
    }

    pub fn planes(&self) -> &[Vec4] {
        &self.planes
    }

    pub fn num_planes(&self) -> u32 {
        self.num_planes
    }

    pub fn num_intersection(&self) -> u32 {
        self.num_intersection
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn clipped_material() -> Material {
        let mut material = Material::default();
        material.clipping_planes = vec![Plane::new(Vec3::X, 0.0), Plane::new(Vec3::Y, 1.0)];
        material
    }

    #[test]
    fn test_local_planes_need_local_clipping() {
        let mut clipping = ClippingState::new();
        let material = clipped_material();
        assert_eq!(clipping.counts_for(&material), (0, 0));

        clipping.set_local_enabled(true);
        assert_eq!(clipping.counts_for(&material), (2, 0));
    }

    #[test]
    fn test_globals_come_first() {
        let mut clipping = ClippingState::new();
        clipping.set_global_planes(vec![Plane::new(Vec3::Z, 5.0)]);
        clipping.set_local_enabled(true);
        let planes = clipping.set_state(&clipped_material(), &Mat4::IDENTITY).to_vec();
        assert_eq!(planes.len(), 3);
        assert_eq!(planes[0], Vec4::new(0.0, 0.0, 1.0, 5.0));
    }

    #[test]
    fn test_planes_move_to_view_space() {
        let mut clipping = ClippingState::new();
        clipping.set_global_planes(vec![Plane::new(Vec3::X, 0.0)]);
        // Camera at x = 2 looking down -Z: world x = 0 is view x = -2
        let view = Mat4::from_translation(Vec3::new(-2.0, 0.0, 0.0));
        let planes = clipping.set_state(&Material::default(), &view);
        assert!((planes[0].w - 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_intersection_counts_local_planes() {
        let mut clipping = ClippingState::new();
        clipping.set_local_enabled(true);
        clipping.set_global_planes(vec![Plane::new(Vec3::Z, 0.0)]);
        let mut material = clipped_material();
        material.clip_intersection = true;
        clipping.set_state(&material, &Mat4::IDENTITY);
        assert_eq!(clipping.num_planes(), 3);
        assert_eq!(clipping.num_intersection(), 2);
    }

    #[test]
    fn test_shadow_pass_skips_globals() {
        let mut clipping = ClippingState::new();
        clipping.set_local_enabled(true);
        clipping.set_global_planes(vec![Plane::new(Vec3::Z, 0.0)]);
        let mut material = clipped_material();

        clipping.begin_shadows();
        assert_eq!(clipping.counts_for(&material), (0, 0));
        material.clip_shadows = true;
        assert_eq!(clipping.counts_for(&material), (2, 0));
        clipping.end_shadows();
        assert_eq!(clipping.counts_for(&material), (3, 0));
    }
}
