//! Override materials for the shadow pass
//!
//! Casters are drawn with a shared depth (or distance, for point lights)
//! material. A caster whose own material changes coverage or position in
//! the shader (alpha test, displacement, clipping, alpha to coverage) gets a
//! private copy keyed by its material id, kept in sync with the source.

use glam::{Vec2, Vec3};
use hashbrown::HashMap;

use crate::scene::{
    Blending, DepthPacking, Material, MaterialId, MaterialKind, Plane, Side, TextureId,
};

/// Which override a caster is drawn with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum OverridePass {
    Depth,
    Distance,
}

/// Reference point of the distance material
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct DistanceReference {
    pub position: Vec3,
    pub near: f32,
    pub far: f32,
}

/// Fields copied from a caster's material into its override.
#[derive(Debug, Clone, PartialEq)]
struct SourceState {
    alpha_map: Option<TextureId>,
    alpha_test: f32,
    map: Option<TextureId>,
    clipping_planes: Vec<Plane>,
    clip_intersection: bool,
    clip_shadows: bool,
    displacement_map: Option<TextureId>,
    displacement_scale: f32,
    displacement_bias: f32,
    wireframe: bool,
    line_width: f32,
}

impl SourceState {
    fn of(source: &Material) -> Self {
        Self {
            alpha_map: source.alpha_map,
            alpha_test: if source.alpha_to_coverage {
                0.5
            } else {
                source.alpha_test
            },
            map: source.map,
            clipping_planes: source.clipping_planes.clone(),
            clip_intersection: source.clip_intersection,
            clip_shadows: source.clip_shadows,
            displacement_map: source.displacement_map,
            displacement_scale: source.displacement_scale,
            displacement_bias: source.displacement_bias,
            wireframe: source.wireframe,
            line_width: source.line_width,
        }
    }

    fn apply(&self, target: &mut Material) {
        target.alpha_map = self.alpha_map;
        target.alpha_test = self.alpha_test;
        target.map = self.map;
        target.clipping_planes = self.clipping_planes.clone();
        target.clip_intersection = self.clip_intersection;
        target.clip_shadows = self.clip_shadows;
        target.displacement_map = self.displacement_map;
        target.displacement_scale = self.displacement_scale;
        target.displacement_bias = self.displacement_bias;
        target.wireframe = self.wireframe;
        target.line_width = self.line_width;
    }
}

struct Variant {
    source: SourceState,
    material: Material,
}

/// Depth, distance and blur materials owned by the shadow renderer.
pub(crate) struct ShadowMaterials {
    depth: Material,
    distance: Material,
    variants: HashMap<(OverridePass, MaterialId), Variant>,
    blur_vertical: Material,
    blur_horizontal: Material,
}

/// Whether drawing `source` into a shadow map needs its own override.
pub(crate) fn needs_variant(source: &Material, local_clipping: bool) -> bool {
    let clipped = local_clipping && source.clip_shadows && !source.clipping_planes.is_empty();
    let displaced = source.displacement_map.is_some() && source.displacement_scale != 0.0;
    let alpha_tested =
        (source.alpha_map.is_some() || source.map.is_some()) && source.alpha_test > 0.0;
    clipped || displaced || alpha_tested || source.alpha_to_coverage
}

/// Face culled while drawing `source` into a shadow map.
pub(crate) fn shadow_side(source: &Material, variance: bool) -> Side {
    match source.shadow_side {
        Some(side) => side,
        None if variance => source.side,
        None => source.side.shadow_side(),
    }
}

fn blur_material(horizontal: bool) -> Material {
    let mut material = Material::new(MaterialKind::ShadowBlur {
        source: None,
        horizontal,
        samples: 8,
        radius: 1.0,
        resolution: Vec2::ONE,
    });
    material.name = if horizontal {
        "shadow-blur-horizontal"
    } else {
        "shadow-blur-vertical"
    }
    .into();
    material.depth_test = false;
    material.depth_write = false;
    material.blending = Blending::None;
    material.side = Side::Double;
    material
}

impl ShadowMaterials {
    pub fn new() -> Self {
        let mut depth = Material::new(MaterialKind::Depth {
            packing: DepthPacking::Rgba,
        });
        depth.name = "shadow-depth".into();
        let mut distance = Material::new(MaterialKind::Distance {
            reference_position: Vec3::ZERO,
            near: 1.0,
            far: 1000.0,
        });
        distance.name = "shadow-distance".into();
        Self {
            depth,
            distance,
            variants: HashMap::new(),
            blur_vertical: blur_material(false),
            blur_horizontal: blur_material(true),
        }
    }

    /// Override for drawing `source` in `pass`.
    pub fn override_for(
        &mut self,
        pass: OverridePass,
        source: &Material,
        local_clipping: bool,
        reference: Option<DistanceReference>,
    ) -> &Material {
        let base = match pass {
            OverridePass::Depth => &self.depth,
            OverridePass::Distance => &self.distance,
        };
        let material = if needs_variant(source, local_clipping) {
            let state = SourceState::of(source);
            let variant = self
                .variants
                .entry((pass, source.id()))
                .or_insert_with(|| {
                    let mut material = base.duplicate();
                    state.apply(&mut material);
                    Variant {
                        source: state.clone(),
                        material,
                    }
                });
            if variant.source != state {
                state.apply(&mut variant.material);
                variant.source = state;
                variant.material.needs_update();
            }
            &mut variant.material
        } else {
            match pass {
                OverridePass::Depth => &mut self.depth,
                OverridePass::Distance => &mut self.distance,
            }
        };
        // Reference point and range are plain uniforms
        if let Some(reference) = reference
            && let MaterialKind::Distance {
                reference_position,
                near,
                far,
            } = &mut material.kind
        {
            *reference_position = reference.position;
            *near = reference.near;
            *far = reference.far;
        }
        material
    }

    /// Blur pass material sampling `source`.
    pub fn blur(
        &mut self,
        horizontal: bool,
        source: TextureId,
        samples: u32,
        radius: f32,
        resolution: Vec2,
    ) -> &Material {
        let material = if horizontal {
            &mut self.blur_horizontal
        } else {
            &mut self.blur_vertical
        };
        let mut changed_samples = false;
        if let MaterialKind::ShadowBlur {
            source: current,
            samples: current_samples,
            radius: current_radius,
            resolution: current_resolution,
            ..
        } = &mut material.kind
        {
            *current = Some(source);
            *current_radius = radius;
            *current_resolution = resolution;
            if *current_samples != samples {
                *current_samples = samples;
                changed_samples = true;
            }
        }
        if changed_samples {
            material.needs_update();
        }
        material
    }

    /// Drop the variant made for `source`.
    pub fn forget(&mut self, source: MaterialId) -> Vec<MaterialId> {
        let mut removed = Vec::new();
        self.variants.retain(|(_, id), variant| {
            let keep = *id != source;
            if !keep {
                removed.push(variant.material.id());
            }
            keep
        });
        removed
    }

    /// Ids of every material this cache owns.
    pub fn ids(&self) -> Vec<MaterialId> {
        let mut ids = vec![
            self.depth.id(),
            self.distance.id(),
            self.blur_vertical.id(),
            self.blur_horizontal.id(),
        ];
        ids.extend(self.variants.values().map(|v| v.material.id()));
        ids
    }

    pub fn variant_count(&self) -> usize {
        self.variants.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_casters_share_the_depth_material() {
        let mut materials = ShadowMaterials::new();
        let a = Material::default();
        let b = Material::default();
        let first = materials
            .override_for(OverridePass::Depth, &a, false, None)
            .id();
        let second = materials
            .override_for(OverridePass::Depth, &b, false, None)
            .id();
        assert_eq!(first, second);
        assert_eq!(materials.variant_count(), 0);
    }

    #[test]
    fn test_alpha_tested_caster_gets_a_synced_variant() {
        let mut materials = ShadowMaterials::new();
        let mut source = Material::default();
        source.map = Some(TextureId(3));
        source.alpha_test = 0.4;

        let variant = materials.override_for(OverridePass::Depth, &source, false, None);
        assert_eq!(variant.alpha_test, 0.4);
        assert_eq!(variant.map, Some(TextureId(3)));
        let (id, version) = (variant.id(), variant.version());

        source.alpha_test = 0.6;
        let variant = materials.override_for(OverridePass::Depth, &source, false, None);
        assert_eq!(variant.id(), id);
        assert_eq!(variant.alpha_test, 0.6);
        assert!(variant.version() > version);
    }

    #[test]
    fn test_alpha_to_coverage_forces_alpha_test() {
        let mut materials = ShadowMaterials::new();
        let mut source = Material::default();
        source.alpha_to_coverage = true;
        let variant = materials.override_for(OverridePass::Depth, &source, false, None);
        assert_eq!(variant.alpha_test, 0.5);
    }

    #[test]
    fn test_clipping_only_counts_with_local_clipping() {
        let mut source = Material::default();
        source.clip_shadows = true;
        source.clipping_planes = vec![Plane::new(Vec3::X, 0.0)];
        assert!(!needs_variant(&source, false));
        assert!(needs_variant(&source, true));
    }

    #[test]
    fn test_distance_reference_is_applied() {
        let mut materials = ShadowMaterials::new();
        let reference = DistanceReference {
            position: Vec3::new(1.0, 2.0, 3.0),
            near: 0.5,
            far: 40.0,
        };
        let material = materials.override_for(
            OverridePass::Distance,
            &Material::default(),
            false,
            Some(reference),
        );
        assert_eq!(
            material.kind,
            MaterialKind::Distance {
                reference_position: Vec3::new(1.0, 2.0, 3.0),
                near: 0.5,
                far: 40.0,
            }
        );
    }

    #[test]
    fn test_shadow_side_defaults() {
        let mut source = Material::default();
        assert_eq!(shadow_side(&source, false), Side::Back);
        assert_eq!(shadow_side(&source, true), Side::Front);
        source.shadow_side = Some(Side::Double);
        assert_eq!(shadow_side(&source, false), Side::Double);
    }

    #[test]
    fn test_blur_samples_change_bumps_version() {
        let mut materials = ShadowMaterials::new();
        let version = materials
            .blur(false, TextureId(1), 8, 1.0, Vec2::ONE)
            .version();
        let same = materials
            .blur(false, TextureId(1), 8, 2.0, Vec2::ONE)
            .version();
        assert_eq!(version, same);
        let bumped = materials
            .blur(false, TextureId(1), 16, 2.0, Vec2::ONE)
            .version();
        assert!(bumped > version);
    }
}
