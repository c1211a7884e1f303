//! Light collector
//!
//! [`LightsState::setup`] walks the visible lights once per frame and fills a
//! flat, fixed-shape uniform block: ambient and probe irradiance plus one
//! array per light type, with parallel arrays for shadow parameters.
//!
//! Two independent counters tell consumers what changed:
//! - [`LightsVersion::structure`] moves when the array shapes change (counts
//!   per type, shadow counts). Programs are keyed on the shapes, so this is
//!   the "recompile" channel.
//! - [`LightsVersion::values`] moves whenever any collected value changes
//!   (and on every structure change). This is the "re-upload" channel.
//!
//! Lights are ordered shadow casters first, then spot lights with a projected
//! map, then declaration order, so shadow map slots stay stable when the
//! scene's node order changes.

#[cfg(test)]
mod tests;

use glam::{Mat3, Mat4, Vec2, Vec3};

use crate::scene::{Camera, Light, LightKind, LightShadow, NodeId, TextureId};
use crate::uniforms::{UniformSink, UniformValue, UniformWriter};

/// A light as seen by the collector.
#[derive(Debug, Clone, Copy)]
pub struct LightSource<'a> {
    pub node: NodeId,
    pub light: &'a Light,
    pub world: Mat4,
    pub cast_shadow: bool,
}

impl LightSource<'_> {
    fn casts_shadow(&self) -> bool {
        self.cast_shadow && self.light.shadow.is_some() && self.light.supports_shadows()
    }

    fn has_map(&self) -> bool {
        matches!(self.light.kind, LightKind::Spot { map: Some(_), .. })
    }
}

/// Array shapes of the light uniform block; part of every lit program key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct LightCounts {
    pub directional: u32,
    pub point: u32,
    pub spot: u32,
    pub spot_maps: u32,
    pub spot_shadows_with_maps: u32,
    pub hemisphere: u32,
    pub rect_area: u32,
    pub probes: u32,
    pub directional_shadows: u32,
    pub point_shadows: u32,
    pub spot_shadows: u32,
}

impl LightCounts {
    pub fn total(&self) -> u32 {
        self.directional + self.point + self.spot + self.hemisphere + self.rect_area
    }
}

/// Two-level version of the collected light state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct LightsVersion {
    /// Changes only when [`LightCounts`] change
    pub structure: u64,
    /// Changes when any collected value changes
    pub values: u64,
}

/// Shadow map produced for one light by the shadow renderer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowBinding {
    pub texture: TextureId,
    /// World to shadow-map texture space
    pub matrix: Mat4,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct DirectionalData {
    position: Vec3,
    target: Vec3,
    color: Vec3,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct PointData {
    position: Vec3,
    color: Vec3,
    distance: f32,
    decay: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct SpotData {
    position: Vec3,
    target: Vec3,
    color: Vec3,
    distance: f32,
    cone_cos: f32,
    penumbra_cos: f32,
    decay: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct HemisphereData {
    position: Vec3,
    sky_color: Vec3,
    ground_color: Vec3,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct RectAreaData {
    world: Mat4,
    color: Vec3,
    width: f32,
    height: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ShadowData {
    node: NodeId,
    intensity: f32,
    bias: f32,
    normal_bias: f32,
    radius: f32,
    map_size: Vec2,
    near: f32,
    far: f32,
}

impl ShadowData {
    fn new(node: NodeId, shadow: &LightShadow) -> Self {
        Self {
            node,
            intensity: shadow.intensity,
            bias: shadow.bias,
            normal_bias: shadow.normal_bias,
            radius: shadow.radius,
            map_size: shadow.map_size.as_vec2(),
            near: shadow.camera.near,
            far: shadow.camera.far,
        }
    }
}

/// Everything collected in world space; compared frame to frame.
#[derive(Debug, Clone, PartialEq, Default)]
struct LightsData {
    ambient: Vec3,
    probe: [Vec3; 9],
    directional: Vec<DirectionalData>,
    point: Vec<PointData>,
    spot: Vec<SpotData>,
    /// Projected textures, shadow-casting spots first
    spot_maps: Vec<TextureId>,
    hemisphere: Vec<HemisphereData>,
    rect_area: Vec<RectAreaData>,
    directional_shadows: Vec<ShadowData>,
    point_shadows: Vec<ShadowData>,
    spot_shadows: Vec<ShadowData>,
}

/// Per-frame light uniform block.
#[derive(Debug, Default)]
pub struct LightsState {
    data: LightsData,
    counts: LightCounts,
    version: LightsVersion,
    directional_shadow_maps: Vec<Option<TextureId>>,
    directional_shadow_matrices: Vec<Mat4>,
    point_shadow_maps: Vec<Option<TextureId>>,
    point_shadow_matrices: Vec<Mat4>,
    spot_shadow_maps: Vec<Option<TextureId>>,
    spot_light_matrices: Vec<Mat4>,
    uniforms: Vec<(String, UniformValue)>,
}

impl LightsState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counts(&self) -> LightCounts {
        self.counts
    }

    pub fn version(&self) -> LightsVersion {
        self.version
    }

    /// Collect `lights` (already filtered for visibility and layers).
    pub fn setup(&mut self, lights: &[LightSource<'_>]) {
        let mut sorted: Vec<&LightSource<'_>> = lights.iter().collect();
        // Stable: ties keep declaration order
        sorted.sort_by_key(|l| (!l.casts_shadow(), !l.has_map()));

        let mut data = LightsData::default();
        let mut counts = LightCounts::default();

        for source in sorted {
            let light = source.light;
            let color = light.color * light.intensity;
            let position = source.world.w_axis.truncate();
            let shadow = light.shadow.as_ref().filter(|_| source.casts_shadow());

            match &light.kind {
                LightKind::Ambient => data.ambient += color,
                LightKind::Probe { coefficients } => {
                    for (sum, c) in data.probe.iter_mut().zip(coefficients) {
                        *sum += *c * light.intensity;
                    }
                    counts.probes += 1;
                }
                LightKind::Directional { target } => {
                    data.directional.push(DirectionalData {
                        position,
                        target: *target,
                        color,
                    });
                    if let Some(shadow) = shadow {
                        data.directional_shadows
                            .push(ShadowData::new(source.node, shadow));
                        counts.directional_shadows += 1;
                    }
                    counts.directional += 1;
                }
                LightKind::Point { distance, decay } => {
                    data.point.push(PointData {
                        position,
                        color,
                        distance: *distance,
                        decay: *decay,
                    });
                    if let Some(shadow) = shadow {
                        data.point_shadows.push(ShadowData::new(source.node, shadow));
                        counts.point_shadows += 1;
                    }
                    counts.point += 1;
                }
                LightKind::Spot {
                    target,
                    distance,
                    angle,
                    penumbra,
                    decay,
                    map,
                } => {
                    data.spot.push(SpotData {
                        position,
                        target: *target,
                        color,
                        distance: *distance,
                        cone_cos: angle.cos(),
                        penumbra_cos: (angle * (1.0 - penumbra)).cos(),
                        decay: *decay,
                    });
                    if let Some(map) = map {
                        data.spot_maps.push(*map);
                        counts.spot_maps += 1;
                        if shadow.is_some() {
                            counts.spot_shadows_with_maps += 1;
                        }
                    }
                    if let Some(shadow) = shadow {
                        data.spot_shadows.push(ShadowData::new(source.node, shadow));
                        counts.spot_shadows += 1;
                    }
                    counts.spot += 1;
                }
                LightKind::Hemisphere { ground_color } => {
                    data.hemisphere.push(HemisphereData {
                        position,
                        sky_color: color,
                        ground_color: *ground_color * light.intensity,
                    });
                    counts.hemisphere += 1;
                }
                LightKind::RectArea { width, height } => {
                    data.rect_area.push(RectAreaData {
                        world: source.world,
                        color,
                        width: *width,
                        height: *height,
                    });
                    counts.rect_area += 1;
                }
            }
        }

        if counts != self.counts {
            tracing::debug!(
                "Light structure changed: {} dir, {} point, {} spot, {} hemi, {} rect, {} shadows",
                counts.directional,
                counts.point,
                counts.spot,
                counts.hemisphere,
                counts.rect_area,
                counts.directional_shadows + counts.point_shadows + counts.spot_shadows
            );
            self.counts = counts;
            self.version.structure += 1;
            self.version.values += 1;
        } else if data != self.data {
            self.version.values += 1;
        }
        self.data = data;

        let spot_matrix_slots =
            (counts.spot_shadows + counts.spot_maps - counts.spot_shadows_with_maps) as usize;
        self.directional_shadow_maps = vec![None; counts.directional_shadows as usize];
        self.directional_shadow_matrices =
            vec![Mat4::IDENTITY; counts.directional_shadows as usize];
        self.point_shadow_maps = vec![None; counts.point_shadows as usize];
        self.point_shadow_matrices = vec![Mat4::IDENTITY; counts.point_shadows as usize];
        self.spot_shadow_maps = vec![None; counts.spot_shadows as usize];
        self.spot_light_matrices = vec![Mat4::IDENTITY; spot_matrix_slots];
    }

    /// Attach the maps rendered by the shadow pass.
    ///
    /// Projected spot maps share the spot matrix slots; map-only spot lights
    /// are set with [`LightsState::set_spot_map_matrix`].
    pub fn apply_shadows(&mut self, binding: impl Fn(NodeId) -> Option<ShadowBinding>) {
        for (i, shadow) in self.data.directional_shadows.iter().enumerate() {
            if let Some(b) = binding(shadow.node) {
                self.directional_shadow_maps[i] = Some(b.texture);
                self.directional_shadow_matrices[i] = b.matrix;
            }
        }
        for (i, shadow) in self.data.point_shadows.iter().enumerate() {
            if let Some(b) = binding(shadow.node) {
                self.point_shadow_maps[i] = Some(b.texture);
                self.point_shadow_matrices[i] = b.matrix;
            }
        }
        for (i, shadow) in self.data.spot_shadows.iter().enumerate() {
            if let Some(b) = binding(shadow.node) {
                self.spot_shadow_maps[i] = Some(b.texture);
                if let Some(slot) = self.spot_light_matrices.get_mut(i) {
                    *slot = b.matrix;
                }
            }
        }
    }

    /// Set the projection matrix of a map-only spot light slot.
    pub fn set_spot_map_matrix(&mut self, slot: usize, matrix: Mat4) {
        if let Some(m) = self.spot_light_matrices.get_mut(slot) {
            *m = matrix;
        }
    }

    /// Move positions and directions into `camera`'s view space and
    /// rebuild the uniform list.
    pub fn setup_view(&mut self, camera: &Camera) {
        let view = camera.view_matrix();
        let direction =
            |from: Vec3, to: Vec3| view.transform_vector3(from - to).normalize_or_zero();
        let data = &self.data;
        let mut u: Vec<(String, UniformValue)> = Vec::with_capacity(self.uniforms.len());

        u.push(("ambientLightColor".into(), data.ambient.into()));
        u.push(("lightProbe".into(), data.probe.to_vec().into()));

        for (i, l) in data.directional.iter().enumerate() {
            push(&mut u, "directionalLights", i, "direction", direction(l.position, l.target));
            push(&mut u, "directionalLights", i, "color", l.color);
        }
        for (i, l) in data.point.iter().enumerate() {
            push(&mut u, "pointLights", i, "position", view.transform_point3(l.position));
            push(&mut u, "pointLights", i, "color", l.color);
            push(&mut u, "pointLights", i, "distance", l.distance);
            push(&mut u, "pointLights", i, "decay", l.decay);
        }
        for (i, l) in data.spot.iter().enumerate() {
            push(&mut u, "spotLights", i, "position", view.transform_point3(l.position));
            push(&mut u, "spotLights", i, "direction", direction(l.position, l.target));
            push(&mut u, "spotLights", i, "color", l.color);
            push(&mut u, "spotLights", i, "distance", l.distance);
            push(&mut u, "spotLights", i, "coneCos", l.cone_cos);
            push(&mut u, "spotLights", i, "penumbraCos", l.penumbra_cos);
            push(&mut u, "spotLights", i, "decay", l.decay);
        }
        for (i, l) in data.hemisphere.iter().enumerate() {
            let dir = view.transform_vector3(l.position).normalize_or_zero();
            push(&mut u, "hemisphereLights", i, "direction", dir);
            push(&mut u, "hemisphereLights", i, "skyColor", l.sky_color);
            push(&mut u, "hemisphereLights", i, "groundColor", l.ground_color);
        }
        for (i, l) in data.rect_area.iter().enumerate() {
            let rotation = Mat3::from_mat4(view * l.world);
            let position = view.transform_point3(l.world.w_axis.truncate());
            let half_width = rotation * Vec3::new(l.width * 0.5, 0.0, 0.0);
            let half_height = rotation * Vec3::new(0.0, l.height * 0.5, 0.0);
            push(&mut u, "rectAreaLights", i, "position", position);
            push(&mut u, "rectAreaLights", i, "color", l.color);
            push(&mut u, "rectAreaLights", i, "halfWidth", half_width);
            push(&mut u, "rectAreaLights", i, "halfHeight", half_height);
        }

        push_shadows(&mut u, "directionalLightShadows", &data.directional_shadows, false);
        push_shadows(&mut u, "pointLightShadows", &data.point_shadows, true);
        push_shadows(&mut u, "spotLightShadows", &data.spot_shadows, false);

        let maps = |maps: &[Option<TextureId>]| UniformValue::TextureArray(maps.to_vec());
        if !self.directional_shadow_maps.is_empty() {
            u.push(("directionalShadowMap".into(), maps(&self.directional_shadow_maps)));
            let matrices = self.directional_shadow_matrices.clone();
            u.push(("directionalShadowMatrix".into(), matrices.into()));
        }
        if !self.point_shadow_maps.is_empty() {
            u.push(("pointShadowMap".into(), maps(&self.point_shadow_maps)));
            let matrices = self.point_shadow_matrices.clone();
            u.push(("pointShadowMatrix".into(), matrices.into()));
        }
        if !self.spot_shadow_maps.is_empty() {
            u.push(("spotShadowMap".into(), maps(&self.spot_shadow_maps)));
        }
        if !self.spot_light_matrices.is_empty() {
            let matrices = self.spot_light_matrices.clone();
            u.push(("spotLightMatrix".into(), matrices.into()));
        }
        if !data.spot_maps.is_empty() {
            let maps = data.spot_maps.iter().copied().map(Some).collect();
            u.push(("spotLightMap".into(), UniformValue::TextureArray(maps)));
        }

        self.uniforms = u;
    }

    /// Uniforms built by the last [`LightsState::setup_view`].
    pub fn uniforms(&self) -> &[(String, UniformValue)] {
        &self.uniforms
    }

    /// Write the light block through `w`.
    pub fn upload<S: UniformSink>(&self, w: &mut UniformWriter<'_, S>) {
        for (name, value) in &self.uniforms {
            w.set_ref(name, value);
        }
    }

    /// Forget collected state (context restored).
    ///
    /// The version keeps counting so programs compiled against the old
    /// structure are never mistaken for current.
    pub fn reset(&mut self) {
        let version = self.version;
        *self = Self::default();
        self.version = LightsVersion {
            structure: version.structure + 1,
            values: version.values + 1,
        };
    }
}

fn push(
    u: &mut Vec<(String, UniformValue)>,
    array: &str,
    index: usize,
    field: &str,
    value: impl Into<UniformValue>,
) {
    u.push((format!("{}[{}].{}", array, index, field), value.into()));
}

fn push_shadows(
    u: &mut Vec<(String, UniformValue)>,
    array: &str,
    shadows: &[ShadowData],
    with_camera_range: bool,
) {
    for (i, s) in shadows.iter().enumerate() {
        push(u, array, i, "shadowIntensity", s.intensity);
        push(u, array, i, "shadowBias", s.bias);
        push(u, array, i, "shadowNormalBias", s.normal_bias);
        push(u, array, i, "shadowRadius", s.radius);
        push(u, array, i, "shadowMapSize", s.map_size);
        if with_camera_range {
            push(u, array, i, "shadowCameraNear", s.near);
            push(u, array, i, "shadowCameraFar", s.far);
        }
    }
}
