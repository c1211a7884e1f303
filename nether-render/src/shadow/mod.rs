//! Shadow-map sub-renderer
//!
//! Runs before the colour passes. For every light that casts a shadow it
//! keeps a [`ShadowLightState`]: the map render target (plus a pass target
//! for the VSM blur), the last world-to-map matrix and a status:
//!
//! - `NoMap`: the light has never been seen casting
//! - `Allocated`: storage exists but nothing has been drawn into it
//! - `Current`: drawn during the most recent shadow pass
//! - `Stale`: drawn earlier, skipped by the most recent pass
//!
//! Maps are redrawn when first allocated, when the light's shadow has
//! `auto_update` set, or once after `needs_update` is raised. The global
//! [`ShadowSettings`] gate is checked first; with `auto_update` off nothing
//! is drawn until `needs_update` is set again.
//!
//! Point lights render six 90° views into a 4×2 atlas with a distance
//! material, everything else renders one view with a packed depth material.

mod camera;
mod material;

#[cfg(test)]
mod tests;

pub use camera::{
    POINT_FRAME_EXTENTS, ShadowView, frame_extents, shadow_view, spot_map_matrix, view_count,
};

use glam::{Mat4, UVec2, Vec2};
use hashbrown::{HashMap, HashSet};

use crate::config::{ShadowSettings, ShadowType};
use crate::device::{ClearMask, Filter, GpuDevice, InternalFormat, PixelFormat, PixelType, Rect};
use crate::error::RenderError;
use crate::lights::{LightSource, ShadowBinding};
use crate::renderer::draw::{DrawCall, DrawContext};
use crate::scene::{
    Camera, Geometry, GeometryGroup, GeometryId, LightKind, LightShadow, MaterialId,
    MaterialSlot, Node, NodeId, RenderTarget, Scene, Side,
};
use crate::warn_once::WarnOnce;

use material::{DistanceReference, OverridePass, ShadowMaterials, shadow_side};

/// Lifecycle of one light's shadow map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShadowStatus {
    #[default]
    NoMap,
    Allocated,
    Current,
    Stale,
}

/// Shadow resources of one light.
#[derive(Debug)]
pub struct ShadowLightState {
    map: RenderTarget,
    /// Intermediate target of the VSM blur
    pass: Option<RenderTarget>,
    shadow_type: ShadowType,
    /// Size of one view, after clamping
    view_size: UVec2,
    matrix: Mat4,
    status: ShadowStatus,
}

impl ShadowLightState {
    pub fn map(&self) -> &RenderTarget {
        &self.map
    }

    pub fn matrix(&self) -> Mat4 {
        self.matrix
    }

    pub fn status(&self) -> ShadowStatus {
        self.status
    }

    pub fn view_size(&self) -> UVec2 {
        self.view_size
    }
}

pub struct ShadowMapRenderer {
    pub settings: ShadowSettings,
    states: HashMap<NodeId, ShadowLightState>,
    materials: ShadowMaterials,
    fullscreen: Geometry,
    warn: WarnOnce,
}

impl ShadowMapRenderer {
    pub fn new(settings: ShadowSettings) -> Self {
        Self {
            settings,
            states: HashMap::new(),
            materials: ShadowMaterials::new(),
            fullscreen: Geometry::fullscreen_triangle(),
            warn: WarnOnce::default(),
        }
    }

    pub fn status(&self, light: NodeId) -> ShadowStatus {
        self.states
            .get(&light)
            .map_or(ShadowStatus::NoMap, |s| s.status)
    }

    pub fn state(&self, light: NodeId) -> Option<&ShadowLightState> {
        self.states.get(&light)
    }

    /// Map and matrix to sample for `light`, once it has been drawn.
    pub fn binding(&self, light: NodeId) -> Option<ShadowBinding> {
        let state = self.states.get(&light)?;
        match state.status {
            ShadowStatus::Current | ShadowStatus::Stale => Some(ShadowBinding {
                texture: state.map.texture(),
                matrix: state.matrix,
            }),
            ShadowStatus::NoMap | ShadowStatus::Allocated => None,
        }
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Geometry used by the blur passes; not part of any scene.
    pub(crate) fn internal_geometry(&self) -> GeometryId {
        self.fullscreen.id()
    }

    /// Materials owned by this renderer; not part of any scene.
    pub(crate) fn internal_materials(&self) -> Vec<MaterialId> {
        self.materials.ids()
    }

    /// Render every map that needs it.
    ///
    /// Returns the lights whose maps were drawn, so the caller can clear
    /// their one-shot `needs_update` flags.
    pub(crate) fn render<D: GpuDevice>(
        &mut self,
        ctx: &mut DrawContext<D>,
        scene: &Scene,
        camera: &Camera,
        lights: &[LightSource<'_>],
    ) -> Vec<NodeId> {
        if !self.settings.enabled {
            return Vec::new();
        }
        let casting: Vec<&LightSource<'_>> = lights
            .iter()
            .filter(|l| l.cast_shadow && l.light.supports_shadows() && l.light.shadow.is_some())
            .collect();
        self.dispose_unused(ctx, &casting);

        if casting.is_empty() || !(self.settings.auto_update || self.settings.needs_update) {
            self.mark_stale(&HashSet::new());
            return Vec::new();
        }
        self.settings.needs_update = false;

        let previous = ctx.target.take();
        let mut rendered = Vec::new();
        for source in casting {
            let Some(shadow) = source.light.shadow.as_ref() else {
                continue;
            };
            let fresh = self.ensure_state(ctx, source.node, &source.light.kind, shadow);
            if !(fresh || shadow.auto_update || shadow.needs_update) {
                continue;
            }
            if let Err(err) = self.render_light(ctx, scene, camera, source, shadow) {
                tracing::warn!("shadow map for light {:?} not rendered: {}", source.node, err);
                continue;
            }
            rendered.push(source.node);
        }
        let drawn: HashSet<NodeId> = rendered.iter().copied().collect();
        self.mark_stale(&drawn);
        ctx.restore_target(previous);
        rendered
    }

    fn mark_stale(&mut self, drawn: &HashSet<NodeId>) {
        for (node, state) in &mut self.states {
            if state.status == ShadowStatus::Current && !drawn.contains(node) {
                state.status = ShadowStatus::Stale;
            }
        }
    }

    fn dispose_unused<D: GpuDevice>(
        &mut self,
        ctx: &mut DrawContext<D>,
        casting: &[&LightSource<'_>],
    ) {
        let live: HashSet<NodeId> = casting.iter().map(|l| l.node).collect();
        let gone: Vec<NodeId> = self
            .states
            .keys()
            .filter(|node| !live.contains(*node))
            .copied()
            .collect();
        for node in gone {
            self.dispose_light(ctx, node);
        }
    }

    /// Release the map of `light`.
    pub(crate) fn dispose_light<D: GpuDevice>(&mut self, ctx: &mut DrawContext<D>, light: NodeId) {
        if let Some(state) = self.states.remove(&light) {
            tracing::debug!("disposing shadow map of light {:?}", light);
            ctx.textures.dispose_render_target(&mut ctx.state, state.map.id());
            if let Some(pass) = &state.pass {
                ctx.textures.dispose_render_target(&mut ctx.state, pass.id());
            }
        }
    }

    /// Release every map.
    pub(crate) fn dispose<D: GpuDevice>(&mut self, ctx: &mut DrawContext<D>) {
        let lights: Vec<NodeId> = self.states.keys().copied().collect();
        for light in lights {
            self.dispose_light(ctx, light);
        }
    }

    /// Forget every map without touching the GPU (context lost).
    pub(crate) fn reset(&mut self) {
        self.states.clear();
        self.warn.clear();
    }

    /// Forget the override variant made for a caster's material.
    pub(crate) fn forget_material(&mut self, material: MaterialId) -> Vec<MaterialId> {
        self.materials.forget(material)
    }

    /// Make sure `light` has storage of the right size and format.
    ///
    /// Returns true when the map was (re)allocated and must be drawn.
    fn ensure_state<D: GpuDevice>(
        &mut self,
        ctx: &mut DrawContext<D>,
        light: NodeId,
        kind: &LightKind,
        shadow: &LightShadow,
    ) -> bool {
        let shadow_type = self.settings.shadow_type;
        let extents = frame_extents(kind);
        let max = ctx.caps.max_texture_size;
        let limit = UVec2::new((max / extents.x).max(1), (max / extents.y).max(1));
        let requested = shadow.map_size.max(UVec2::ONE);
        let view_size = requested.min(limit);
        if view_size != requested {
            self.warn.warn("shadow-map-size", || {
                format!(
                    "shadow map size {}x{} exceeds the device limit of {}px, clamped to {}x{}",
                    requested.x, requested.y, max, view_size.x, view_size.y
                )
            });
        }
        let size = view_size * extents;

        let recreate = self
            .states
            .get(&light)
            .is_some_and(|s| (s.shadow_type == ShadowType::Vsm) != (shadow_type == ShadowType::Vsm));
        if recreate {
            self.dispose_light(ctx, light);
        }

        if let Some(state) = self.states.get_mut(&light) {
            state.shadow_type = shadow_type;
            if state.view_size == view_size {
                return state.status == ShadowStatus::Allocated;
            }
            state.view_size = view_size;
            state.map.set_size(size.x, size.y);
            if let Some(pass) = &mut state.pass {
                pass.set_size(size.x, size.y);
            }
            state.status = ShadowStatus::Allocated;
            return true;
        }

        let variance = shadow_type == ShadowType::Vsm && !matches!(kind, LightKind::Point { .. });
        let mut map = RenderTarget::new(size.x, size.y);
        map.name = "shadow-map".into();
        let pass = if variance {
            configure_variance(&mut map, ctx.caps.float_target_type());
            let mut pass = RenderTarget::new(size.x, size.y);
            pass.name = "shadow-map-pass".into();
            pass.depth_buffer = false;
            configure_variance(&mut pass, ctx.caps.float_target_type());
            Some(pass)
        } else {
            map.min_filter = Filter::Nearest;
            map.mag_filter = Filter::Nearest;
            None
        };
        tracing::debug!(
            "allocating {}x{} shadow map for light {:?}",
            size.x,
            size.y,
            light
        );
        self.states.insert(
            light,
            ShadowLightState {
                map,
                pass,
                shadow_type,
                view_size,
                matrix: Mat4::IDENTITY,
                status: ShadowStatus::Allocated,
            },
        );
        true
    }

    fn render_light<D: GpuDevice>(
        &mut self,
        ctx: &mut DrawContext<D>,
        scene: &Scene,
        camera: &Camera,
        source: &LightSource<'_>,
        shadow: &LightShadow,
    ) -> Result<(), RenderError> {
        let Some(state) = self.states.get(&source.node) else {
            return Ok(());
        };
        let map = state.map.clone();
        let pass_target = state.pass.clone();
        let view_size = state.view_size;
        let kind = &source.light.kind;
        let variance = pass_target.is_some();
        let reversed = ctx.caps.reversed_depth_buffer;

        ctx.bind_target(Some(&map), 0, 0)?;
        ctx.state.set_clear_color([1.0, 1.0, 1.0, 1.0]);
        ctx.clear(ClearMask::COLOR | ClearMask::DEPTH);

        let caster = match kind {
            LightKind::Point { .. } => CasterPass {
                pass: OverridePass::Distance,
                reference: Some(DistanceReference {
                    position: source.world.w_axis.truncate(),
                    near: shadow.camera.near,
                    far: shadow.camera.far,
                }),
                variance,
            },
            _ => CasterPass {
                pass: OverridePass::Depth,
                reference: None,
                variance,
            },
        };

        ctx.clipping.begin_shadows();
        let mut matrix = Mat4::IDENTITY;
        for index in 0..view_count(kind) {
            let Some(view) = shadow_view(kind, shadow, &source.world, view_size, index, reversed)
            else {
                continue;
            };
            let rect = Rect::new(
                (view.cell.x * view_size.x) as i32,
                (view.cell.y * view_size.y) as i32,
                view_size.x,
                view_size.y,
            );
            ctx.state.viewport(rect);
            matrix = view.matrix;
            let mut stack: Vec<NodeId> = scene.roots().iter().rev().copied().collect();
            while let Some(id) = stack.pop() {
                let Some(node) = scene.node(id) else {
                    continue;
                };
                if !node.visible {
                    continue;
                }
                stack.extend(node.children().iter().rev());
                if casts_into(scene, node, camera, &view, variance) {
                    self.draw_caster(ctx, scene, &view, (id, node), caster);
                }
            }
        }
        ctx.clipping.end_shadows();

        if let Some(pass_target) = &pass_target {
            self.blur(ctx, scene, &map, pass_target, shadow, view_size)?;
        }

        if let Some(state) = self.states.get_mut(&source.node) {
            state.matrix = matrix;
            state.status = ShadowStatus::Current;
        }
        Ok(())
    }

    fn draw_caster<D: GpuDevice>(
        &mut self,
        ctx: &mut DrawContext<D>,
        scene: &Scene,
        view: &ShadowView,
        (id, node): (NodeId, &Node),
        caster: CasterPass,
    ) {
        let Some(drawable) = node.as_drawable() else {
            return;
        };
        let Some(geometry) = scene.geometry(drawable.geometry) else {
            return;
        };
        let local_clipping = ctx.clipping.local_enabled();
        let mut draw = |ctx: &mut DrawContext<D>,
                        source: MaterialId,
                        group: Option<GeometryGroup>| {
            let Some(source) = scene.material(source) else {
                return;
            };
            if !source.visible {
                return;
            }
            let side = shadow_side(source, caster.variance);
            let material =
                self.materials
                    .override_for(caster.pass, source, local_clipping, caster.reference);
            ctx.render_buffer_direct(
                scene,
                &DrawCall {
                    camera: &view.camera,
                    node: Some((id, node)),
                    geometry,
                    material,
                    group,
                    side,
                },
            );
        };
        match &drawable.materials {
            MaterialSlot::PerGroup(materials) if !geometry.groups.is_empty() => {
                for group in &geometry.groups {
                    if let Some(material) = materials.get(group.material_index) {
                        draw(ctx, *material, Some(*group));
                    }
                }
            }
            slot => {
                if let Some(material) = slot.ids().first() {
                    draw(ctx, *material, None);
                }
            }
        }
    }

    /// Two-pass separable blur: map -> pass target (vertical), pass
    /// target -> map (horizontal).
    fn blur<D: GpuDevice>(
        &mut self,
        ctx: &mut DrawContext<D>,
        scene: &Scene,
        map: &RenderTarget,
        pass_target: &RenderTarget,
        shadow: &LightShadow,
        view_size: UVec2,
    ) -> Result<(), RenderError> {
        ctx.attributes
            .update_geometry(&mut ctx.state, &mut self.fullscreen);
        let resolution = Vec2::new(view_size.x as f32, view_size.y as f32);
        let camera = Camera::orthographic(-1.0, 1.0, 1.0, -1.0, 0.0, 1.0);

        let steps = [
            (false, map.texture(), pass_target),
            (true, pass_target.texture(), map),
        ];
        for (horizontal, source, destination) in steps {
            ctx.bind_target(Some(destination), 0, 0)?;
            let material = self.materials.blur(
                horizontal,
                source,
                shadow.blur_samples,
                shadow.radius,
                resolution,
            );
            ctx.render_buffer_direct(
                scene,
                &DrawCall {
                    camera: &camera,
                    node: None,
                    geometry: &self.fullscreen,
                    material,
                    group: None,
                    side: Side::Double,
                },
            );
        }
        Ok(())
    }
}

/// Override selection for one light's caster pass
#[derive(Debug, Clone, Copy)]
struct CasterPass {
    pass: OverridePass,
    reference: Option<DistanceReference>,
    variance: bool,
}

impl Default for ShadowMapRenderer {
    fn default() -> Self {
        Self::new(ShadowSettings::default())
    }
}

/// Whether `node` is drawn into the shadow view.
fn casts_into(
    scene: &Scene,
    node: &Node,
    camera: &Camera,
    view: &ShadowView,
    variance: bool,
) -> bool {
    let Some(drawable) = node.as_drawable() else {
        return false;
    };
    if !node.layers.test(camera.layers) {
        return false;
    }
    if !(node.cast_shadow || (node.receive_shadow && variance)) {
        return false;
    }
    if !node.frustum_culled || drawable.instancing.is_some() {
        return true;
    }
    match scene
        .geometry(drawable.geometry)
        .and_then(Geometry::bounding_sphere)
    {
        Some(sphere) => view
            .frustum
            .intersects_sphere(&sphere.transformed(&node.world_matrix())),
        None => true,
    }
}

/// Float storage when the device can render it, packed bytes otherwise.
fn configure_variance(target: &mut RenderTarget, float_type: PixelType) {
    if float_type == PixelType::HalfFloat {
        target.internal_format = InternalFormat::Rgba16F;
        target.format = PixelFormat::Rgba;
        target.data_type = PixelType::HalfFloat;
    }
}
