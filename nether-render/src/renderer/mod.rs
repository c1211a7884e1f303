//! Frame orchestrator
//!
//! [`Renderer`] owns the GPU caches (through the draw context), the shadow
//! map renderer and the render list, and turns one `render` call into:
//!
//! - world matrices and upload sync
//! - projection into the render list (layers, visibility, frustum culling)
//! - light collection and the shadow pass
//! - clear/background, opaque, transmission capture, transmissive and
//!   transparent passes
//! - mipmap generation and multisample resolve of the bound target
//!
//! The implementation is split by concern:
//! - `frame`: the `render` pipeline
//! - `target`: pixel readback
//! - `context`: context loss and restore
//! - `draw`: the per-draw path shared with the shadow renderer

mod context;
pub(crate) mod draw;
mod frame;
mod info;
mod target;

#[cfg(test)]
mod tests;

pub use info::RenderInfo;

use std::future::poll_fn;
use std::task::Poll;

use glam::Vec3;

use crate::capabilities::Capabilities;
use crate::config::RendererConfig;
use crate::device::{ClearMask, GpuDevice, Rect};
use crate::error::RenderError;
use crate::program::{ProgramDiagnosticsReport, ProgramHandle};
use crate::render_list::{
    RenderItemCompare, RenderList, painter_sort_stable, reverse_painter_sort_stable,
};
use crate::scene::{
    Camera, GeometryId, MaterialId, NodeKind, Plane, RenderTarget, RenderTargetId, Scene,
    TextureId,
};
use crate::shadow::ShadowMapRenderer;

use draw::DrawContext;

/// User-selected render target with its cube face and mip level
#[derive(Debug, Clone)]
struct TargetSelection {
    target: RenderTarget,
    face: u32,
    level: u32,
}

/// Scene renderer over one device context.
pub struct Renderer<D: GpuDevice> {
    core: DrawContext<D>,
    shadow_map: ShadowMapRenderer,
    render_list: RenderList,
    opaque_sort: Option<RenderItemCompare>,
    transparent_sort: Option<RenderItemCompare>,
    clear_color: Vec3,
    clear_alpha: f32,
    render_target: Option<TargetSelection>,
    transmission_target: Option<RenderTarget>,
    context_lost: bool,
}

impl<D: GpuDevice> Renderer<D> {
    /// Create a renderer on `device`.
    ///
    /// # Errors
    ///
    /// [`RenderError::ContextCreation`] if the device context is unusable.
    pub fn new(device: D, config: RendererConfig) -> Result<Self, RenderError> {
        let shadow_map = ShadowMapRenderer::new(config.shadows);
        let core = DrawContext::new(device, config)?;
        let clear_alpha = if core.config.alpha { 0.0 } else { 1.0 };
        tracing::info!(
            "renderer ready: {}x{} @{}",
            core.surface.width,
            core.surface.height,
            core.surface.pixel_ratio
        );
        Ok(Self {
            core,
            shadow_map,
            render_list: RenderList::new(),
            opaque_sort: Some(painter_sort_stable),
            transparent_sort: Some(reverse_painter_sort_stable),
            clear_color: Vec3::ZERO,
            clear_alpha,
            render_target: None,
            transmission_target: None,
            context_lost: false,
        })
    }

    pub fn device(&self) -> &D {
        self.core.state.device()
    }

    /// Raw device access.
    ///
    /// Calls made here bypass the state cache; the cache will not know
    /// about them.
    pub fn device_mut(&mut self) -> &mut D {
        self.core.state.device_mut()
    }

    pub fn config(&self) -> &RendererConfig {
        &self.core.config
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.core.caps
    }

    pub fn shadow_map(&self) -> &ShadowMapRenderer {
        &self.shadow_map
    }

    pub fn shadow_map_mut(&mut self) -> &mut ShadowMapRenderer {
        &mut self.shadow_map
    }

    /// Statistics of the last frame plus live resource counts.
    pub fn info(&self) -> RenderInfo {
        RenderInfo {
            programs: self.core.programs.len(),
            geometries: self.core.attributes.count(),
            textures: self.core.textures.count(),
            ..self.core.info
        }
    }

    pub fn is_context_lost(&self) -> bool {
        self.context_lost
    }

    // ------------------------------------------------------------------
    // Surface
    // ------------------------------------------------------------------

    /// Resize the drawing surface (CSS pixels); the viewport is reset to
    /// cover it.
    pub fn set_size(&mut self, width: u32, height: u32) {
        self.core.config.render.width = width;
        self.core.config.render.height = height;
        self.core.surface.width = width;
        self.core.surface.height = height;
        self.set_viewport(Rect::new(0, 0, width, height));
    }

    /// Drawing buffer size in device pixels.
    pub fn drawing_buffer_size(&self) -> (u32, u32) {
        self.core.surface.drawing_buffer_size()
    }

    pub fn set_pixel_ratio(&mut self, ratio: f32) {
        self.core.config.render.pixel_ratio = ratio;
        self.core.surface.pixel_ratio = ratio;
        let (width, height) = (self.core.surface.width, self.core.surface.height);
        self.set_size(width, height);
    }

    pub fn set_viewport(&mut self, viewport: Rect) {
        self.core.surface.viewport = viewport;
        if self.core.target.is_none() {
            let ratio = self.core.surface.pixel_ratio;
            self.core.state.viewport(viewport.scaled(ratio));
        }
    }

    pub fn set_scissor(&mut self, scissor: Rect) {
        self.core.surface.scissor = scissor;
        if self.core.target.is_none() {
            let ratio = self.core.surface.pixel_ratio;
            self.core.state.scissor(scissor.scaled(ratio));
        }
    }

    pub fn set_scissor_test(&mut self, enabled: bool) {
        self.core.surface.scissor_test = enabled;
        if self.core.target.is_none() {
            self.core.state.set_scissor_test(enabled);
        }
    }

    // ------------------------------------------------------------------
    // Clearing
    // ------------------------------------------------------------------

    pub fn set_clear_color(&mut self, color: Vec3, alpha: f32) {
        self.clear_color = color;
        self.clear_alpha = alpha;
    }

    pub fn clear_color(&self) -> (Vec3, f32) {
        (self.clear_color, self.clear_alpha)
    }

    /// Clear buffers of the bound target with the current clear values.
    pub fn clear(&mut self, mask: ClearMask) {
        self.apply_clear_color(self.clear_color, self.clear_alpha);
        self.core.clear(mask);
    }

    fn apply_clear_color(&mut self, color: Vec3, alpha: f32) {
        let rgb = if self.core.config.premultiplied_alpha {
            color * alpha
        } else {
            color
        };
        self.core.state.set_clear_color([rgb.x, rgb.y, rgb.z, alpha]);
    }

    // ------------------------------------------------------------------
    // Sorting and clipping
    // ------------------------------------------------------------------

    /// Comparator for the opaque bucket; `None` keeps traversal order.
    pub fn set_opaque_sort(&mut self, compare: Option<RenderItemCompare>) {
        self.opaque_sort = compare;
    }

    /// Comparator for the transmissive and transparent buckets.
    pub fn set_transparent_sort(&mut self, compare: Option<RenderItemCompare>) {
        self.transparent_sort = compare;
    }

    /// World-space planes applied to every draw.
    pub fn set_clipping_planes(&mut self, planes: Vec<Plane>) {
        self.core.clipping.set_global_planes(planes);
    }

    pub fn set_local_clipping_enabled(&mut self, enabled: bool) {
        self.core.config.render.local_clipping_enabled = enabled;
        self.core.clipping.set_local_enabled(enabled);
    }

    // ------------------------------------------------------------------
    // Targets
    // ------------------------------------------------------------------

    /// Draw into `target` (or the surface) from now on.
    ///
    /// # Errors
    ///
    /// [`RenderError::InvalidRenderTarget`] if the target cannot be
    /// allocated on this device.
    pub fn set_render_target(
        &mut self,
        target: Option<&RenderTarget>,
        active_cube_face: u32,
        active_mip_level: u32,
    ) -> Result<(), RenderError> {
        self.core
            .bind_target(target, active_cube_face, active_mip_level)?;
        self.render_target = target.map(|target| TargetSelection {
            target: target.clone(),
            face: active_cube_face,
            level: active_mip_level,
        });
        Ok(())
    }

    pub fn render_target(&self) -> Option<&RenderTarget> {
        self.render_target.as_ref().map(|s| &s.target)
    }

    // ------------------------------------------------------------------
    // Programs
    // ------------------------------------------------------------------

    /// Build the programs `scene` needs without drawing anything.
    pub fn compile(&mut self, scene: &mut Scene, camera: &Camera) {
        self.compile_programs(scene, camera);
    }

    /// Like [`Renderer::compile`], resolving once every program reports
    /// ready (parallel compilation).
    pub async fn compile_async(&mut self, scene: &mut Scene, camera: &Camera) {
        let pending = self.compile_programs(scene, camera);
        poll_fn(|cx| {
            let core = &mut self.core;
            let ready = pending
                .iter()
                .all(|program| core.programs.is_program_ready(&mut core.state, program));
            if ready {
                Poll::Ready(())
            } else {
                cx.waker().wake_by_ref();
                Poll::Pending
            }
        })
        .await;
    }

    /// Compile-error report of the last program build for `material`.
    pub fn material_diagnostics(&self, material: MaterialId) -> Option<&ProgramDiagnosticsReport> {
        self.core.diagnostics(material)
    }

    // ------------------------------------------------------------------
    // Disposal
    // ------------------------------------------------------------------

    /// Release the renderer-side state of a material; its programs are
    /// deleted once no other material uses them.
    pub fn dispose_material(&mut self, material: MaterialId) {
        for variant in self.shadow_map.forget_material(material) {
            self.core.dispose_material(variant);
        }
        self.core.dispose_material(material);
    }

    pub fn dispose_geometry(&mut self, geometry: GeometryId) {
        self.core
            .attributes
            .dispose_geometry(&mut self.core.state, geometry);
    }

    pub fn dispose_texture(&mut self, texture: TextureId) {
        self.core
            .textures
            .dispose_texture(&mut self.core.state, texture);
    }

    pub fn dispose_render_target(&mut self, target: RenderTargetId) {
        if self
            .render_target
            .as_ref()
            .is_some_and(|s| s.target.id() == target)
        {
            self.render_target = None;
            if let Err(err) = self.core.bind_target(None, 0, 0) {
                tracing::warn!("failed to rebind the surface: {}", err);
            }
        }
        self.core
            .textures
            .dispose_render_target(&mut self.core.state, target);
    }

    /// Release GPU buffers of geometries and instanced nodes that are no
    /// longer part of `scene`.
    pub fn prune(&mut self, scene: &Scene) {
        let internal = self.shadow_map.internal_geometry();
        let stale: Vec<GeometryId> = self
            .core
            .attributes
            .geometry_ids()
            .filter(|id| *id != internal && scene.geometry(*id).is_none())
            .collect();
        for id in stale {
            tracing::debug!("pruning geometry {:?}", id);
            self.dispose_geometry(id);
        }
        let orphans: Vec<_> = self
            .core
            .attributes
            .instanced_nodes()
            .filter(|node| {
                scene.node(*node).is_none_or(|n| {
                    !matches!(&n.kind, NodeKind::Drawable(d) if d.instancing.is_some())
                })
            })
            .collect();
        for node in orphans {
            self.core
                .attributes
                .dispose_instances(&mut self.core.state, node);
        }
    }

    /// Release every GPU resource the renderer owns.
    pub fn dispose(&mut self) {
        self.shadow_map.dispose(&mut self.core);
        for material in self.shadow_map.internal_materials() {
            self.core.dispose_material(material);
        }
        if let Some(target) = self.transmission_target.take() {
            self.core
                .textures
                .dispose_render_target(&mut self.core.state, target.id());
        }
        self.render_list.dispose();
    }

    fn compile_programs(&mut self, scene: &mut Scene, camera: &Camera) -> Vec<ProgramHandle> {
        scene.update_world_matrices();
        self.sync_resources(scene);
        let scene: &Scene = scene;
        let lights = frame::collect_lights(scene, camera);
        self.core.lights.setup(&lights);
        self.core.shadow_settings = self.shadow_map.settings;

        let mut programs = Vec::new();
        scene.visit_visible(|id, node| {
            let Some(drawable) = node.as_drawable() else {
                return;
            };
            let Some(geometry) = scene.geometry(drawable.geometry) else {
                return;
            };
            for material_id in drawable.materials.ids() {
                let Some(material) = scene.material(*material_id) else {
                    continue;
                };
                let draw = draw::DrawCall {
                    camera,
                    node: Some((id, node)),
                    geometry,
                    material,
                    group: None,
                    side: material.side,
                };
                if let Some(program) = self.core.program_for(scene, &draw) {
                    programs.push(program);
                }
            }
        });
        programs
    }
}
