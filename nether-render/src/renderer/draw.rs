//! Draw path shared by the colour passes and the shadow pass
//!
//! [`DrawContext`] owns every GPU-facing cache. One draw goes through
//! [`DrawContext::render_buffer_direct`]: pick (or build) the program for the
//! material, apply the material's fixed-function state, refresh uniforms
//! through the per-program diff tables, bind vertex input and issue the call.

use glam::{Mat4, Vec2};
use hashbrown::HashMap;

use super::RenderInfo;
use crate::capabilities::Capabilities;
use crate::clipping::ClippingState;
use crate::config::{ColorSpace, RendererConfig, ShadowSettings, ShadowType, ToneMapping};
use crate::device::{
    BufferTarget, ClearMask, DrawMode, GpuDevice, Rect, TextureTarget, UniformLocation,
    UniformUpload,
};
use crate::error::RenderError;
use crate::lights::LightsState;
use crate::program::{
    ParameterContext, ProgramCache, ProgramDiagnosticsReport, ProgramFeatures, ProgramHandle,
    ProgramKey, get_parameters, get_program_cache_key,
};
use crate::scene::{
    Camera, Fog, Geometry, GeometryGroup, Material, MaterialId, Node, NodeId, Primitive,
    RenderTarget, Scene, Side, TextureId,
};
use crate::state::GpuState;
use crate::uniforms::{
    MaterialContext, TextureUnits, UniformSink, UniformWriter, refresh_camera, refresh_clipping,
    refresh_fog, refresh_material, refresh_object, refresh_skinning,
};
use crate::upload::{AttributeManager, TextureManager};

/// Drawing surface in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Surface {
    pub width: u32,
    pub height: u32,
    pub pixel_ratio: f32,
    pub viewport: Rect,
    pub scissor: Rect,
    pub scissor_test: bool,
}

impl Surface {
    pub fn new(width: u32, height: u32, pixel_ratio: f32) -> Self {
        Self {
            width,
            height,
            pixel_ratio,
            viewport: Rect::new(0, 0, width, height),
            scissor: Rect::new(0, 0, width, height),
            scissor_test: false,
        }
    }

    /// Size of the drawing buffer in device pixels.
    pub fn drawing_buffer_size(&self) -> (u32, u32) {
        (
            (self.width as f32 * self.pixel_ratio).floor() as u32,
            (self.height as f32 * self.pixel_ratio).floor() as u32,
        )
    }
}

/// Target currently bound for drawing
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct BoundTarget {
    pub target: RenderTarget,
    pub face: u32,
    pub level: u32,
}

/// Inputs besides the material version that select a program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DrawVariant {
    lights_structure: u64,
    shadows: bool,
    shadow_type: Option<ShadowType>,
    clipping: (u32, u32),
    tone_mapping: ToneMapping,
    output_color_space: ColorSpace,
    fog: Option<bool>,
    instancing: Option<bool>,
    bones: u32,
    morph_targets: usize,
    has_uv: bool,
    receive_shadow: bool,
    side: Side,
}

/// Renderer-side bookkeeping for one material.
#[derive(Debug, Default)]
struct MaterialProperties {
    version: Option<u64>,
    variant: Option<DrawVariant>,
    current: Option<ProgramHandle>,
    /// Every program this material has drawn with, so alternating variants
    /// never release and rebuild
    programs: HashMap<ProgramKey, ProgramHandle>,
    diagnostics: Option<ProgramDiagnosticsReport>,
}

/// One draw request.
pub(crate) struct DrawCall<'a> {
    pub camera: &'a Camera,
    /// `None` for screen-space passes
    pub node: Option<(NodeId, &'a Node)>,
    pub geometry: &'a Geometry,
    pub material: &'a Material,
    pub group: Option<GeometryGroup>,
    pub side: Side,
}

/// Uniform sink that resolves texture ids through the upload layer and binds
/// them via the state cache.
struct DrawSink<'a, D: GpuDevice> {
    state: &'a mut GpuState<D>,
    textures: &'a TextureManager,
    units: &'a mut TextureUnits,
}

impl<D: GpuDevice> UniformSink for DrawSink<'_, D> {
    fn upload(&mut self, location: UniformLocation, value: UniformUpload<'_>) {
        self.state.device_mut().set_uniform(location, value);
    }

    fn bind_texture(&mut self, target: TextureTarget, texture: Option<TextureId>) -> u32 {
        let unit = self.units.allocate();
        match texture.and_then(|id| self.textures.gpu_texture(id)) {
            Some((bound_target, gpu)) => {
                self.state.bind_texture(bound_target, Some(gpu), Some(unit))
            }
            None => self.state.bind_texture(target, None, Some(unit)),
        }
        unit
    }
}

/// GPU caches and per-frame draw inputs.
pub(crate) struct DrawContext<D: GpuDevice> {
    pub state: GpuState<D>,
    pub caps: Capabilities,
    pub config: RendererConfig,
    pub textures: TextureManager,
    pub attributes: AttributeManager,
    pub programs: ProgramCache,
    pub lights: LightsState,
    pub clipping: ClippingState,
    pub info: RenderInfo,
    /// Copy of the shadow renderer's settings for the current frame
    pub shadow_settings: ShadowSettings,
    pub surface: Surface,
    pub target: Option<BoundTarget>,
    /// Opaque capture sampled by transmissive materials this frame
    pub transmission: Option<(TextureId, Vec2)>,
    units: TextureUnits,
    properties: HashMap<MaterialId, MaterialProperties>,
}

impl<D: GpuDevice> DrawContext<D> {
    pub fn new(device: D, config: RendererConfig) -> Result<Self, RenderError> {
        let caps = Capabilities::probe(&device, &config)?;
        let state = GpuState::new(device, caps.reversed_depth_buffer);
        let surface = Surface::new(
            config.render.width,
            config.render.height,
            config.render.pixel_ratio,
        );
        let mut clipping = ClippingState::new();
        clipping.set_local_enabled(config.render.local_clipping_enabled);
        Ok(Self {
            state,
            units: TextureUnits::new(caps.max_textures),
            caps,
            shadow_settings: config.shadows,
            config,
            textures: TextureManager::new(),
            attributes: AttributeManager::new(),
            programs: ProgramCache::new(),
            lights: LightsState::new(),
            clipping,
            info: RenderInfo::default(),
            surface,
            target: None,
            transmission: None,
            properties: HashMap::new(),
        })
    }

    // ------------------------------------------------------------------
    // Targets
    // ------------------------------------------------------------------

    /// Bind `target` (or the surface) for drawing and apply its viewport.
    pub fn bind_target(
        &mut self,
        target: Option<&RenderTarget>,
        face: u32,
        level: u32,
    ) -> Result<(), RenderError> {
        match target {
            Some(target) => {
                self.textures
                    .setup_render_target(&mut self.state, &self.caps, target)?;
                self.textures
                    .bind_render_target(&mut self.state, target, face, level);
                let scale = 0.5_f32.powi(level as i32);
                self.state.viewport(target.viewport.scaled(scale));
                self.state.scissor(target.scissor.scaled(scale));
                self.state.set_scissor_test(target.scissor_test);
                self.target = Some(BoundTarget {
                    target: target.clone(),
                    face,
                    level,
                });
            }
            None => {
                self.state.bind_framebuffer(None);
                let ratio = self.surface.pixel_ratio;
                self.state.viewport(self.surface.viewport.scaled(ratio));
                self.state.scissor(self.surface.scissor.scaled(ratio));
                self.state.set_scissor_test(self.surface.scissor_test);
                self.target = None;
            }
        }
        Ok(())
    }

    /// Rebind whatever `previous` describes, logging instead of failing
    /// (the target was valid when it was first bound).
    pub fn restore_target(&mut self, previous: Option<BoundTarget>) {
        let result = match &previous {
            Some(bound) => self.bind_target(Some(&bound.target), bound.face, bound.level),
            None => self.bind_target(None, 0, 0),
        };
        if let Err(err) = result {
            tracing::warn!("failed to restore render target: {}", err);
        }
    }

    /// Clear the bound target's buffers; colour and depth writes are
    /// unmasked first so the clear reaches them.
    pub fn clear(&mut self, mask: ClearMask) {
        if mask.contains(ClearMask::COLOR) {
            self.state.set_color_mask(true);
        }
        if mask.contains(ClearMask::DEPTH) {
            self.state.set_depth_write(true);
        }
        if mask.contains(ClearMask::STENCIL) {
            self.state.set_stencil_mask(u32::MAX);
        }
        self.state.clear(mask);
    }

    fn on_screen(&self) -> bool {
        self.target.is_none()
    }

    // ------------------------------------------------------------------
    // Programs
    // ------------------------------------------------------------------

    fn parameter_context(&self, material: &Material) -> ParameterContext {
        let on_screen = self.on_screen();
        ParameterContext {
            precision: self.caps.precision,
            logarithmic_depth: self.caps.logarithmic_depth_buffer,
            reversed_depth: self.caps.reversed_depth_buffer,
            vertex_textures: self.caps.vertex_textures,
            tone_mapping: if on_screen {
                self.config.render.tone_mapping
            } else {
                ToneMapping::None
            },
            output_color_space: if on_screen {
                self.config.render.output_color_space
            } else {
                ColorSpace::Linear
            },
            clipping: self.clipping.counts_for(material),
            max_bones: self.caps.max_bones(),
        }
    }

    fn variant(&self, scene: &Scene, draw: &DrawCall<'_>, ctx: &ParameterContext) -> DrawVariant {
        let material = draw.material;
        let node = draw.node.map(|(_, node)| node);
        let drawable = node.and_then(Node::as_drawable);
        let morph_targets = draw
            .geometry
            .morph_attribute("position")
            .map_or(0, |targets| targets.len());
        DrawVariant {
            lights_structure: if material.uses_lights() {
                self.lights.version().structure
            } else {
                0
            },
            shadows: self.shadow_settings.enabled,
            shadow_type: (self.shadow_settings.enabled && material.uses_lights())
                .then_some(self.shadow_settings.shadow_type),
            clipping: ctx.clipping,
            tone_mapping: if material.tone_mapped {
                ctx.tone_mapping
            } else {
                ToneMapping::None
            },
            output_color_space: ctx.output_color_space,
            fog: scene
                .fog
                .filter(|_| material.fog)
                .map(|fog| matches!(fog, Fog::Exp2 { .. })),
            instancing: drawable
                .and_then(|d| d.instancing.as_ref())
                .map(|i| i.colors.is_some()),
            bones: drawable
                .and_then(|d| d.skeleton.as_ref())
                .map_or(0, |s| s.bone_matrices.len() as u32),
            morph_targets,
            has_uv: draw.geometry.has_attribute("uv"),
            receive_shadow: node.is_some_and(|n| n.receive_shadow),
            side: draw.side,
        }
    }

    /// Program for `draw`, compiled on first use of a permutation.
    ///
    /// Returns `None` when the permutation failed to build; the report is
    /// kept on the material's properties and the draw is skipped.
    pub fn program_for(&mut self, scene: &Scene, draw: &DrawCall<'_>) -> Option<ProgramHandle> {
        let material = draw.material;
        let ctx = self.parameter_context(material);
        let variant = self.variant(scene, draw, &ctx);
        let counts = self.lights.counts();

        let props = self.properties.entry(material.id()).or_default();
        let unchanged =
            props.version == Some(material.version()) && props.variant == Some(variant);
        if unchanged {
            return props.current.clone();
        }
        props.version = Some(material.version());
        props.variant = Some(variant);

        let node = draw.node.map(|(_, node)| node);
        let mut parameters = get_parameters(
            material,
            &counts,
            &self.shadow_settings,
            scene,
            node,
            &ctx,
        );
        parameters
            .features
            .set(ProgramFeatures::DOUBLE_SIDED, draw.side == Side::Double);
        parameters
            .features
            .set(ProgramFeatures::FLIP_SIDED, draw.side == Side::Back);
        let key = get_program_cache_key(&parameters);

        if let Some(program) = props.programs.get(&key) {
            props.current = Some(program.clone());
            return props.current.clone();
        }
        match self
            .programs
            .acquire_program(&mut self.state, &parameters, key)
        {
            Ok(program) => {
                props.programs.insert(key, program.clone());
                props.current = Some(program);
                props.diagnostics = None;
            }
            Err(err) => {
                if err.report().is_none() {
                    tracing::warn!("program for material {:?} not built: {}", material.id(), err);
                }
                props.current = None;
                props.diagnostics = err.report().cloned();
            }
        }
        props.current.clone()
    }

    pub fn diagnostics(&self, material: MaterialId) -> Option<&ProgramDiagnosticsReport> {
        self.properties.get(&material)?.diagnostics.as_ref()
    }

    /// Forget the material's programs; unshared programs are deleted and a
    /// failed build may be attempted again.
    pub fn dispose_material(&mut self, material: MaterialId) {
        if let Some(props) = self.properties.remove(&material) {
            if let Some(report) = &props.diagnostics {
                self.programs.forget_failure(report.key);
            }
            drop(props);
            self.programs.collect(&mut self.state);
        }
    }

    /// Rebuild every cache for a fresh context.
    ///
    /// Order matters: capabilities first, then state, uploads, material
    /// properties, programs and lights.
    pub fn restore(&mut self) -> Result<(), RenderError> {
        self.caps = Capabilities::probe(self.state.device(), &self.config)?;
        self.state.reset();
        self.textures.reset();
        self.attributes.reset();
        self.units = TextureUnits::new(self.caps.max_textures);
        self.properties.clear();
        self.programs.reset();
        self.lights.reset();
        self.target = None;
        self.transmission = None;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Drawing
    // ------------------------------------------------------------------

    /// Draw one object (or screen-space pass) with `draw.material`.
    pub fn render_buffer_direct(&mut self, scene: &Scene, draw: &DrawCall<'_>) {
        let Some(program) = self.program_for(scene, draw) else {
            return;
        };
        let geometry = draw.geometry;
        let node = draw.node.map(|(_, node)| node);
        let drawable = node.and_then(Node::as_drawable);
        let world = node.map_or(Mat4::IDENTITY, Node::world_matrix);
        let primitive = drawable.map_or(Primitive::Triangles, |d| d.primitive);
        let front_face_cw = primitive == Primitive::Triangles && world.determinant() < 0.0;

        self.state
            .set_material_side(draw.material, draw.side, front_face_cw);
        self.state.use_program(Some(program.gpu()));
        self.upload_uniforms(scene, draw, &program, &world);

        // Element range
        let wireframe = draw.material.wireframe && primitive == Primitive::Triangles;
        let index = if wireframe {
            self.attributes
                .update_wireframe(&mut self.state, geometry)
                .map(|w| (w.buffer, w.index_type, w.count))
        } else {
            self.attributes.index_buffer(geometry).map(|(buffer, index_type)| {
                let count = geometry.index().map_or(0, |i| i.count());
                (buffer, index_type, count)
            })
        };
        let range_factor = if wireframe { 2 } else { 1 };
        let (start, count) = geometry.draw_range;
        let mut draw_start = start.saturating_mul(range_factor);
        let mut draw_end = count.map_or(u32::MAX, |count| {
            start.saturating_add(count).saturating_mul(range_factor)
        });
        if let Some(group) = draw.group {
            draw_start = draw_start.max(group.start.saturating_mul(range_factor));
            draw_end = draw_end.min(
                group
                    .start
                    .saturating_add(group.count)
                    .saturating_mul(range_factor),
            );
        }
        match (&index, geometry.attribute("position")) {
            (Some((_, _, count)), _) => draw_end = draw_end.min(*count),
            (None, Some(position)) => draw_end = draw_end.min(position.count()),
            (None, None) => return,
        }
        if draw_end <= draw_start {
            return;
        }
        let draw_count = draw_end - draw_start;

        let instances = drawable
            .and_then(|d| d.instancing.as_ref())
            .map_or(1, |i| i.count);
        if instances == 0 {
            return;
        }

        self.attributes.setup_vertex_attributes(
            &mut self.state,
            program.attributes(),
            geometry,
            draw.node.map(|(id, _)| id),
        );

        let mode = match primitive {
            Primitive::Triangles if wireframe => {
                self.state.set_line_width(draw.material.line_width * self.pixel_ratio());
                DrawMode::Lines
            }
            Primitive::Triangles => DrawMode::Triangles,
            Primitive::LineSegments | Primitive::LineStrip | Primitive::LineLoop => {
                self.state.set_line_width(draw.material.line_width * self.pixel_ratio());
                match primitive {
                    Primitive::LineSegments => DrawMode::Lines,
                    Primitive::LineLoop => DrawMode::LineLoop,
                    _ => DrawMode::LineStrip,
                }
            }
            Primitive::Points => DrawMode::Points,
        };

        match index {
            Some((buffer, index_type, _)) => {
                self.state.bind_buffer(BufferTarget::ElementArray, Some(buffer));
                let offset = draw_start as usize * index_type.bytes();
                self.state.device_mut().draw_elements(
                    mode,
                    draw_count,
                    index_type,
                    offset,
                    instances,
                );
            }
            None => {
                self.state
                    .device_mut()
                    .draw_arrays(mode, draw_start, draw_count, instances);
            }
        }
        self.info.record_draw(mode, draw_count, instances);
    }

    fn pixel_ratio(&self) -> f32 {
        if self.on_screen() {
            self.surface.pixel_ratio
        } else {
            1.0
        }
    }

    fn upload_uniforms(
        &mut self,
        scene: &Scene,
        draw: &DrawCall<'_>,
        program: &ProgramHandle,
        world: &Mat4,
    ) {
        let material = draw.material;
        let camera = draw.camera;
        let view = camera.view_matrix();
        let drawable = draw.node.and_then(|(_, node)| node.as_drawable());
        let reversed = self.caps.reversed_depth_buffer;
        let logarithmic = self.caps.logarithmic_depth_buffer;
        let exposure = self.config.render.tone_mapping_exposure;
        let material_ctx = MaterialContext {
            scene,
            pixel_ratio: self.surface.pixel_ratio,
            height: self.surface.height as f32,
            transmission: self.transmission,
        };

        let planes = self.clipping.set_state(material, &view);
        self.units.reset();
        let mut table = program.uniforms.borrow_mut();
        let mut sink = DrawSink {
            state: &mut self.state,
            textures: &self.textures,
            units: &mut self.units,
        };
        let mut w = UniformWriter::new(&mut table, &mut sink);

        refresh_camera(&mut w, camera, reversed, logarithmic);
        refresh_object(&mut w, world, &view);
        if let Some(drawable) = drawable {
            refresh_skinning(&mut w, drawable.skeleton.as_ref(), &drawable.morph_influences);
        }
        if material.fog
            && let Some(fog) = &scene.fog
        {
            refresh_fog(&mut w, fog);
        }
        if material.uses_lights() {
            self.lights.upload(&mut w);
        }
        refresh_clipping(&mut w, planes);
        w.set("toneMappingExposure", exposure);
        refresh_material(&mut w, material, &material_ctx);
    }
}

