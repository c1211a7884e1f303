//! GPU state cache
//!
//! [`GpuState`] owns the device and mirrors every piece of fixed-function and
//! binding state it has set. Each setter compares against the mirror and only
//! reaches the driver on a change. Because the device lives inside the cache,
//! fixed-function calls cannot bypass it; the crate-internal
//! [`GpuState::device_mut`] escape hatch is used only for calls that do not
//! touch mirrored state (compiles, uploads into bound objects, draws).
//!
//! `None` in a mirrored field means "unknown": the next setter always issues
//! the driver call.

mod blending;

#[cfg(test)]
mod tests;

use hashbrown::HashMap;

pub use blending::{BlendParams, resolve as resolve_blending};

use crate::device::{
    BlendEquation, BlendFactor, BufferTarget, Capability, ClearMask, CompareFunction, ComponentType, CullFace, FrontFace,
    GpuBuffer, GpuDevice, GpuFramebuffer, GpuProgram, GpuTexture, Rect, StencilOp, TextureTarget,
};
use crate::scene::{Blending, Material, Side};

/// Texture bound to one unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundTexture {
    pub target: TextureTarget,
    pub texture: Option<GpuTexture>,
}

/// Stencil function triple
type StencilFunc = (CompareFunction, i32, u32);
/// Stencil fail / depth-fail / pass operations
type StencilOps = (StencilOp, StencilOp, StencilOp);

const TOGGLED_CAPABILITIES: [Capability; 7] = [
    Capability::Blend,
    Capability::CullFace,
    Capability::DepthTest,
    Capability::PolygonOffsetFill,
    Capability::SampleAlphaToCoverage,
    Capability::ScissorTest,
    Capability::StencilTest,
];

/// Diffing cache in front of a [`GpuDevice`].
pub struct GpuState<D: GpuDevice> {
    device: D,
    reversed_depth: bool,
    max_vertex_attribs: usize,

    capabilities: HashMap<Capability, bool>,
    blending: Option<Blending>,
    premultiplied_alpha: bool,
    blend_params: Option<BlendParams>,
    blend_color: Option<[f32; 4]>,

    color_mask: Option<[bool; 4]>,
    color_clear: Option<[f32; 4]>,
    color_locked: bool,

    depth_func: Option<CompareFunction>,
    depth_mask: Option<bool>,
    depth_clear: Option<f32>,
    depth_locked: bool,

    stencil_mask: Option<u32>,
    stencil_func: Option<StencilFunc>,
    stencil_op: Option<StencilOps>,
    stencil_clear: Option<i32>,
    stencil_locked: bool,

    cull_face: Option<CullFace>,
    front_face: Option<FrontFace>,
    line_width: Option<f32>,
    polygon_offset: Option<(f32, f32)>,

    current_program: Option<GpuProgram>,
    active_unit: Option<u32>,
    bound_textures: HashMap<u32, BoundTexture>,
    framebuffer: Option<Option<GpuFramebuffer>>,
    buffers: HashMap<BufferTarget, Option<GpuBuffer>>,
    viewport: Option<Rect>,
    scissor: Option<Rect>,

    new_attributes: Vec<bool>,
    enabled_attributes: Vec<bool>,
    attribute_divisors: Vec<u32>,
}

impl<D: GpuDevice> GpuState<D> {
    /// Wrap a freshly created device; the mirror starts at driver defaults.
    pub fn new(device: D, reversed_depth: bool) -> Self {
        let max_vertex_attribs = device.parameters().max_vertex_attribs as usize;
        let mut state = Self {
            device,
            reversed_depth,
            max_vertex_attribs,
            capabilities: HashMap::new(),
            blending: None,
            premultiplied_alpha: false,
            blend_params: None,
            blend_color: None,
            color_mask: None,
            color_clear: None,
            color_locked: false,
            depth_func: None,
            depth_mask: None,
            depth_clear: None,
            depth_locked: false,
            stencil_mask: None,
            stencil_func: None,
            stencil_op: None,
            stencil_clear: None,
            stencil_locked: false,
            cull_face: None,
            front_face: None,
            line_width: None,
            polygon_offset: None,
            current_program: None,
            active_unit: None,
            bound_textures: HashMap::new(),
            framebuffer: None,
            buffers: HashMap::new(),
            viewport: None,
            scissor: None,
            new_attributes: vec![false; max_vertex_attribs],
            enabled_attributes: vec![false; max_vertex_attribs],
            attribute_divisors: vec![0; max_vertex_attribs],
        };
        state.mirror_driver_defaults();
        state.apply_renderer_defaults();
        state
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    /// Raw device access for calls that do not touch mirrored state.
    pub(crate) fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    // ------------------------------------------------------------------
    // Capabilities
    // ------------------------------------------------------------------

    /// Returns true if a driver call was issued.
    pub fn enable(&mut self, capability: Capability) -> bool {
        if self.capabilities.get(&capability) == Some(&true) {
            return false;
        }
        self.device.enable(capability);
        self.capabilities.insert(capability, true);
        true
    }

    pub fn disable(&mut self, capability: Capability) -> bool {
        if self.capabilities.get(&capability) == Some(&false) {
            return false;
        }
        self.device.disable(capability);
        self.capabilities.insert(capability, false);
        true
    }

    fn toggle(&mut self, capability: Capability, on: bool) {
        if on {
            self.enable(capability);
        } else {
            self.disable(capability);
        }
    }

    pub fn is_enabled(&self, capability: Capability) -> bool {
        self.capabilities.get(&capability) == Some(&true)
    }

    // ------------------------------------------------------------------
    // Blending
    // ------------------------------------------------------------------

    pub fn set_blending(&mut self, blending: Blending, premultiplied_alpha: bool) {
        let Some(params) = blending::resolve(blending, premultiplied_alpha) else {
            if self.blending != Some(Blending::None) {
                self.disable(Capability::Blend);
                self.blending = Some(Blending::None);
            }
            return;
        };

        self.enable(Capability::Blend);
        if self.blending == Some(blending) && self.premultiplied_alpha == premultiplied_alpha {
            return;
        }
        self.set_blend_params(params);
        self.blending = Some(blending);
        self.premultiplied_alpha = premultiplied_alpha;
    }

    fn set_blend_params(&mut self, params: BlendParams) {
        let current = self.blend_params;
        if current.map(|c| (c.equation_rgb, c.equation_alpha))
            != Some((params.equation_rgb, params.equation_alpha))
        {
            self.device
                .blend_equation_separate(params.equation_rgb, params.equation_alpha);
        }
        if current.map(|c| (c.src_rgb, c.dst_rgb, c.src_alpha, c.dst_alpha))
            != Some((params.src_rgb, params.dst_rgb, params.src_alpha, params.dst_alpha))
        {
            self.device.blend_func_separate(
                params.src_rgb,
                params.dst_rgb,
                params.src_alpha,
                params.dst_alpha,
            );
        }
        self.blend_params = Some(params);
    }

    pub fn set_blend_color(&mut self, color: [f32; 4]) {
        if self.blend_color != Some(color) {
            self.device.blend_color(color);
            self.blend_color = Some(color);
        }
    }

    // ------------------------------------------------------------------
    // Colour, depth and stencil buffers
    // ------------------------------------------------------------------

    pub fn set_color_mask(&mut self, write: bool) {
        let mask = [write; 4];
        if !self.color_locked && self.color_mask != Some(mask) {
            self.device.color_mask(mask);
            self.color_mask = Some(mask);
        }
    }

    /// Freeze the colour mask (used while rendering depth-only passes).
    pub fn set_color_locked(&mut self, locked: bool) {
        self.color_locked = locked;
    }

    pub fn set_clear_color(&mut self, color: [f32; 4]) {
        if self.color_clear != Some(color) {
            self.device.clear_color(color);
            self.color_clear = Some(color);
        }
    }

    pub fn set_depth_test(&mut self, test: bool) {
        self.toggle(Capability::DepthTest, test);
    }

    pub fn set_depth_write(&mut self, write: bool) {
        if !self.depth_locked && self.depth_mask != Some(write) {
            self.device.depth_mask(write);
            self.depth_mask = Some(write);
        }
    }

    pub fn set_depth_locked(&mut self, locked: bool) {
        self.depth_locked = locked;
    }

    /// Set the depth comparison, mirrored for a reversed depth buffer.
    pub fn set_depth_func(&mut self, func: CompareFunction) {
        let func = if self.reversed_depth {
            func.reversed()
        } else {
            func
        };
        if self.depth_func != Some(func) {
            self.device.depth_func(func);
            self.depth_func = Some(func);
        }
    }

    pub fn set_clear_depth(&mut self, depth: f32) {
        let depth = if self.reversed_depth { 1.0 - depth } else { depth };
        if self.depth_clear != Some(depth) {
            self.device.clear_depth(depth);
            self.depth_clear = Some(depth);
        }
    }

    pub fn set_stencil_test(&mut self, test: bool) {
        if !self.stencil_locked {
            self.toggle(Capability::StencilTest, test);
        }
    }

    pub fn set_stencil_mask(&mut self, mask: u32) {
        if !self.stencil_locked && self.stencil_mask != Some(mask) {
            self.device.stencil_mask(mask);
            self.stencil_mask = Some(mask);
        }
    }

    pub fn set_stencil_func(&mut self, func: CompareFunction, reference: i32, mask: u32) {
        let value = (func, reference, mask);
        if self.stencil_func != Some(value) {
            self.device.stencil_func(func, reference, mask);
            self.stencil_func = Some(value);
        }
    }

    pub fn set_stencil_op(&mut self, fail: StencilOp, depth_fail: StencilOp, pass: StencilOp) {
        let value = (fail, depth_fail, pass);
        if self.stencil_op != Some(value) {
            self.device.stencil_op(fail, depth_fail, pass);
            self.stencil_op = Some(value);
        }
    }

    pub fn set_stencil_locked(&mut self, locked: bool) {
        self.stencil_locked = locked;
    }

    pub fn set_clear_stencil(&mut self, value: i32) {
        if self.stencil_clear != Some(value) {
            self.device.clear_stencil(value);
            self.stencil_clear = Some(value);
        }
    }

    /// Clear the bound framebuffer. Not diffed: clearing is an action.
    pub fn clear(&mut self, mask: ClearMask) {
        if !mask.is_empty() {
            self.device.clear(mask);
        }
    }

    // ------------------------------------------------------------------
    // Rasteriser
    // ------------------------------------------------------------------

    /// `None` disables face culling.
    pub fn set_cull_face(&mut self, face: Option<CullFace>) {
        match face {
            Some(face) => {
                self.enable(Capability::CullFace);
                if self.cull_face != Some(face) {
                    self.device.cull_face(face);
                    self.cull_face = Some(face);
                }
            }
            None => {
                self.disable(Capability::CullFace);
            }
        }
    }

    /// Swap the front-face winding to clockwise.
    pub fn set_flip_sided(&mut self, flip: bool) {
        let winding = if flip { FrontFace::Cw } else { FrontFace::Ccw };
        if self.front_face != Some(winding) {
            self.device.front_face(winding);
            self.front_face = Some(winding);
        }
    }

    pub fn set_line_width(&mut self, width: f32) {
        if self.line_width != Some(width) {
            self.device.line_width(width);
            self.line_width = Some(width);
        }
    }

    /// `None` disables polygon offset.
    pub fn set_polygon_offset(&mut self, offset: Option<(f32, f32)>) {
        match offset {
            Some(value) => {
                self.enable(Capability::PolygonOffsetFill);
                if self.polygon_offset != Some(value) {
                    self.device.polygon_offset(value.0, value.1);
                    self.polygon_offset = Some(value);
                }
            }
            None => {
                self.disable(Capability::PolygonOffsetFill);
            }
        }
    }

    pub fn set_scissor_test(&mut self, test: bool) {
        self.toggle(Capability::ScissorTest, test);
    }

    pub fn viewport(&mut self, rect: Rect) {
        if self.viewport != Some(rect) {
            self.device.viewport(rect);
            self.viewport = Some(rect);
        }
    }

    pub fn scissor(&mut self, rect: Rect) {
        if self.scissor != Some(rect) {
            self.device.scissor(rect);
            self.scissor = Some(rect);
        }
    }

    /// Apply a material's render state. `front_face_cw` is set for objects
    /// whose world transform mirrors geometry.
    pub fn set_material(&mut self, material: &Material, front_face_cw: bool) {
        self.set_material_side(material, material.side, front_face_cw);
    }

    /// [`GpuState::set_material`] with an explicit side override.
    pub fn set_material_side(&mut self, material: &Material, side: Side, front_face_cw: bool) {
        if side == Side::Double {
            self.set_cull_face(None);
        } else {
            self.set_cull_face(Some(CullFace::Back));
        }
        self.set_flip_sided((side == Side::Back) != front_face_cw);

        if material.blending == Blending::Normal && !material.transparent {
            self.set_blending(Blending::None, false);
        } else {
            self.set_blending(material.blending, material.premultiplied_alpha);
        }

        self.set_depth_func(material.depth_func);
        self.set_depth_test(material.depth_test);
        self.set_depth_write(material.depth_write);
        self.set_color_mask(material.color_write);

        match material.stencil {
            Some(stencil) => {
                self.set_stencil_test(true);
                self.set_stencil_mask(stencil.write_mask);
                self.set_stencil_func(stencil.func, stencil.reference, stencil.func_mask);
                self.set_stencil_op(stencil.fail, stencil.z_fail, stencil.z_pass);
            }
            None => self.set_stencil_test(false),
        }

        self.set_polygon_offset(material.polygon_offset);
        self.toggle(Capability::SampleAlphaToCoverage, material.alpha_to_coverage);
    }

    // ------------------------------------------------------------------
    // Bindings
    // ------------------------------------------------------------------

    /// Returns true if the program changed.
    pub fn use_program(&mut self, program: Option<GpuProgram>) -> bool {
        if self.current_program == program {
            return false;
        }
        self.device.use_program(program);
        self.current_program = program;
        true
    }

    pub fn current_program(&self) -> Option<GpuProgram> {
        self.current_program
    }

    pub fn active_texture(&mut self, unit: u32) {
        if self.active_unit != Some(unit) {
            self.device.active_texture(unit);
            self.active_unit = Some(unit);
        }
    }

    /// Bind `texture` to `unit` (or the active unit).
    pub fn bind_texture(
        &mut self,
        target: TextureTarget,
        texture: Option<GpuTexture>,
        unit: Option<u32>,
    ) {
        let unit = unit.or(self.active_unit).unwrap_or(0);
        let wanted = BoundTexture { target, texture };
        if self.bound_textures.get(&unit) == Some(&wanted) {
            return;
        }
        self.active_texture(unit);
        self.device.bind_texture(target, texture);
        self.bound_textures.insert(unit, wanted);
    }

    /// Unbind whatever is bound to the active unit.
    pub fn unbind_texture(&mut self) {
        let unit = self.active_unit.unwrap_or(0);
        if let Some(bound) = self.bound_textures.get(&unit).copied()
            && bound.texture.is_some()
        {
            self.device.bind_texture(bound.target, None);
            self.bound_textures.insert(
                unit,
                BoundTexture {
                    target: bound.target,
                    texture: None,
                },
            );
        }
    }

    pub fn bound_texture(&self, unit: u32) -> Option<BoundTexture> {
        self.bound_textures.get(&unit).copied()
    }

    /// Returns true if the binding changed.
    pub fn bind_framebuffer(&mut self, framebuffer: Option<GpuFramebuffer>) -> bool {
        if self.framebuffer == Some(framebuffer) {
            return false;
        }
        self.device.bind_framebuffer(framebuffer);
        self.framebuffer = Some(framebuffer);
        true
    }

    pub fn current_framebuffer(&self) -> Option<GpuFramebuffer> {
        self.framebuffer.flatten()
    }

    pub fn bind_buffer(&mut self, target: BufferTarget, buffer: Option<GpuBuffer>) {
        if self.buffers.get(&target) == Some(&buffer) {
            return;
        }
        self.device.bind_buffer(target, buffer);
        self.buffers.insert(target, buffer);
    }

    // ------------------------------------------------------------------
    // Object deletion keeps the mirror consistent
    // ------------------------------------------------------------------

    pub fn delete_program(&mut self, program: GpuProgram) {
        if self.current_program == Some(program) {
            self.current_program = None;
        }
        self.device.delete_program(program);
    }

    pub fn delete_texture(&mut self, texture: GpuTexture) {
        for bound in self.bound_textures.values_mut() {
            if bound.texture == Some(texture) {
                bound.texture = None;
            }
        }
        self.device.delete_texture(texture);
    }

    pub fn delete_buffer(&mut self, buffer: GpuBuffer) {
        for bound in self.buffers.values_mut() {
            if *bound == Some(buffer) {
                *bound = None;
            }
        }
        self.device.delete_buffer(buffer);
    }

    pub fn delete_framebuffer(&mut self, framebuffer: GpuFramebuffer) {
        if self.framebuffer == Some(Some(framebuffer)) {
            self.framebuffer = Some(None);
        }
        self.device.delete_framebuffer(framebuffer);
    }

    // ------------------------------------------------------------------
    // Vertex attributes
    // ------------------------------------------------------------------

    /// Start collecting the attribute set of the next draw.
    pub fn init_attributes(&mut self) {
        self.new_attributes.fill(false);
    }

    pub fn enable_attribute(&mut self, location: u32, divisor: u32) {
        let index = location as usize;
        if index >= self.max_vertex_attribs {
            return;
        }
        self.new_attributes[index] = true;
        if !self.enabled_attributes[index] {
            self.device.enable_vertex_attrib(location);
            self.enabled_attributes[index] = true;
        }
        if self.attribute_divisors[index] != divisor {
            self.device.vertex_attrib_divisor(location, divisor);
            self.attribute_divisors[index] = divisor;
        }
    }

    /// Disable attributes enabled by an earlier draw but not this one.
    pub fn disable_unused_attributes(&mut self) {
        for index in 0..self.max_vertex_attribs {
            if self.enabled_attributes[index] && !self.new_attributes[index] {
                self.device.disable_vertex_attrib(index as u32);
                self.enabled_attributes[index] = false;
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn vertex_attrib_pointer(
        &mut self,
        location: u32,
        size: u32,
        component: ComponentType,
        normalized: bool,
        stride: usize,
        offset: usize,
    ) {
        self.device
            .vertex_attrib_pointer(location, size, component, normalized, stride, offset);
    }

    // ------------------------------------------------------------------
    // Reset
    // ------------------------------------------------------------------

    /// Drive the device back to GL defaults and mirror them.
    ///
    /// Used after a context restore, when nothing about the driver state can
    /// be assumed.
    pub fn reset(&mut self) {
        for capability in TOGGLED_CAPABILITIES {
            self.device.disable(capability);
        }
        self.device.enable(Capability::Dither);
        self.device
            .blend_equation_separate(BlendEquation::Add, BlendEquation::Add);
        self.device.blend_func_separate(
            BlendFactor::One,
            BlendFactor::Zero,
            BlendFactor::One,
            BlendFactor::Zero,
        );
        self.device.blend_color([0.0; 4]);
        self.device.color_mask([true; 4]);
        self.device.clear_color([0.0; 4]);
        self.device.depth_mask(true);
        self.device.depth_func(CompareFunction::Less);
        self.device.clear_depth(1.0);
        self.device.stencil_mask(u32::MAX);
        self.device.stencil_func(CompareFunction::Always, 0, u32::MAX);
        self.device
            .stencil_op(StencilOp::Keep, StencilOp::Keep, StencilOp::Keep);
        self.device.clear_stencil(0);
        self.device.cull_face(CullFace::Back);
        self.device.front_face(FrontFace::Ccw);
        self.device.polygon_offset(0.0, 0.0);
        self.device.line_width(1.0);
        self.device.active_texture(0);
        self.device.bind_framebuffer(None);
        self.device.use_program(None);
        self.device.bind_buffer(BufferTarget::Array, None);
        self.device.bind_buffer(BufferTarget::ElementArray, None);
        for location in 0..self.max_vertex_attribs as u32 {
            self.device.disable_vertex_attrib(location);
            self.device.vertex_attrib_divisor(location, 0);
        }

        self.mirror_driver_defaults();
        self.apply_renderer_defaults();
    }

    /// Set the mirror to what a fresh context reports.
    fn mirror_driver_defaults(&mut self) {
        self.capabilities.clear();
        for capability in TOGGLED_CAPABILITIES {
            self.capabilities.insert(capability, false);
        }
        self.capabilities.insert(Capability::Dither, true);
        self.blending = Some(Blending::None);
        self.premultiplied_alpha = false;
        self.blend_params = Some(BlendParams {
            equation_rgb: BlendEquation::Add,
            equation_alpha: BlendEquation::Add,
            src_rgb: BlendFactor::One,
            dst_rgb: BlendFactor::Zero,
            src_alpha: BlendFactor::One,
            dst_alpha: BlendFactor::Zero,
        });
        self.blend_color = Some([0.0; 4]);
        self.color_mask = Some([true; 4]);
        self.color_clear = Some([0.0; 4]);
        self.color_locked = false;
        self.depth_func = Some(CompareFunction::Less);
        self.depth_mask = Some(true);
        self.depth_clear = Some(1.0);
        self.depth_locked = false;
        self.stencil_mask = Some(u32::MAX);
        self.stencil_func = Some((CompareFunction::Always, 0, u32::MAX));
        self.stencil_op = Some((StencilOp::Keep, StencilOp::Keep, StencilOp::Keep));
        self.stencil_clear = Some(0);
        self.stencil_locked = false;
        self.cull_face = Some(CullFace::Back);
        self.front_face = Some(FrontFace::Ccw);
        self.line_width = Some(1.0);
        self.polygon_offset = Some((0.0, 0.0));
        self.current_program = None;
        self.active_unit = Some(0);
        self.bound_textures.clear();
        self.framebuffer = Some(None);
        self.buffers.clear();
        self.buffers.insert(BufferTarget::Array, None);
        self.buffers.insert(BufferTarget::ElementArray, None);
        self.viewport = None;
        self.scissor = None;
        self.new_attributes.fill(false);
        self.enabled_attributes.fill(false);
        self.attribute_divisors.fill(0);
    }

    /// State the renderer expects on top of driver defaults.
    fn apply_renderer_defaults(&mut self) {
        self.set_clear_color([0.0, 0.0, 0.0, 1.0]);
        self.set_clear_depth(1.0);
        self.set_clear_stencil(0);
        self.set_depth_test(true);
        self.set_depth_func(CompareFunction::LessEqual);
        self.set_flip_sided(false);
        self.set_cull_face(Some(CullFace::Back));
        self.set_blending(Blending::None, false);
    }
}
