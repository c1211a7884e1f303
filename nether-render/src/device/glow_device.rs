//! OpenGL ES 3 / WebGL2 backend over `glow`
//!
//! Driver objects live in per-kind tables keyed by the `u32` handles the
//! renderer sees. A handle whose driver object could not be created (context
//! lost, out of memory) is still returned; calls naming it become no-ops.
//!
//! # Safety
//!
//! Every method issues raw GL calls. The context passed to
//! [`GlowDevice::new`] must be current on the calling thread for as long as
//! the device is used.

use std::sync::Arc;

use glow::{HasContext, PixelPackData, PixelUnpackData};
use hashbrown::HashMap;

use super::{
    ActiveAttribute, ActiveUniform, Attachment, BlendEquation, BlendFactor, BufferTarget,
    BufferUsage, Capability, ClearMask, CompareFunction, ComponentType, CullFace,
    DeviceParameters, DrawMode, Filter, FrontFace, GpuBuffer, GpuDevice, GpuFence,
    GpuFramebuffer, GpuProgram, GpuRenderbuffer, GpuTexture, ImageTarget, IndexType,
    InternalFormat, PixelFormat, PixelType, Precision, ProgramDiagnostics, Rect, SamplerParams,
    ShaderSource, ShaderStage, StencilOp, TexImageDesc, TexRegion, TextureTarget,
    UniformLocation, UniformType, UniformUpload, Wrapping,
};

/// Reflection captured right after linking
struct LinkedProgram {
    program: glow::Program,
    uniforms: Vec<ActiveUniform>,
    attributes: Vec<ActiveAttribute>,
}

/// [`GpuDevice`] on a live `glow` context.
pub struct GlowDevice {
    gl: Arc<glow::Context>,
    next_handle: u32,
    programs: HashMap<u32, LinkedProgram>,
    uniforms: HashMap<u32, glow::UniformLocation>,
    textures: HashMap<u32, glow::Texture>,
    buffers: HashMap<u32, glow::Buffer>,
    framebuffers: HashMap<u32, glow::Framebuffer>,
    renderbuffers: HashMap<u32, glow::Renderbuffer>,
    fences: HashMap<u32, glow::Fence>,
    vertex_array: Option<glow::VertexArray>,
    context_lost: bool,
}

impl GlowDevice {
    /// Wrap `gl`, which must be current on this thread.
    pub fn new(gl: Arc<glow::Context>) -> Self {
        // Core profiles refuse attribute pointers without a bound VAO
        let vertex_array = unsafe {
            match gl.create_vertex_array() {
                Ok(vao) => {
                    gl.bind_vertex_array(Some(vao));
                    Some(vao)
                }
                Err(err) => {
                    tracing::warn!("failed to create vertex array: {}", err);
                    None
                }
            }
        };
        Self {
            gl,
            next_handle: 1,
            programs: HashMap::new(),
            uniforms: HashMap::new(),
            textures: HashMap::new(),
            buffers: HashMap::new(),
            framebuffers: HashMap::new(),
            renderbuffers: HashMap::new(),
            fences: HashMap::new(),
            vertex_array,
            context_lost: false,
        }
    }

    pub fn gl(&self) -> &Arc<glow::Context> {
        &self.gl
    }

    /// Report a loss (or recovery) observed by the windowing layer.
    ///
    /// Recovery drops every driver object table; the renderer re-creates
    /// what it needs on the next frame.
    pub fn set_context_lost(&mut self, lost: bool) {
        if self.context_lost && !lost {
            self.programs.clear();
            self.uniforms.clear();
            self.textures.clear();
            self.buffers.clear();
            self.framebuffers.clear();
            self.renderbuffers.clear();
            self.fences.clear();
            self.vertex_array = unsafe { self.gl.create_vertex_array().ok() };
            if let Some(vao) = self.vertex_array {
                unsafe { self.gl.bind_vertex_array(Some(vao)) };
            }
        }
        self.context_lost = lost;
    }

    fn handle(&mut self) -> u32 {
        let id = self.next_handle;
        self.next_handle += 1;
        id
    }

    fn compile_stage(&self, stage: u32, source: &str) -> Result<glow::Shader, String> {
        unsafe {
            let shader = self.gl.create_shader(stage)?;
            self.gl.shader_source(shader, source);
            self.gl.compile_shader(shader);
            if !self.gl.get_shader_compile_status(shader) {
                let log = self.gl.get_shader_info_log(shader);
                self.gl.delete_shader(shader);
                return Err(log);
            }
            Ok(shader)
        }
    }

    fn reflect(&mut self, program: glow::Program) -> (Vec<ActiveUniform>, Vec<ActiveAttribute>) {
        let mut uniforms = Vec::new();
        let count = unsafe { self.gl.get_active_uniforms(program) };
        for index in 0..count {
            let Some(active) = (unsafe { self.gl.get_active_uniform(program, index) }) else {
                continue;
            };
            let Some(kind) = uniform_type(active.utype) else {
                continue;
            };
            let Some(location) = (unsafe { self.gl.get_uniform_location(program, &active.name) })
            else {
                continue;
            };
            let id = self.handle();
            self.uniforms.insert(id, location);
            uniforms.push(ActiveUniform {
                name: active.name,
                location: UniformLocation(id),
                kind,
                size: active.size.max(1) as u32,
            });
        }

        let mut attributes = Vec::new();
        let count = unsafe { self.gl.get_active_attributes(program) };
        for index in 0..count {
            let Some(active) = (unsafe { self.gl.get_active_attribute(program, index) }) else {
                continue;
            };
            let (Some(kind), Some(location)) = (uniform_type(active.atype), unsafe {
                self.gl.get_attrib_location(program, &active.name)
            }) else {
                continue;
            };
            attributes.push(ActiveAttribute {
                name: active.name,
                location,
                kind,
            });
        }
        (uniforms, attributes)
    }
}

impl GpuDevice for GlowDevice {
    fn parameters(&self) -> DeviceParameters {
        let gl = &self.gl;
        let int = |pname| unsafe { gl.get_parameter_i32(pname).max(0) as u32 };
        let max_anisotropy = if gl
            .supported_extensions()
            .contains("EXT_texture_filter_anisotropic")
        {
            unsafe { gl.get_parameter_f32(glow::MAX_TEXTURE_MAX_ANISOTROPY_EXT) }
        } else {
            0.0
        };
        DeviceParameters {
            version: unsafe { gl.get_parameter_string(glow::VERSION) },
            renderer: unsafe { gl.get_parameter_string(glow::RENDERER) },
            max_texture_units: int(glow::MAX_TEXTURE_IMAGE_UNITS),
            max_vertex_texture_units: int(glow::MAX_VERTEX_TEXTURE_IMAGE_UNITS),
            max_texture_size: int(glow::MAX_TEXTURE_SIZE),
            max_cube_map_size: int(glow::MAX_CUBE_MAP_TEXTURE_SIZE),
            max_3d_texture_size: int(glow::MAX_3D_TEXTURE_SIZE),
            max_array_texture_layers: int(glow::MAX_ARRAY_TEXTURE_LAYERS),
            max_vertex_attribs: int(glow::MAX_VERTEX_ATTRIBS),
            max_vertex_uniform_vectors: int(glow::MAX_VERTEX_UNIFORM_VECTORS),
            max_fragment_uniform_vectors: int(glow::MAX_FRAGMENT_UNIFORM_VECTORS),
            max_varying_vectors: int(glow::MAX_VARYING_VECTORS),
            max_samples: int(glow::MAX_SAMPLES),
            max_anisotropy,
        }
    }

    fn extensions(&self) -> Vec<String> {
        let mut extensions: Vec<String> = self.gl.supported_extensions().iter().cloned().collect();
        // Desktop drivers spell some WebGL extensions differently
        let aliases = [
            ("GL_EXT_texture_filter_anisotropic", "EXT_texture_filter_anisotropic"),
            ("GL_EXT_color_buffer_float", "EXT_color_buffer_float"),
            ("GL_EXT_color_buffer_half_float", "EXT_color_buffer_half_float"),
            ("GL_OES_texture_float_linear", "OES_texture_float_linear"),
            ("GL_EXT_texture_compression_s3tc", "WEBGL_compressed_texture_s3tc"),
            ("GL_KHR_parallel_shader_compile", "KHR_parallel_shader_compile"),
        ];
        for (native, web) in aliases {
            if extensions.iter().any(|e| e == native) && !extensions.iter().any(|e| e == web) {
                extensions.push(web.to_string());
            }
        }
        extensions
    }

    fn shader_precision_supported(&self, stage: ShaderStage, precision: Precision) -> bool {
        let shader = match stage {
            ShaderStage::Vertex => glow::VERTEX_SHADER,
            ShaderStage::Fragment => glow::FRAGMENT_SHADER,
        };
        let precision_type = match precision {
            Precision::High => glow::HIGH_FLOAT,
            Precision::Medium => glow::MEDIUM_FLOAT,
            Precision::Low => glow::LOW_FLOAT,
        };
        match unsafe { self.gl.get_shader_precision_format(shader, precision_type) } {
            Some(format) => format.precision > 0,
            // Desktop GL does not report precisions; everything is highp
            None => true,
        }
    }

    fn is_context_lost(&self) -> bool {
        self.context_lost
    }

    fn implementation_read_format(&self) -> (PixelFormat, PixelType) {
        let format = unsafe { self.gl.get_parameter_i32(glow::IMPLEMENTATION_COLOR_READ_FORMAT) };
        let data_type = unsafe { self.gl.get_parameter_i32(glow::IMPLEMENTATION_COLOR_READ_TYPE) };
        (
            pixel_format_from_gl(format as u32).unwrap_or(PixelFormat::Rgba),
            pixel_type_from_gl(data_type as u32).unwrap_or(PixelType::UnsignedByte),
        )
    }

    // ------------------------------------------------------------------
    // Fixed-function state
    // ------------------------------------------------------------------

    fn enable(&mut self, capability: Capability) {
        unsafe { self.gl.enable(gl_capability(capability)) };
    }

    fn disable(&mut self, capability: Capability) {
        unsafe { self.gl.disable(gl_capability(capability)) };
    }

    fn blend_equation_separate(&mut self, rgb: BlendEquation, alpha: BlendEquation) {
        unsafe {
            self.gl
                .blend_equation_separate(gl_blend_equation(rgb), gl_blend_equation(alpha));
        }
    }

    fn blend_func_separate(
        &mut self,
        src_rgb: BlendFactor,
        dst_rgb: BlendFactor,
        src_alpha: BlendFactor,
        dst_alpha: BlendFactor,
    ) {
        unsafe {
            self.gl.blend_func_separate(
                gl_blend_factor(src_rgb),
                gl_blend_factor(dst_rgb),
                gl_blend_factor(src_alpha),
                gl_blend_factor(dst_alpha),
            );
        }
    }

    fn blend_color(&mut self, color: [f32; 4]) {
        unsafe { self.gl.blend_color(color[0], color[1], color[2], color[3]) };
    }

    fn depth_func(&mut self, func: CompareFunction) {
        unsafe { self.gl.depth_func(gl_compare(func)) };
    }

    fn depth_mask(&mut self, write: bool) {
        unsafe { self.gl.depth_mask(write) };
    }

    fn clear_depth(&mut self, depth: f32) {
        unsafe { self.gl.clear_depth_f32(depth) };
    }

    fn stencil_mask(&mut self, mask: u32) {
        unsafe { self.gl.stencil_mask(mask) };
    }

    fn stencil_func(&mut self, func: CompareFunction, reference: i32, mask: u32) {
        unsafe { self.gl.stencil_func(gl_compare(func), reference, mask) };
    }

    fn stencil_op(&mut self, fail: StencilOp, depth_fail: StencilOp, pass: StencilOp) {
        unsafe {
            self.gl.stencil_op(
                gl_stencil_op(fail),
                gl_stencil_op(depth_fail),
                gl_stencil_op(pass),
            );
        }
    }

    fn clear_stencil(&mut self, value: i32) {
        unsafe { self.gl.clear_stencil(value) };
    }

    fn color_mask(&mut self, mask: [bool; 4]) {
        unsafe { self.gl.color_mask(mask[0], mask[1], mask[2], mask[3]) };
    }

    fn clear_color(&mut self, color: [f32; 4]) {
        unsafe { self.gl.clear_color(color[0], color[1], color[2], color[3]) };
    }

    fn cull_face(&mut self, face: CullFace) {
        let face = match face {
            CullFace::Back => glow::BACK,
            CullFace::Front => glow::FRONT,
            CullFace::FrontAndBack => glow::FRONT_AND_BACK,
        };
        unsafe { self.gl.cull_face(face) };
    }

    fn front_face(&mut self, winding: FrontFace) {
        let winding = match winding {
            FrontFace::Ccw => glow::CCW,
            FrontFace::Cw => glow::CW,
        };
        unsafe { self.gl.front_face(winding) };
    }

    fn line_width(&mut self, width: f32) {
        unsafe { self.gl.line_width(width) };
    }

    fn polygon_offset(&mut self, factor: f32, units: f32) {
        unsafe { self.gl.polygon_offset(factor, units) };
    }

    fn viewport(&mut self, rect: Rect) {
        unsafe {
            self.gl
                .viewport(rect.x, rect.y, rect.width as i32, rect.height as i32);
        }
    }

    fn scissor(&mut self, rect: Rect) {
        unsafe {
            self.gl
                .scissor(rect.x, rect.y, rect.width as i32, rect.height as i32);
        }
    }

    fn clear(&mut self, mask: ClearMask) {
        unsafe { self.gl.clear(gl_clear_mask(mask)) };
    }

    // ------------------------------------------------------------------
    // Programs
    // ------------------------------------------------------------------

    fn create_program(&mut self, source: &ShaderSource) -> Result<GpuProgram, ProgramDiagnostics> {
        let vertex = self.compile_stage(glow::VERTEX_SHADER, &source.vertex);
        let fragment = self.compile_stage(glow::FRAGMENT_SHADER, &source.fragment);
        let (vertex, fragment) = match (vertex, fragment) {
            (Ok(vertex), Ok(fragment)) => (vertex, fragment),
            (vertex, fragment) => {
                let mut diagnostics = ProgramDiagnostics::default();
                for (result, log) in [
                    (vertex, &mut diagnostics.vertex_log),
                    (fragment, &mut diagnostics.fragment_log),
                ] {
                    match result {
                        Ok(shader) => unsafe { self.gl.delete_shader(shader) },
                        Err(message) => *log = message,
                    }
                }
                return Err(diagnostics);
            }
        };

        let program = unsafe {
            let program = match self.gl.create_program() {
                Ok(program) => program,
                Err(err) => {
                    self.gl.delete_shader(vertex);
                    self.gl.delete_shader(fragment);
                    return Err(ProgramDiagnostics {
                        program_log: err,
                        ..ProgramDiagnostics::default()
                    });
                }
            };
            self.gl.attach_shader(program, vertex);
            self.gl.attach_shader(program, fragment);
            self.gl.link_program(program);
            let linked = self.gl.get_program_link_status(program);
            self.gl.detach_shader(program, vertex);
            self.gl.detach_shader(program, fragment);
            self.gl.delete_shader(vertex);
            self.gl.delete_shader(fragment);
            if !linked {
                let log = self.gl.get_program_info_log(program);
                self.gl.delete_program(program);
                return Err(ProgramDiagnostics {
                    program_log: log,
                    ..ProgramDiagnostics::default()
                });
            }
            program
        };

        let (uniforms, attributes) = self.reflect(program);
        let id = self.handle();
        tracing::debug!(
            "linked program {} ({} uniforms, {} attributes)",
            source.name,
            uniforms.len(),
            attributes.len()
        );
        self.programs.insert(
            id,
            LinkedProgram {
                program,
                uniforms,
                attributes,
            },
        );
        Ok(GpuProgram(id))
    }

    fn delete_program(&mut self, program: GpuProgram) {
        if let Some(linked) = self.programs.remove(&program.0) {
            for uniform in &linked.uniforms {
                self.uniforms.remove(&uniform.location.0);
            }
            unsafe { self.gl.delete_program(linked.program) };
        }
    }

    fn active_uniforms(&self, program: GpuProgram) -> Vec<ActiveUniform> {
        self.programs
            .get(&program.0)
            .map(|p| p.uniforms.clone())
            .unwrap_or_default()
    }

    fn active_attributes(&self, program: GpuProgram) -> Vec<ActiveAttribute> {
        self.programs
            .get(&program.0)
            .map(|p| p.attributes.clone())
            .unwrap_or_default()
    }

    fn use_program(&mut self, program: Option<GpuProgram>) {
        let program = program.and_then(|p| self.programs.get(&p.0)).map(|p| p.program);
        unsafe { self.gl.use_program(program) };
    }

    fn set_uniform(&mut self, location: UniformLocation, value: UniformUpload<'_>) {
        let Some(location) = self.uniforms.get(&location.0) else {
            return;
        };
        let location = Some(location);
        let gl = &self.gl;
        unsafe {
            match value {
                UniformUpload::Float(v) => gl.uniform_1_f32_slice(location, v),
                UniformUpload::Vec2(v) => gl.uniform_2_f32_slice(location, v),
                UniformUpload::Vec3(v) => gl.uniform_3_f32_slice(location, v),
                UniformUpload::Vec4(v) => gl.uniform_4_f32_slice(location, v),
                UniformUpload::Int(v) => gl.uniform_1_i32_slice(location, v),
                UniformUpload::UInt(v) => gl.uniform_1_u32_slice(location, v),
                UniformUpload::Mat3(v) => gl.uniform_matrix_3_f32_slice(location, false, v),
                UniformUpload::Mat4(v) => gl.uniform_matrix_4_f32_slice(location, false, v),
            }
        }
    }

    // ------------------------------------------------------------------
    // Textures
    // ------------------------------------------------------------------

    fn create_texture(&mut self) -> GpuTexture {
        let id = self.handle();
        let result = unsafe { self.gl.create_texture() };
        if let Some(texture) = created(result, "texture") {
            self.textures.insert(id, texture);
        }
        GpuTexture(id)
    }

    fn delete_texture(&mut self, texture: GpuTexture) {
        if let Some(texture) = self.textures.remove(&texture.0) {
            unsafe { self.gl.delete_texture(texture) };
        }
    }

    fn active_texture(&mut self, unit: u32) {
        unsafe { self.gl.active_texture(glow::TEXTURE0 + unit) };
    }

    fn bind_texture(&mut self, target: TextureTarget, texture: Option<GpuTexture>) {
        let texture = texture.and_then(|t| self.textures.get(&t.0).copied());
        unsafe { self.gl.bind_texture(gl_texture_target(target), texture) };
    }

    fn tex_image(
        &mut self,
        target: ImageTarget,
        level: u32,
        desc: &TexImageDesc,
        data: Option<&[u8]>,
    ) {
        let gl = &self.gl;
        let internal = gl_internal_format(desc.internal_format) as i32;
        let (format, data_type) = (gl_pixel_format(desc.format), gl_pixel_type(desc.data_type));
        let (width, height, depth) = (desc.width as i32, desc.height as i32, desc.depth as i32);
        unsafe {
            if desc.internal_format.is_compressed() {
                gl.compressed_tex_image_2d(
                    gl_image_target(target),
                    level as i32,
                    internal,
                    width,
                    height,
                    0,
                    data.map_or(0, |d| d.len() as i32),
                    data.unwrap_or(&[]),
                );
                return;
            }
            match target {
                ImageTarget::Texture2DArray | ImageTarget::Texture3D => gl.tex_image_3d(
                    gl_image_target(target),
                    level as i32,
                    internal,
                    width,
                    height,
                    depth,
                    0,
                    format,
                    data_type,
                    PixelUnpackData::Slice(data),
                ),
                ImageTarget::Texture2D | ImageTarget::CubeFace(_) => gl.tex_image_2d(
                    gl_image_target(target),
                    level as i32,
                    internal,
                    width,
                    height,
                    0,
                    format,
                    data_type,
                    PixelUnpackData::Slice(data),
                ),
            }
        }
    }

    fn tex_sub_image(
        &mut self,
        target: ImageTarget,
        level: u32,
        region: TexRegion,
        format: PixelFormat,
        data_type: PixelType,
        data: &[u8],
    ) {
        let gl = &self.gl;
        let (format, data_type) = (gl_pixel_format(format), gl_pixel_type(data_type));
        unsafe {
            match target {
                ImageTarget::Texture2DArray | ImageTarget::Texture3D => gl.tex_sub_image_3d(
                    gl_image_target(target),
                    level as i32,
                    region.x as i32,
                    region.y as i32,
                    region.z as i32,
                    region.width as i32,
                    region.height as i32,
                    region.depth.max(1) as i32,
                    format,
                    data_type,
                    PixelUnpackData::Slice(Some(data)),
                ),
                ImageTarget::Texture2D | ImageTarget::CubeFace(_) => gl.tex_sub_image_2d(
                    gl_image_target(target),
                    level as i32,
                    region.x as i32,
                    region.y as i32,
                    region.width as i32,
                    region.height as i32,
                    format,
                    data_type,
                    PixelUnpackData::Slice(Some(data)),
                ),
            }
        }
    }

    fn tex_parameters(&mut self, target: TextureTarget, params: &SamplerParams) {
        let gl = &self.gl;
        let target = gl_texture_target(target);
        unsafe {
            gl.tex_parameter_i32(target, glow::TEXTURE_WRAP_S, gl_wrap(params.wrap_s));
            gl.tex_parameter_i32(target, glow::TEXTURE_WRAP_T, gl_wrap(params.wrap_t));
            gl.tex_parameter_i32(target, glow::TEXTURE_WRAP_R, gl_wrap(params.wrap_r));
            gl.tex_parameter_i32(target, glow::TEXTURE_MIN_FILTER, gl_filter(params.min_filter));
            gl.tex_parameter_i32(target, glow::TEXTURE_MAG_FILTER, gl_filter(params.mag_filter));
            match params.compare {
                Some(func) => {
                    gl.tex_parameter_i32(
                        target,
                        glow::TEXTURE_COMPARE_MODE,
                        glow::COMPARE_REF_TO_TEXTURE as i32,
                    );
                    gl.tex_parameter_i32(target, glow::TEXTURE_COMPARE_FUNC, gl_compare(func) as i32);
                }
                None => gl.tex_parameter_i32(target, glow::TEXTURE_COMPARE_MODE, glow::NONE as i32),
            }
            if params.anisotropy > 1.0 {
                gl.tex_parameter_f32(target, glow::TEXTURE_MAX_ANISOTROPY_EXT, params.anisotropy);
            }
        }
    }

    fn generate_mipmap(&mut self, target: TextureTarget) {
        unsafe { self.gl.generate_mipmap(gl_texture_target(target)) };
    }

    // ------------------------------------------------------------------
    // Buffers and vertex input
    // ------------------------------------------------------------------

    fn create_buffer(&mut self) -> GpuBuffer {
        let id = self.handle();
        let result = unsafe { self.gl.create_buffer() };
        if let Some(buffer) = created(result, "buffer") {
            self.buffers.insert(id, buffer);
        }
        GpuBuffer(id)
    }

    fn delete_buffer(&mut self, buffer: GpuBuffer) {
        if let Some(buffer) = self.buffers.remove(&buffer.0) {
            unsafe { self.gl.delete_buffer(buffer) };
        }
    }

    fn bind_buffer(&mut self, target: BufferTarget, buffer: Option<GpuBuffer>) {
        let buffer = buffer.and_then(|b| self.buffers.get(&b.0).copied());
        unsafe { self.gl.bind_buffer(gl_buffer_target(target), buffer) };
    }

    fn buffer_data(&mut self, target: BufferTarget, data: &[u8], usage: BufferUsage) {
        let usage = match usage {
            BufferUsage::StaticDraw => glow::STATIC_DRAW,
            BufferUsage::DynamicDraw => glow::DYNAMIC_DRAW,
            BufferUsage::StreamDraw => glow::STREAM_DRAW,
            BufferUsage::StreamRead => glow::STREAM_READ,
        };
        unsafe {
            self.gl
                .buffer_data_u8_slice(gl_buffer_target(target), data, usage);
        }
    }

    fn buffer_sub_data(&mut self, target: BufferTarget, offset: usize, data: &[u8]) {
        unsafe {
            self.gl
                .buffer_sub_data_u8_slice(gl_buffer_target(target), offset as i32, data);
        }
    }

    fn enable_vertex_attrib(&mut self, location: u32) {
        unsafe { self.gl.enable_vertex_attrib_array(location) };
    }

    fn disable_vertex_attrib(&mut self, location: u32) {
        unsafe { self.gl.disable_vertex_attrib_array(location) };
    }

    fn vertex_attrib_pointer(
        &mut self,
        location: u32,
        size: u32,
        component: ComponentType,
        normalized: bool,
        stride: usize,
        offset: usize,
    ) {
        let (size, stride, offset) = (size as i32, stride as i32, offset as i32);
        unsafe {
            match component {
                ComponentType::Float => self.gl.vertex_attrib_pointer_f32(
                    location,
                    size,
                    glow::FLOAT,
                    normalized,
                    stride,
                    offset,
                ),
                ComponentType::UnsignedShort if normalized => self.gl.vertex_attrib_pointer_f32(
                    location,
                    size,
                    glow::UNSIGNED_SHORT,
                    true,
                    stride,
                    offset,
                ),
                ComponentType::UnsignedShort => self.gl.vertex_attrib_pointer_i32(
                    location,
                    size,
                    glow::UNSIGNED_SHORT,
                    stride,
                    offset,
                ),
                ComponentType::UnsignedInt => self.gl.vertex_attrib_pointer_i32(
                    location,
                    size,
                    glow::UNSIGNED_INT,
                    stride,
                    offset,
                ),
            }
        }
    }

    fn vertex_attrib_divisor(&mut self, location: u32, divisor: u32) {
        unsafe { self.gl.vertex_attrib_divisor(location, divisor) };
    }

    // ------------------------------------------------------------------
    // Framebuffers
    // ------------------------------------------------------------------

    fn create_framebuffer(&mut self) -> GpuFramebuffer {
        let id = self.handle();
        let result = unsafe { self.gl.create_framebuffer() };
        if let Some(framebuffer) = created(result, "framebuffer") {
            self.framebuffers.insert(id, framebuffer);
        }
        GpuFramebuffer(id)
    }

    fn delete_framebuffer(&mut self, framebuffer: GpuFramebuffer) {
        if let Some(framebuffer) = self.framebuffers.remove(&framebuffer.0) {
            unsafe { self.gl.delete_framebuffer(framebuffer) };
        }
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<GpuFramebuffer>) {
        let framebuffer = framebuffer.and_then(|f| self.framebuffers.get(&f.0).copied());
        unsafe { self.gl.bind_framebuffer(glow::FRAMEBUFFER, framebuffer) };
    }

    fn framebuffer_texture(
        &mut self,
        attachment: Attachment,
        target: ImageTarget,
        texture: Option<GpuTexture>,
        level: u32,
        layer: u32,
    ) {
        let texture = texture.and_then(|t| self.textures.get(&t.0).copied());
        let attachment = gl_attachment(attachment);
        unsafe {
            match target {
                ImageTarget::Texture2DArray | ImageTarget::Texture3D => {
                    self.gl.framebuffer_texture_layer(
                        glow::FRAMEBUFFER,
                        attachment,
                        texture,
                        level as i32,
                        layer as i32,
                    );
                }
                ImageTarget::Texture2D | ImageTarget::CubeFace(_) => {
                    self.gl.framebuffer_texture_2d(
                        glow::FRAMEBUFFER,
                        attachment,
                        gl_image_target(target),
                        texture,
                        level as i32,
                    );
                }
            }
        }
    }

    fn create_renderbuffer(&mut self) -> GpuRenderbuffer {
        let id = self.handle();
        let result = unsafe { self.gl.create_renderbuffer() };
        if let Some(renderbuffer) = created(result, "renderbuffer") {
            self.renderbuffers.insert(id, renderbuffer);
        }
        GpuRenderbuffer(id)
    }

    fn delete_renderbuffer(&mut self, renderbuffer: GpuRenderbuffer) {
        if let Some(renderbuffer) = self.renderbuffers.remove(&renderbuffer.0) {
            unsafe { self.gl.delete_renderbuffer(renderbuffer) };
        }
    }

    fn renderbuffer_storage(
        &mut self,
        renderbuffer: GpuRenderbuffer,
        format: InternalFormat,
        width: u32,
        height: u32,
        samples: u32,
    ) {
        let Some(renderbuffer) = self.renderbuffers.get(&renderbuffer.0).copied() else {
            return;
        };
        let format = gl_internal_format(format);
        unsafe {
            self.gl
                .bind_renderbuffer(glow::RENDERBUFFER, Some(renderbuffer));
            if samples > 0 {
                self.gl.renderbuffer_storage_multisample(
                    glow::RENDERBUFFER,
                    samples as i32,
                    format,
                    width as i32,
                    height as i32,
                );
            } else {
                self.gl
                    .renderbuffer_storage(glow::RENDERBUFFER, format, width as i32, height as i32);
            }
            self.gl.bind_renderbuffer(glow::RENDERBUFFER, None);
        }
    }

    fn framebuffer_renderbuffer(&mut self, attachment: Attachment, renderbuffer: GpuRenderbuffer) {
        let renderbuffer = self.renderbuffers.get(&renderbuffer.0).copied();
        unsafe {
            self.gl.framebuffer_renderbuffer(
                glow::FRAMEBUFFER,
                gl_attachment(attachment),
                glow::RENDERBUFFER,
                renderbuffer,
            );
        }
    }

    fn blit_framebuffer(
        &mut self,
        source: Option<GpuFramebuffer>,
        destination: Option<GpuFramebuffer>,
        width: u32,
        height: u32,
        mask: ClearMask,
    ) {
        let source = source.and_then(|f| self.framebuffers.get(&f.0).copied());
        let destination = destination.and_then(|f| self.framebuffers.get(&f.0).copied());
        let (w, h) = (width as i32, height as i32);
        unsafe {
            self.gl.bind_framebuffer(glow::READ_FRAMEBUFFER, source);
            self.gl.bind_framebuffer(glow::DRAW_FRAMEBUFFER, destination);
            self.gl
                .blit_framebuffer(0, 0, w, h, 0, 0, w, h, gl_clear_mask(mask), glow::NEAREST);
            self.gl.bind_framebuffer(glow::FRAMEBUFFER, destination);
        }
    }

    fn read_pixels(&mut self, rect: Rect, format: PixelFormat, data_type: PixelType, out: &mut [u8]) {
        unsafe {
            self.gl.read_pixels(
                rect.x,
                rect.y,
                rect.width as i32,
                rect.height as i32,
                gl_pixel_format(format),
                gl_pixel_type(data_type),
                PixelPackData::Slice(Some(out)),
            );
        }
    }

    // ------------------------------------------------------------------
    // Draws
    // ------------------------------------------------------------------

    fn draw_arrays(&mut self, mode: DrawMode, first: u32, count: u32, instances: u32) {
        let mode = gl_draw_mode(mode);
        unsafe {
            if instances > 1 {
                self.gl
                    .draw_arrays_instanced(mode, first as i32, count as i32, instances as i32);
            } else {
                self.gl.draw_arrays(mode, first as i32, count as i32);
            }
        }
    }

    fn draw_elements(
        &mut self,
        mode: DrawMode,
        count: u32,
        index_type: IndexType,
        offset: usize,
        instances: u32,
    ) {
        let mode = gl_draw_mode(mode);
        let index_type = match index_type {
            IndexType::U16 => glow::UNSIGNED_SHORT,
            IndexType::U32 => glow::UNSIGNED_INT,
        };
        unsafe {
            if instances > 1 {
                self.gl.draw_elements_instanced(
                    mode,
                    count as i32,
                    index_type,
                    offset as i32,
                    instances as i32,
                );
            } else {
                self.gl
                    .draw_elements(mode, count as i32, index_type, offset as i32);
            }
        }
    }

    // ------------------------------------------------------------------
    // Synchronisation
    // ------------------------------------------------------------------

    fn fence_sync(&mut self) -> GpuFence {
        let id = self.handle();
        let result = unsafe { self.gl.fence_sync(glow::SYNC_GPU_COMMANDS_COMPLETE, 0) };
        if let Some(fence) = created(result, "fence") {
            self.fences.insert(id, fence);
        }
        GpuFence(id)
    }

    fn fence_signaled(&mut self, fence: GpuFence) -> bool {
        match self.fences.get(&fence.0) {
            Some(fence) => unsafe { self.gl.get_sync_status(*fence) == glow::SIGNALED },
            // Never created: nothing to wait for
            None => true,
        }
    }

    fn delete_fence(&mut self, fence: GpuFence) {
        if let Some(fence) = self.fences.remove(&fence.0) {
            unsafe { self.gl.delete_sync(fence) };
        }
    }
}

impl Drop for GlowDevice {
    fn drop(&mut self) {
        if self.context_lost {
            return;
        }
        if let Some(vao) = self.vertex_array.take() {
            unsafe { self.gl.delete_vertex_array(vao) };
        }
    }
}

fn created<T>(result: Result<T, String>, kind: &str) -> Option<T> {
    match result {
        Ok(object) => Some(object),
        Err(err) => {
            tracing::warn!("failed to create {}: {}", kind, err);
            None
        }
    }
}

// ----------------------------------------------------------------------
// Enum translation
// ----------------------------------------------------------------------

fn gl_capability(capability: Capability) -> u32 {
    match capability {
        Capability::Blend => glow::BLEND,
        Capability::DepthTest => glow::DEPTH_TEST,
        Capability::StencilTest => glow::STENCIL_TEST,
        Capability::CullFace => glow::CULL_FACE,
        Capability::ScissorTest => glow::SCISSOR_TEST,
        Capability::PolygonOffsetFill => glow::POLYGON_OFFSET_FILL,
        Capability::SampleAlphaToCoverage => glow::SAMPLE_ALPHA_TO_COVERAGE,
        Capability::Dither => glow::DITHER,
    }
}

fn gl_blend_equation(equation: BlendEquation) -> u32 {
    match equation {
        BlendEquation::Add => glow::FUNC_ADD,
        BlendEquation::Subtract => glow::FUNC_SUBTRACT,
        BlendEquation::ReverseSubtract => glow::FUNC_REVERSE_SUBTRACT,
        BlendEquation::Min => glow::MIN,
        BlendEquation::Max => glow::MAX,
    }
}

fn gl_blend_factor(factor: BlendFactor) -> u32 {
    match factor {
        BlendFactor::Zero => glow::ZERO,
        BlendFactor::One => glow::ONE,
        BlendFactor::SrcColor => glow::SRC_COLOR,
        BlendFactor::OneMinusSrcColor => glow::ONE_MINUS_SRC_COLOR,
        BlendFactor::SrcAlpha => glow::SRC_ALPHA,
        BlendFactor::OneMinusSrcAlpha => glow::ONE_MINUS_SRC_ALPHA,
        BlendFactor::DstAlpha => glow::DST_ALPHA,
        BlendFactor::OneMinusDstAlpha => glow::ONE_MINUS_DST_ALPHA,
        BlendFactor::DstColor => glow::DST_COLOR,
        BlendFactor::OneMinusDstColor => glow::ONE_MINUS_DST_COLOR,
        BlendFactor::SrcAlphaSaturate => glow::SRC_ALPHA_SATURATE,
        BlendFactor::ConstantColor => glow::CONSTANT_COLOR,
        BlendFactor::OneMinusConstantColor => glow::ONE_MINUS_CONSTANT_COLOR,
        BlendFactor::ConstantAlpha => glow::CONSTANT_ALPHA,
        BlendFactor::OneMinusConstantAlpha => glow::ONE_MINUS_CONSTANT_ALPHA,
    }
}

fn gl_compare(func: CompareFunction) -> u32 {
    match func {
        CompareFunction::Never => glow::NEVER,
        CompareFunction::Less => glow::LESS,
        CompareFunction::Equal => glow::EQUAL,
        CompareFunction::LessEqual => glow::LEQUAL,
        CompareFunction::Greater => glow::GREATER,
        CompareFunction::NotEqual => glow::NOTEQUAL,
        CompareFunction::GreaterEqual => glow::GEQUAL,
        CompareFunction::Always => glow::ALWAYS,
    }
}

fn gl_stencil_op(op: StencilOp) -> u32 {
    match op {
        StencilOp::Keep => glow::KEEP,
        StencilOp::Zero => glow::ZERO,
        StencilOp::Replace => glow::REPLACE,
        StencilOp::Increment => glow::INCR,
        StencilOp::IncrementWrap => glow::INCR_WRAP,
        StencilOp::Decrement => glow::DECR,
        StencilOp::DecrementWrap => glow::DECR_WRAP,
        StencilOp::Invert => glow::INVERT,
    }
}

fn gl_clear_mask(mask: ClearMask) -> u32 {
    let mut bits = 0;
    if mask.contains(ClearMask::COLOR) {
        bits |= glow::COLOR_BUFFER_BIT;
    }
    if mask.contains(ClearMask::DEPTH) {
        bits |= glow::DEPTH_BUFFER_BIT;
    }
    if mask.contains(ClearMask::STENCIL) {
        bits |= glow::STENCIL_BUFFER_BIT;
    }
    bits
}

fn gl_texture_target(target: TextureTarget) -> u32 {
    match target {
        TextureTarget::Texture2D => glow::TEXTURE_2D,
        TextureTarget::CubeMap => glow::TEXTURE_CUBE_MAP,
        TextureTarget::Texture2DArray => glow::TEXTURE_2D_ARRAY,
        TextureTarget::Texture3D => glow::TEXTURE_3D,
    }
}

fn gl_image_target(target: ImageTarget) -> u32 {
    match target {
        ImageTarget::Texture2D => glow::TEXTURE_2D,
        ImageTarget::CubeFace(face) => glow::TEXTURE_CUBE_MAP_POSITIVE_X + u32::from(face.min(5)),
        ImageTarget::Texture2DArray => glow::TEXTURE_2D_ARRAY,
        ImageTarget::Texture3D => glow::TEXTURE_3D,
    }
}

fn gl_pixel_format(format: PixelFormat) -> u32 {
    match format {
        PixelFormat::Alpha => glow::ALPHA,
        PixelFormat::Red => glow::RED,
        PixelFormat::Rg => glow::RG,
        PixelFormat::Rgb => glow::RGB,
        PixelFormat::Rgba => glow::RGBA,
        PixelFormat::RedInteger => glow::RED_INTEGER,
        PixelFormat::RgInteger => glow::RG_INTEGER,
        PixelFormat::RgbaInteger => glow::RGBA_INTEGER,
        PixelFormat::Depth => glow::DEPTH_COMPONENT,
        PixelFormat::DepthStencil => glow::DEPTH_STENCIL,
    }
}

fn pixel_format_from_gl(value: u32) -> Option<PixelFormat> {
    Some(match value {
        glow::ALPHA => PixelFormat::Alpha,
        glow::RED => PixelFormat::Red,
        glow::RG => PixelFormat::Rg,
        glow::RGB => PixelFormat::Rgb,
        glow::RGBA => PixelFormat::Rgba,
        glow::RED_INTEGER => PixelFormat::RedInteger,
        glow::RG_INTEGER => PixelFormat::RgInteger,
        glow::RGBA_INTEGER => PixelFormat::RgbaInteger,
        _ => return None,
    })
}

fn gl_pixel_type(data_type: PixelType) -> u32 {
    match data_type {
        PixelType::UnsignedByte => glow::UNSIGNED_BYTE,
        PixelType::Byte => glow::BYTE,
        PixelType::UnsignedShort => glow::UNSIGNED_SHORT,
        PixelType::Short => glow::SHORT,
        PixelType::UnsignedInt => glow::UNSIGNED_INT,
        PixelType::Int => glow::INT,
        PixelType::HalfFloat => glow::HALF_FLOAT,
        PixelType::Float => glow::FLOAT,
        PixelType::UnsignedInt248 => glow::UNSIGNED_INT_24_8,
    }
}

fn pixel_type_from_gl(value: u32) -> Option<PixelType> {
    Some(match value {
        glow::UNSIGNED_BYTE => PixelType::UnsignedByte,
        glow::BYTE => PixelType::Byte,
        glow::UNSIGNED_SHORT => PixelType::UnsignedShort,
        glow::SHORT => PixelType::Short,
        glow::UNSIGNED_INT => PixelType::UnsignedInt,
        glow::INT => PixelType::Int,
        glow::HALF_FLOAT => PixelType::HalfFloat,
        glow::FLOAT => PixelType::Float,
        _ => return None,
    })
}

fn gl_internal_format(format: InternalFormat) -> u32 {
    match format {
        InternalFormat::R8 => glow::R8,
        InternalFormat::Rg8 => glow::RG8,
        InternalFormat::Rgb8 => glow::RGB8,
        InternalFormat::Rgba8 => glow::RGBA8,
        InternalFormat::Srgb8Alpha8 => glow::SRGB8_ALPHA8,
        InternalFormat::R16F => glow::R16F,
        InternalFormat::Rg16F => glow::RG16F,
        InternalFormat::Rgba16F => glow::RGBA16F,
        InternalFormat::R32F => glow::R32F,
        InternalFormat::Rg32F => glow::RG32F,
        InternalFormat::Rgba32F => glow::RGBA32F,
        InternalFormat::Depth16 => glow::DEPTH_COMPONENT16,
        InternalFormat::Depth24 => glow::DEPTH_COMPONENT24,
        InternalFormat::Depth32F => glow::DEPTH_COMPONENT32F,
        InternalFormat::Depth24Stencil8 => glow::DEPTH24_STENCIL8,
        InternalFormat::CompressedRgbaS3tcDxt5 => glow::COMPRESSED_RGBA_S3TC_DXT5_EXT,
        InternalFormat::CompressedRgbaAstc4x4 => glow::COMPRESSED_RGBA_ASTC_4x4_KHR,
        InternalFormat::CompressedRgbaBptc => glow::COMPRESSED_RGBA_BPTC_UNORM,
        InternalFormat::CompressedRgbEtc2 => glow::COMPRESSED_RGB8_ETC2,
    }
}

fn gl_wrap(wrap: Wrapping) -> i32 {
    (match wrap {
        Wrapping::Repeat => glow::REPEAT,
        Wrapping::ClampToEdge => glow::CLAMP_TO_EDGE,
        Wrapping::MirroredRepeat => glow::MIRRORED_REPEAT,
    }) as i32
}

fn gl_filter(filter: Filter) -> i32 {
    (match filter {
        Filter::Nearest => glow::NEAREST,
        Filter::Linear => glow::LINEAR,
        Filter::NearestMipmapNearest => glow::NEAREST_MIPMAP_NEAREST,
        Filter::NearestMipmapLinear => glow::NEAREST_MIPMAP_LINEAR,
        Filter::LinearMipmapNearest => glow::LINEAR_MIPMAP_NEAREST,
        Filter::LinearMipmapLinear => glow::LINEAR_MIPMAP_LINEAR,
    }) as i32
}

fn gl_buffer_target(target: BufferTarget) -> u32 {
    match target {
        BufferTarget::Array => glow::ARRAY_BUFFER,
        BufferTarget::ElementArray => glow::ELEMENT_ARRAY_BUFFER,
        BufferTarget::PixelPack => glow::PIXEL_PACK_BUFFER,
    }
}

fn gl_attachment(attachment: Attachment) -> u32 {
    match attachment {
        Attachment::Color(index) => glow::COLOR_ATTACHMENT0 + index,
        Attachment::Depth => glow::DEPTH_ATTACHMENT,
        Attachment::Stencil => glow::STENCIL_ATTACHMENT,
        Attachment::DepthStencil => glow::DEPTH_STENCIL_ATTACHMENT,
    }
}

fn gl_draw_mode(mode: DrawMode) -> u32 {
    match mode {
        DrawMode::Points => glow::POINTS,
        DrawMode::Lines => glow::LINES,
        DrawMode::LineStrip => glow::LINE_STRIP,
        DrawMode::LineLoop => glow::LINE_LOOP,
        DrawMode::Triangles => glow::TRIANGLES,
        DrawMode::TriangleStrip => glow::TRIANGLE_STRIP,
    }
}

fn uniform_type(value: u32) -> Option<UniformType> {
    Some(match value {
        glow::FLOAT => UniformType::Float,
        glow::FLOAT_VEC2 => UniformType::Vec2,
        glow::FLOAT_VEC3 => UniformType::Vec3,
        glow::FLOAT_VEC4 => UniformType::Vec4,
        glow::INT => UniformType::Int,
        glow::INT_VEC2 => UniformType::IVec2,
        glow::INT_VEC3 => UniformType::IVec3,
        glow::INT_VEC4 => UniformType::IVec4,
        glow::UNSIGNED_INT => UniformType::UInt,
        glow::BOOL => UniformType::Bool,
        glow::FLOAT_MAT2 => UniformType::Mat2,
        glow::FLOAT_MAT3 => UniformType::Mat3,
        glow::FLOAT_MAT4 => UniformType::Mat4,
        glow::SAMPLER_2D => UniformType::Sampler2D,
        glow::SAMPLER_CUBE => UniformType::SamplerCube,
        glow::SAMPLER_2D_ARRAY => UniformType::Sampler2DArray,
        glow::SAMPLER_3D => UniformType::Sampler3D,
        glow::SAMPLER_2D_SHADOW => UniformType::Sampler2DShadow,
        _ => return None,
    })
}
