//! Headless device that records every command
//!
//! `RecordingDevice` behaves like a well-formed driver without touching any
//! GPU: it hands out handles, reflects uniforms and attributes from shader
//! text, remembers clear colours for readback and keeps a command log that
//! tests and tooling can inspect (draw counts, state-change counts, which
//! framebuffer each draw went to).
//!
//! Handles are tied to a context generation. After a simulated context loss
//! any use of a handle created before the loss is reported as a
//! [`DeviceError::UnknownHandle`], which is how tests prove that the renderer
//! rebuilt every resource instead of reusing stale ones.

use hashbrown::{HashMap, HashSet};

use super::types::*;
use super::GpuDevice;

/// One recorded driver call
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCommand {
    Enable(Capability),
    Disable(Capability),
    BlendEquation {
        rgb: BlendEquation,
        alpha: BlendEquation,
    },
    BlendFunc {
        src_rgb: BlendFactor,
        dst_rgb: BlendFactor,
        src_alpha: BlendFactor,
        dst_alpha: BlendFactor,
    },
    BlendColor([f32; 4]),
    DepthFunc(CompareFunction),
    DepthMask(bool),
    ClearDepth(f32),
    StencilMask(u32),
    StencilFunc {
        func: CompareFunction,
        reference: i32,
        mask: u32,
    },
    StencilOp {
        fail: StencilOp,
        depth_fail: StencilOp,
        pass: StencilOp,
    },
    ClearStencil(i32),
    ColorMask([bool; 4]),
    ClearColor([f32; 4]),
    CullFace(CullFace),
    FrontFace(FrontFace),
    LineWidth(f32),
    PolygonOffset {
        factor: f32,
        units: f32,
    },
    Viewport(Rect),
    Scissor(Rect),
    Clear {
        mask: ClearMask,
        framebuffer: Option<GpuFramebuffer>,
    },
    CreateProgram {
        program: GpuProgram,
        name: String,
    },
    CompileFailed {
        name: String,
    },
    DeleteProgram(GpuProgram),
    UseProgram(Option<GpuProgram>),
    SetUniform {
        program: Option<GpuProgram>,
        location: UniformLocation,
        data: RecordedUniform,
    },
    CreateTexture(GpuTexture),
    DeleteTexture(GpuTexture),
    ActiveTexture(u32),
    BindTexture {
        target: TextureTarget,
        texture: Option<GpuTexture>,
    },
    TexImage {
        target: ImageTarget,
        level: u32,
        desc: TexImageDesc,
        bytes: usize,
    },
    TexSubImage {
        target: ImageTarget,
        level: u32,
        region: TexRegion,
        bytes: usize,
    },
    TexParameters {
        target: TextureTarget,
        params: SamplerParams,
    },
    GenerateMipmap(TextureTarget),
    CreateBuffer(GpuBuffer),
    DeleteBuffer(GpuBuffer),
    BindBuffer {
        target: BufferTarget,
        buffer: Option<GpuBuffer>,
    },
    BufferData {
        target: BufferTarget,
        bytes: usize,
        usage: BufferUsage,
    },
    BufferSubData {
        target: BufferTarget,
        offset: usize,
        bytes: usize,
    },
    EnableVertexAttrib(u32),
    DisableVertexAttrib(u32),
    VertexAttribPointer {
        location: u32,
        size: u32,
        component: ComponentType,
        normalized: bool,
        stride: usize,
        offset: usize,
    },
    VertexAttribDivisor {
        location: u32,
        divisor: u32,
    },
    CreateFramebuffer(GpuFramebuffer),
    DeleteFramebuffer(GpuFramebuffer),
    BindFramebuffer(Option<GpuFramebuffer>),
    FramebufferTexture {
        attachment: Attachment,
        target: ImageTarget,
        texture: Option<GpuTexture>,
        level: u32,
        layer: u32,
    },
    CreateRenderbuffer(GpuRenderbuffer),
    DeleteRenderbuffer(GpuRenderbuffer),
    RenderbufferStorage {
        renderbuffer: GpuRenderbuffer,
        format: InternalFormat,
        width: u32,
        height: u32,
        samples: u32,
    },
    FramebufferRenderbuffer {
        attachment: Attachment,
        renderbuffer: GpuRenderbuffer,
    },
    BlitFramebuffer {
        source: Option<GpuFramebuffer>,
        destination: Option<GpuFramebuffer>,
    },
    ReadPixels {
        rect: Rect,
        format: PixelFormat,
        data_type: PixelType,
    },
    Draw {
        mode: DrawMode,
        count: u32,
        instances: u32,
        indexed: bool,
        program: Option<GpuProgram>,
        framebuffer: Option<GpuFramebuffer>,
    },
    FenceSync(GpuFence),
    DeleteFence(GpuFence),
    ContextLost,
    ContextRestored,
}

/// Owned copy of a uniform payload
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedUniform {
    Floats { components: u8, values: Vec<f32> },
    Ints(Vec<i32>),
    UInts(Vec<u32>),
}

/// Misuse detected by the recording device
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeviceError {
    #[error("{kind} handle {id} does not belong to the current context")]
    UnknownHandle { kind: &'static str, id: u32 },
    #[error("draw call issued without a program in use")]
    DrawWithoutProgram,
}

#[derive(Debug, Clone, Default)]
struct ReflectedProgram {
    uniforms: Vec<ActiveUniform>,
    attributes: Vec<ActiveAttribute>,
}

/// Headless [`GpuDevice`] that records every call.
#[derive(Debug)]
pub struct RecordingDevice {
    commands: Vec<DeviceCommand>,
    errors: Vec<DeviceError>,
    parameters: DeviceParameters,
    extensions: Vec<String>,
    read_format: (PixelFormat, PixelType),
    max_precision: Precision,
    next_handle: u32,
    live: HashSet<u32>,
    context_lost: bool,
    compile_failure_marker: Option<String>,
    compile_latency: u32,
    pending_programs: HashMap<u32, u32>,
    programs: HashMap<u32, ReflectedProgram>,
    fence_latency: u32,
    fences: HashMap<u32, u32>,
    current_program: Option<GpuProgram>,
    bound_framebuffer: Option<GpuFramebuffer>,
    clear_color: [f32; 4],
    framebuffer_colors: HashMap<Option<GpuFramebuffer>, [f32; 4]>,
}

impl Default for RecordingDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingDevice {
    /// Device with default limits and the common WebGL2 extension set.
    pub fn new() -> Self {
        Self {
            commands: Vec::new(),
            errors: Vec::new(),
            parameters: DeviceParameters::default(),
            extensions: [
                "EXT_texture_filter_anisotropic",
                "EXT_color_buffer_float",
                "EXT_color_buffer_half_float",
                "OES_texture_float_linear",
                "WEBGL_compressed_texture_s3tc",
                "KHR_parallel_shader_compile",
                "WEBGL_multi_draw",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            read_format: (PixelFormat::Rgba, PixelType::UnsignedByte),
            max_precision: Precision::High,
            next_handle: 1,
            live: HashSet::new(),
            context_lost: false,
            compile_failure_marker: None,
            compile_latency: 0,
            pending_programs: HashMap::new(),
            programs: HashMap::new(),
            fence_latency: 1,
            fences: HashMap::new(),
            current_program: None,
            bound_framebuffer: None,
            clear_color: [0.0; 4],
            framebuffer_colors: HashMap::new(),
        }
    }

    pub fn with_parameters(mut self, parameters: DeviceParameters) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    /// Highest float precision the simulated driver supports.
    pub fn with_max_precision(mut self, precision: Precision) -> Self {
        self.max_precision = precision;
        self
    }

    /// Any shader containing `marker` fails to compile.
    pub fn set_compile_failure_marker(&mut self, marker: impl Into<String>) {
        self.compile_failure_marker = Some(marker.into());
    }

    /// Number of `program_ready` polls before a new program reports ready.
    pub fn set_compile_latency(&mut self, polls: u32) {
        self.compile_latency = polls;
    }

    /// Number of `fence_signaled` polls before a fence signals.
    pub fn set_fence_latency(&mut self, polls: u32) {
        self.fence_latency = polls;
    }

    pub fn set_read_format(&mut self, format: PixelFormat, data_type: PixelType) {
        self.read_format = (format, data_type);
    }

    pub fn commands(&self) -> &[DeviceCommand] {
        &self.commands
    }

    pub fn take_commands(&mut self) -> Vec<DeviceCommand> {
        std::mem::take(&mut self.commands)
    }

    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    pub fn errors(&self) -> &[DeviceError] {
        &self.errors
    }

    /// Recorded draw calls, in submission order.
    pub fn draw_calls(&self) -> impl Iterator<Item = &DeviceCommand> {
        self.commands
            .iter()
            .filter(|c| matches!(c, DeviceCommand::Draw { .. }))
    }

    /// Number of recorded commands matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&DeviceCommand) -> bool) -> usize {
        self.commands.iter().filter(|c| predicate(c)).count()
    }

    /// Number of live programs in the current context.
    pub fn live_programs(&self) -> usize {
        self.programs.len()
    }

    fn alloc(&mut self) -> u32 {
        let id = self.next_handle;
        self.next_handle += 1;
        if !self.context_lost {
            self.live.insert(id);
        }
        id
    }

    fn check(&mut self, kind: &'static str, id: u32) {
        if !self.live.contains(&id) {
            self.errors.push(DeviceError::UnknownHandle { kind, id });
        }
    }

    fn record(&mut self, command: DeviceCommand) {
        if !self.context_lost {
            self.commands.push(command);
        }
    }

    fn fail_line(&self, text: &str) -> Option<usize> {
        let marker = self.compile_failure_marker.as_deref()?;
        text.lines()
            .position(|line| line.contains(marker))
            .map(|index| index + 1)
    }
}

impl GpuDevice for RecordingDevice {
    fn parameters(&self) -> DeviceParameters {
        self.parameters.clone()
    }

    fn extensions(&self) -> Vec<String> {
        self.extensions.clone()
    }

    fn shader_precision_supported(&self, _stage: ShaderStage, precision: Precision) -> bool {
        // Precision ordering: High > Medium > Low
        let rank = |p: Precision| match p {
            Precision::High => 2,
            Precision::Medium => 1,
            Precision::Low => 0,
        };
        rank(precision) <= rank(self.max_precision)
    }

    fn is_context_lost(&self) -> bool {
        self.context_lost
    }

    fn implementation_read_format(&self) -> (PixelFormat, PixelType) {
        self.read_format
    }

    fn enable(&mut self, capability: Capability) {
        self.record(DeviceCommand::Enable(capability));
    }

    fn disable(&mut self, capability: Capability) {
        self.record(DeviceCommand::Disable(capability));
    }

    fn blend_equation_separate(&mut self, rgb: BlendEquation, alpha: BlendEquation) {
        self.record(DeviceCommand::BlendEquation { rgb, alpha });
    }

    fn blend_func_separate(
        &mut self,
        src_rgb: BlendFactor,
        dst_rgb: BlendFactor,
        src_alpha: BlendFactor,
        dst_alpha: BlendFactor,
    ) {
        self.record(DeviceCommand::BlendFunc {
            src_rgb,
            dst_rgb,
            src_alpha,
            dst_alpha,
        });
    }

    fn blend_color(&mut self, color: [f32; 4]) {
        self.record(DeviceCommand::BlendColor(color));
    }

    fn depth_func(&mut self, func: CompareFunction) {
        self.record(DeviceCommand::DepthFunc(func));
    }

    fn depth_mask(&mut self, write: bool) {
        self.record(DeviceCommand::DepthMask(write));
    }

    fn clear_depth(&mut self, depth: f32) {
        self.record(DeviceCommand::ClearDepth(depth));
    }

    fn stencil_mask(&mut self, mask: u32) {
        self.record(DeviceCommand::StencilMask(mask));
    }

    fn stencil_func(&mut self, func: CompareFunction, reference: i32, mask: u32) {
        self.record(DeviceCommand::StencilFunc {
            func,
            reference,
            mask,
        });
    }

    fn stencil_op(&mut self, fail: StencilOp, depth_fail: StencilOp, pass: StencilOp) {
        self.record(DeviceCommand::StencilOp {
            fail,
            depth_fail,
            pass,
        });
    }

    fn clear_stencil(&mut self, value: i32) {
        self.record(DeviceCommand::ClearStencil(value));
    }

    fn color_mask(&mut self, mask: [bool; 4]) {
        self.record(DeviceCommand::ColorMask(mask));
    }

    fn clear_color(&mut self, color: [f32; 4]) {
        self.clear_color = color;
        self.record(DeviceCommand::ClearColor(color));
    }

    fn cull_face(&mut self, face: CullFace) {
        self.record(DeviceCommand::CullFace(face));
    }

    fn front_face(&mut self, winding: FrontFace) {
        self.record(DeviceCommand::FrontFace(winding));
    }

    fn line_width(&mut self, width: f32) {
        self.record(DeviceCommand::LineWidth(width));
    }

    fn polygon_offset(&mut self, factor: f32, units: f32) {
        self.record(DeviceCommand::PolygonOffset { factor, units });
    }

    fn viewport(&mut self, rect: Rect) {
        self.record(DeviceCommand::Viewport(rect));
    }

    fn scissor(&mut self, rect: Rect) {
        self.record(DeviceCommand::Scissor(rect));
    }

    fn clear(&mut self, mask: ClearMask) {
        if mask.contains(ClearMask::COLOR) {
            self.framebuffer_colors
                .insert(self.bound_framebuffer, self.clear_color);
        }
        self.record(DeviceCommand::Clear {
            mask,
            framebuffer: self.bound_framebuffer,
        });
    }

    fn create_program(&mut self, source: &ShaderSource) -> Result<GpuProgram, ProgramDiagnostics> {
        let vertex_line = self.fail_line(&source.vertex);
        let fragment_line = self.fail_line(&source.fragment);
        if vertex_line.is_some() || fragment_line.is_some() {
            let marker = self.compile_failure_marker.clone().unwrap_or_default();
            let log = |line: Option<usize>| {
                line.map(|l| format!("ERROR: 0:{}: '{}' : syntax error\n", l, marker))
                    .unwrap_or_default()
            };
            self.record(DeviceCommand::CompileFailed {
                name: source.name.clone(),
            });
            return Err(ProgramDiagnostics {
                vertex_log: log(vertex_line),
                fragment_log: log(fragment_line),
                program_log: "Program link failed: shader compilation errors".to_string(),
            });
        }

        let program = GpuProgram(self.alloc());
        let reflected = ReflectedProgram {
            uniforms: reflect::uniforms(&source.vertex, &source.fragment),
            attributes: reflect::attributes(&source.vertex),
        };
        self.programs.insert(program.0, reflected);
        if self.compile_latency > 0 {
            self.pending_programs.insert(program.0, self.compile_latency);
        }
        self.record(DeviceCommand::CreateProgram {
            program,
            name: source.name.clone(),
        });
        Ok(program)
    }

    fn program_ready(&mut self, program: GpuProgram) -> bool {
        match self.pending_programs.get_mut(&program.0) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                false
            }
            Some(_) => {
                self.pending_programs.remove(&program.0);
                true
            }
            None => true,
        }
    }

    fn delete_program(&mut self, program: GpuProgram) {
        self.check("program", program.0);
        self.programs.remove(&program.0);
        self.live.remove(&program.0);
        self.record(DeviceCommand::DeleteProgram(program));
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
        if let Some(p) = program {
            self.check("program", p.0);
        }
        self.current_program = program;
        self.record(DeviceCommand::UseProgram(program));
    }

    fn set_uniform(&mut self, location: UniformLocation, value: UniformUpload<'_>) {
        let data = match value {
            UniformUpload::Float(v) => RecordedUniform::Floats {
                components: 1,
                values: v.to_vec(),
            },
            UniformUpload::Vec2(v) => RecordedUniform::Floats {
                components: 2,
                values: v.to_vec(),
            },
            UniformUpload::Vec3(v) => RecordedUniform::Floats {
                components: 3,
                values: v.to_vec(),
            },
            UniformUpload::Vec4(v) => RecordedUniform::Floats {
                components: 4,
                values: v.to_vec(),
            },
            UniformUpload::Mat3(v) => RecordedUniform::Floats {
                components: 9,
                values: v.to_vec(),
            },
            UniformUpload::Mat4(v) => RecordedUniform::Floats {
                components: 16,
                values: v.to_vec(),
            },
            UniformUpload::Int(v) => RecordedUniform::Ints(v.to_vec()),
            UniformUpload::UInt(v) => RecordedUniform::UInts(v.to_vec()),
        };
        self.record(DeviceCommand::SetUniform {
            program: self.current_program,
            location,
            data,
        });
    }

    fn create_texture(&mut self) -> GpuTexture {
        let texture = GpuTexture(self.alloc());
        self.record(DeviceCommand::CreateTexture(texture));
        texture
    }

    fn delete_texture(&mut self, texture: GpuTexture) {
        self.check("texture", texture.0);
        self.live.remove(&texture.0);
        self.record(DeviceCommand::DeleteTexture(texture));
    }

    fn active_texture(&mut self, unit: u32) {
        self.record(DeviceCommand::ActiveTexture(unit));
    }

    fn bind_texture(&mut self, target: TextureTarget, texture: Option<GpuTexture>) {
        if let Some(t) = texture {
            self.check("texture", t.0);
        }
        self.record(DeviceCommand::BindTexture { target, texture });
    }

    fn tex_image(
        &mut self,
        target: ImageTarget,
        level: u32,
        desc: &TexImageDesc,
        data: Option<&[u8]>,
    ) {
        self.record(DeviceCommand::TexImage {
            target,
            level,
            desc: *desc,
            bytes: data.map_or(0, <[u8]>::len),
        });
    }

    fn tex_sub_image(
        &mut self,
        target: ImageTarget,
        level: u32,
        region: TexRegion,
        _format: PixelFormat,
        _data_type: PixelType,
        data: &[u8],
    ) {
        self.record(DeviceCommand::TexSubImage {
            target,
            level,
            region,
            bytes: data.len(),
        });
    }

    fn tex_parameters(&mut self, target: TextureTarget, params: &SamplerParams) {
        self.record(DeviceCommand::TexParameters {
            target,
            params: *params,
        });
    }

    fn generate_mipmap(&mut self, target: TextureTarget) {
        self.record(DeviceCommand::GenerateMipmap(target));
    }

    fn create_buffer(&mut self) -> GpuBuffer {
        let buffer = GpuBuffer(self.alloc());
        self.record(DeviceCommand::CreateBuffer(buffer));
        buffer
    }

    fn delete_buffer(&mut self, buffer: GpuBuffer) {
        self.check("buffer", buffer.0);
        self.live.remove(&buffer.0);
        self.record(DeviceCommand::DeleteBuffer(buffer));
    }

    fn bind_buffer(&mut self, target: BufferTarget, buffer: Option<GpuBuffer>) {
        if let Some(b) = buffer {
            self.check("buffer", b.0);
        }
        self.record(DeviceCommand::BindBuffer { target, buffer });
    }

    fn buffer_data(&mut self, target: BufferTarget, data: &[u8], usage: BufferUsage) {
        self.record(DeviceCommand::BufferData {
            target,
            bytes: data.len(),
            usage,
        });
    }

    fn buffer_sub_data(&mut self, target: BufferTarget, offset: usize, data: &[u8]) {
        self.record(DeviceCommand::BufferSubData {
            target,
            offset,
            bytes: data.len(),
        });
    }

    fn enable_vertex_attrib(&mut self, location: u32) {
        self.record(DeviceCommand::EnableVertexAttrib(location));
    }

    fn disable_vertex_attrib(&mut self, location: u32) {
        self.record(DeviceCommand::DisableVertexAttrib(location));
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
        self.record(DeviceCommand::VertexAttribPointer {
            location,
            size,
            component,
            normalized,
            stride,
            offset,
        });
    }

    fn vertex_attrib_divisor(&mut self, location: u32, divisor: u32) {
        self.record(DeviceCommand::VertexAttribDivisor { location, divisor });
    }

    fn create_framebuffer(&mut self) -> GpuFramebuffer {
        let framebuffer = GpuFramebuffer(self.alloc());
        self.record(DeviceCommand::CreateFramebuffer(framebuffer));
        framebuffer
    }

    fn delete_framebuffer(&mut self, framebuffer: GpuFramebuffer) {
        self.check("framebuffer", framebuffer.0);
        self.live.remove(&framebuffer.0);
        self.framebuffer_colors.remove(&Some(framebuffer));
        self.record(DeviceCommand::DeleteFramebuffer(framebuffer));
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<GpuFramebuffer>) {
        if let Some(f) = framebuffer {
            self.check("framebuffer", f.0);
        }
        self.bound_framebuffer = framebuffer;
        self.record(DeviceCommand::BindFramebuffer(framebuffer));
    }

    fn framebuffer_texture(
        &mut self,
        attachment: Attachment,
        target: ImageTarget,
        texture: Option<GpuTexture>,
        level: u32,
        layer: u32,
    ) {
        if let Some(t) = texture {
            self.check("texture", t.0);
        }
        self.record(DeviceCommand::FramebufferTexture {
            attachment,
            target,
            texture,
            level,
            layer,
        });
    }

    fn create_renderbuffer(&mut self) -> GpuRenderbuffer {
        let renderbuffer = GpuRenderbuffer(self.alloc());
        self.record(DeviceCommand::CreateRenderbuffer(renderbuffer));
        renderbuffer
    }

    fn delete_renderbuffer(&mut self, renderbuffer: GpuRenderbuffer) {
        self.check("renderbuffer", renderbuffer.0);
        self.live.remove(&renderbuffer.0);
        self.record(DeviceCommand::DeleteRenderbuffer(renderbuffer));
    }

    fn renderbuffer_storage(
        &mut self,
        renderbuffer: GpuRenderbuffer,
        format: InternalFormat,
        width: u32,
        height: u32,
        samples: u32,
    ) {
        self.check("renderbuffer", renderbuffer.0);
        self.record(DeviceCommand::RenderbufferStorage {
            renderbuffer,
            format,
            width,
            height,
            samples,
        });
    }

    fn framebuffer_renderbuffer(&mut self, attachment: Attachment, renderbuffer: GpuRenderbuffer) {
        self.check("renderbuffer", renderbuffer.0);
        self.record(DeviceCommand::FramebufferRenderbuffer {
            attachment,
            renderbuffer,
        });
    }

    fn blit_framebuffer(
        &mut self,
        source: Option<GpuFramebuffer>,
        destination: Option<GpuFramebuffer>,
        _width: u32,
        _height: u32,
        _mask: ClearMask,
    ) {
        if let Some(color) = self.framebuffer_colors.get(&source).copied() {
            self.framebuffer_colors.insert(destination, color);
        }
        self.record(DeviceCommand::BlitFramebuffer {
            source,
            destination,
        });
    }

    fn read_pixels(&mut self, rect: Rect, format: PixelFormat, data_type: PixelType, out: &mut [u8]) {
        let color = self
            .framebuffer_colors
            .get(&self.bound_framebuffer)
            .copied()
            .unwrap_or([0.0; 4]);
        let components = format.components();
        let texel = data_type.bytes();
        for (i, chunk) in out.chunks_mut(texel).enumerate() {
            let value = color[(i % components).min(3)];
            match data_type {
                PixelType::UnsignedByte => chunk[0] = (value.clamp(0.0, 1.0) * 255.0).round() as u8,
                PixelType::Float if chunk.len() == 4 => chunk.copy_from_slice(&value.to_le_bytes()),
                _ => chunk.fill(0),
            }
        }
        self.record(DeviceCommand::ReadPixels {
            rect,
            format,
            data_type,
        });
    }

    fn draw_arrays(&mut self, mode: DrawMode, _first: u32, count: u32, instances: u32) {
        if self.current_program.is_none() {
            self.errors.push(DeviceError::DrawWithoutProgram);
        }
        self.record(DeviceCommand::Draw {
            mode,
            count,
            instances,
            indexed: false,
            program: self.current_program,
            framebuffer: self.bound_framebuffer,
        });
    }

    fn draw_elements(
        &mut self,
        mode: DrawMode,
        count: u32,
        _index_type: IndexType,
        _offset: usize,
        instances: u32,
    ) {
        if self.current_program.is_none() {
            self.errors.push(DeviceError::DrawWithoutProgram);
        }
        self.record(DeviceCommand::Draw {
            mode,
            count,
            instances,
            indexed: true,
            program: self.current_program,
            framebuffer: self.bound_framebuffer,
        });
    }

    fn fence_sync(&mut self) -> GpuFence {
        let fence = GpuFence(self.alloc());
        self.fences.insert(fence.0, self.fence_latency);
        self.record(DeviceCommand::FenceSync(fence));
        fence
    }

    fn fence_signaled(&mut self, fence: GpuFence) -> bool {
        match self.fences.get_mut(&fence.0) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                false
            }
            _ => true,
        }
    }

    fn delete_fence(&mut self, fence: GpuFence) {
        self.fences.remove(&fence.0);
        self.live.remove(&fence.0);
        self.record(DeviceCommand::DeleteFence(fence));
    }

    fn lose_context(&mut self) -> bool {
        self.commands.push(DeviceCommand::ContextLost);
        self.context_lost = true;
        self.live.clear();
        self.programs.clear();
        self.pending_programs.clear();
        self.fences.clear();
        self.framebuffer_colors.clear();
        self.current_program = None;
        self.bound_framebuffer = None;
        true
    }

    fn restore_context(&mut self) -> bool {
        self.context_lost = false;
        self.commands.push(DeviceCommand::ContextRestored);
        true
    }
}

/// Reflection of active uniforms and attributes from GLSL text.
///
/// Conditional blocks are resolved with a small preprocessor so that only
/// declarations a real driver would keep are reported.
mod reflect {
    use hashbrown::HashMap;

    use super::{ActiveAttribute, ActiveUniform, UniformLocation, UniformType};

    pub fn uniforms(vertex: &str, fragment: &str) -> Vec<ActiveUniform> {
        let mut out: Vec<ActiveUniform> = Vec::new();
        let mut next_location = 0u32;
        for stage in [vertex, fragment] {
            let text = strip_comments(&preprocess(stage));
            let structs = parse_structs(&text);
            for (kind, name, array) in declarations(&text, "uniform") {
                let mut push = |name: String, kind: UniformType, size: u32| {
                    if out.iter().all(|u| u.name != name) {
                        out.push(ActiveUniform {
                            name,
                            location: UniformLocation(next_location),
                            kind,
                            size,
                        });
                        next_location += 1;
                    }
                };
                if let Some(fields) = structs.get(kind.as_str()) {
                    let count = array.unwrap_or(1);
                    for index in 0..count {
                        let base = match array {
                            Some(_) => format!("{}[{}]", name, index),
                            None => name.clone(),
                        };
                        for (field_kind, field_name, field_array) in fields {
                            let full = match field_array {
                                Some(_) => format!("{}.{}[0]", base, field_name),
                                None => format!("{}.{}", base, field_name),
                            };
                            push(full, *field_kind, field_array.unwrap_or(1));
                        }
                    }
                } else if let Some(kind) = UniformType::from_glsl(&kind) {
                    match array {
                        Some(size) => push(format!("{}[0]", name), kind, size),
                        None => push(name, kind, 1),
                    }
                }
            }
        }
        out
    }

    pub fn attributes(vertex: &str) -> Vec<ActiveAttribute> {
        let text = strip_comments(&preprocess(vertex));
        let mut location = 0u32;
        let mut out = Vec::new();
        for (kind, name, _) in declarations(&text, "in") {
            if let Some(kind) = UniformType::from_glsl(&kind) {
                out.push(ActiveAttribute {
                    name,
                    location,
                    kind,
                });
                location += kind.attribute_slots();
            }
        }
        out
    }

    fn strip_comments(source: &str) -> String {
        let mut out = String::with_capacity(source.len());
        let mut rest = source;
        while !rest.is_empty() {
            if let Some(after) = rest.strip_prefix("//") {
                rest = after.find('\n').map_or("", |i| &after[i..]);
            } else if let Some(after) = rest.strip_prefix("/*") {
                rest = after.find("*/").map_or("", |i| &after[i + 2..]);
            } else {
                let ch = rest.chars().next().unwrap_or(' ');
                out.push(ch);
                rest = &rest[ch.len_utf8()..];
            }
        }
        out
    }

    /// `(type, name, array_len)` for each top-level `qualifier type name[N];`
    fn declarations(text: &str, qualifier: &str) -> Vec<(String, String, Option<u32>)> {
        let mut out = Vec::new();
        for line in text.lines() {
            let line = line.trim();
            let Some(rest) = line.strip_prefix(qualifier) else {
                continue;
            };
            if !rest.starts_with(char::is_whitespace) || !rest.trim_end().ends_with(';') {
                continue;
            }
            let body = rest.trim().trim_end_matches(';');
            let mut tokens = body
                .split_whitespace()
                .filter(|t| !matches!(*t, "highp" | "mediump" | "lowp" | "flat"));
            let (Some(kind), Some(name)) = (tokens.next(), tokens.next()) else {
                continue;
            };
            let (name, array) = split_array(name);
            out.push((kind.to_string(), name, array));
        }
        out
    }

    fn split_array(token: &str) -> (String, Option<u32>) {
        match token.find('[') {
            Some(open) => {
                let size = token[open + 1..]
                    .trim_end_matches(']')
                    .trim()
                    .parse()
                    .unwrap_or(1);
                (token[..open].to_string(), Some(size))
            }
            None => (token.to_string(), None),
        }
    }

    type StructFields = Vec<(UniformType, String, Option<u32>)>;

    fn parse_structs(text: &str) -> HashMap<String, StructFields> {
        let mut out = HashMap::new();
        let mut rest = text;
        while let Some(start) = rest.find("struct ") {
            let after = &rest[start + 7..];
            let (Some(open), Some(close)) = (after.find('{'), after.find('}')) else {
                break;
            };
            if close < open {
                rest = &after[close + 1..];
                continue;
            }
            let name = after[..open].trim().to_string();
            let mut fields = Vec::new();
            for decl in after[open + 1..close].split(';') {
                let mut tokens = decl
                    .split_whitespace()
                    .filter(|t| !matches!(*t, "highp" | "mediump" | "lowp"));
                if let (Some(kind), Some(field)) = (tokens.next(), tokens.next())
                    && let Some(kind) = UniformType::from_glsl(kind)
                {
                    let (field, array) = split_array(field);
                    fields.push((kind, field, array));
                }
            }
            out.insert(name, fields);
            rest = &after[close + 1..];
        }
        out
    }

    /// Resolve `#define` / `#if*` / `#else` / `#endif`, dropping inactive lines.
    fn is_active(stack: &[(bool, bool, bool)]) -> bool {
        stack.last().is_none_or(|s| s.2)
    }

    pub fn preprocess(source: &str) -> String {
        let mut defines: HashMap<String, String> = HashMap::new();
        // (parent active, branch taken, currently active)
        let mut stack: Vec<(bool, bool, bool)> = Vec::new();
        let mut out = String::with_capacity(source.len());

        for line in source.lines() {
            let trimmed = line.trim_start();
            if let Some(directive) = trimmed.strip_prefix('#') {
                let directive = directive.trim_start();
                let (word, rest) = directive
                    .split_once(char::is_whitespace)
                    .unwrap_or((directive, ""));
                let rest = rest.trim();
                let parent = is_active(&stack);
                match word {
                    "define" if parent => {
                        let (name, value) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
                        defines.insert(name.to_string(), value.trim().to_string());
                    }
                    "undef" if parent => {
                        defines.remove(rest);
                    }
                    "ifdef" => {
                        let value = parent && defines.contains_key(rest);
                        stack.push((parent, value, value));
                    }
                    "ifndef" => {
                        let value = parent && !defines.contains_key(rest);
                        stack.push((parent, value, value));
                    }
                    "if" => {
                        let value = parent && eval(rest, &defines) != 0;
                        stack.push((parent, value, value));
                    }
                    "elif" => {
                        if let Some(top) = stack.last_mut() {
                            let value = top.0 && !top.1 && eval(rest, &defines) != 0;
                            top.1 |= value;
                            top.2 = value;
                        }
                    }
                    "else" => {
                        if let Some(top) = stack.last_mut() {
                            top.2 = top.0 && !top.1;
                            top.1 = true;
                        }
                    }
                    "endif" => {
                        stack.pop();
                    }
                    _ => {}
                }
                continue;
            }
            if is_active(&stack) {
                out.push_str(line);
                out.push('\n');
            }
        }
        out
    }

    #[derive(Debug, Clone, PartialEq)]
    enum Token {
        Num(i64),
        Ident(String),
        Op(&'static str),
    }

    fn tokenize(expr: &str) -> Vec<Token> {
        const OPS: [&str; 12] = ["&&", "||", ">=", "<=", "==", "!=", ">", "<", "!", "(", ")", "-"];
        let mut tokens = Vec::new();
        let bytes = expr.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            let c = bytes[i] as char;
            if c.is_whitespace() {
                i += 1;
            } else if c.is_ascii_digit() {
                let start = i;
                while i < bytes.len() && (bytes[i] as char).is_ascii_alphanumeric() {
                    i += 1;
                }
                let digits: String = expr[start..i].chars().filter(char::is_ascii_digit).collect();
                tokens.push(Token::Num(digits.parse().unwrap_or(0)));
            } else if c.is_ascii_alphabetic() || c == '_' {
                let start = i;
                while i < bytes.len() && ((bytes[i] as char).is_ascii_alphanumeric() || bytes[i] == b'_') {
                    i += 1;
                }
                tokens.push(Token::Ident(expr[start..i].to_string()));
            } else if let Some(op) = OPS.iter().find(|op| expr[i..].starts_with(**op)) {
                tokens.push(Token::Op(op));
                i += op.len();
            } else {
                i += 1;
            }
        }
        tokens
    }

    fn eval(expr: &str, defines: &HashMap<String, String>) -> i64 {
        let tokens = tokenize(expr);
        let mut parser = ExprParser {
            tokens: &tokens,
            pos: 0,
            defines,
        };
        parser.or()
    }

    struct ExprParser<'a> {
        tokens: &'a [Token],
        pos: usize,
        defines: &'a HashMap<String, String>,
    }

    impl ExprParser<'_> {
        fn peek_op(&self, op: &str) -> bool {
            matches!(self.tokens.get(self.pos), Some(Token::Op(o)) if *o == op)
        }

        fn or(&mut self) -> i64 {
            let mut value = self.and();
            while self.peek_op("||") {
                self.pos += 1;
                let rhs = self.and();
                value = ((value != 0) || (rhs != 0)) as i64;
            }
            value
        }

        fn and(&mut self) -> i64 {
            let mut value = self.comparison();
            while self.peek_op("&&") {
                self.pos += 1;
                let rhs = self.comparison();
                value = ((value != 0) && (rhs != 0)) as i64;
            }
            value
        }

        fn comparison(&mut self) -> i64 {
            let lhs = self.unary();
            for op in [">=", "<=", "==", "!=", ">", "<"] {
                if self.peek_op(op) {
                    self.pos += 1;
                    let rhs = self.unary();
                    return match op {
                        ">=" => lhs >= rhs,
                        "<=" => lhs <= rhs,
                        "==" => lhs == rhs,
                        "!=" => lhs != rhs,
                        ">" => lhs > rhs,
                        _ => lhs < rhs,
                    } as i64;
                }
            }
            lhs
        }

        fn unary(&mut self) -> i64 {
            if self.peek_op("!") {
                self.pos += 1;
                return (self.unary() == 0) as i64;
            }
            if self.peek_op("-") {
                self.pos += 1;
                return -self.unary();
            }
            self.primary()
        }

        fn primary(&mut self) -> i64 {
            let Some(token) = self.tokens.get(self.pos).cloned() else {
                return 0;
            };
            self.pos += 1;
            match token {
                Token::Num(n) => n,
                Token::Op("(") => {
                    let value = self.or();
                    if self.peek_op(")") {
                        self.pos += 1;
                    }
                    value
                }
                Token::Ident(name) if name == "defined" => {
                    let parens = self.peek_op("(");
                    if parens {
                        self.pos += 1;
                    }
                    let defined = match self.tokens.get(self.pos) {
                        Some(Token::Ident(macro_name)) => self.defines.contains_key(macro_name),
                        _ => false,
                    };
                    self.pos += 1;
                    if parens && self.peek_op(")") {
                        self.pos += 1;
                    }
                    defined as i64
                }
                Token::Ident(name) => self
                    .defines
                    .get(&name)
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(0),
                Token::Op(_) => 0,
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_preprocess_resolves_conditionals() {
            let src = "#define USE_MAP\n#ifdef USE_MAP\nuniform sampler2D map;\n#else\nuniform float nomap;\n#endif\n#if 2 > 0 && defined( USE_MAP )\nuniform vec3 lit;\n#endif\n";
            let out = preprocess(src);
            assert!(out.contains("sampler2D map"));
            assert!(!out.contains("nomap"));
            assert!(out.contains("vec3 lit"));
        }

        #[test]
        fn test_struct_arrays_expand_per_field() {
            let src = "struct DirectionalLight { vec3 direction; vec3 color; };\nuniform DirectionalLight directionalLights[2];\nuniform mat4 boneMatrices[4];\n";
            let uniforms = uniforms(src, "");
            let names: Vec<_> = uniforms.iter().map(|u| u.name.as_str()).collect();
            assert_eq!(
                names,
                vec![
                    "directionalLights[0].direction",
                    "directionalLights[0].color",
                    "directionalLights[1].direction",
                    "directionalLights[1].color",
                    "boneMatrices[0]",
                ]
            );
            assert_eq!(uniforms[4].size, 4);
        }

        #[test]
        fn test_attributes_take_matrix_slots() {
            let src = "in vec3 position;\nin mat4 instanceMatrix;\nin vec2 uv;\nvoid main() {}\n";
            let attributes = attributes(src);
            assert_eq!(attributes[0].location, 0);
            assert_eq!(attributes[1].location, 1);
            assert_eq!(attributes[2].location, 5);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stale_handles_are_reported_after_context_loss() {
        let mut device = RecordingDevice::new();
        let texture = device.create_texture();
        device.bind_texture(TextureTarget::Texture2D, Some(texture));
        assert!(device.errors().is_empty());

        device.lose_context();
        device.restore_context();
        device.bind_texture(TextureTarget::Texture2D, Some(texture));
        assert_eq!(
            device.errors(),
            &[DeviceError::UnknownHandle {
                kind: "texture",
                id: texture.0
            }]
        );
    }

    #[test]
    fn test_compile_failure_marker_reports_line() {
        let mut device = RecordingDevice::new();
        device.set_compile_failure_marker("BROKEN");
        let source = ShaderSource {
            name: "test".into(),
            vertex: "void main() {}\n".into(),
            fragment: "void main() {\nBROKEN\n}\n".into(),
        };
        let err = device.create_program(&source).unwrap_err();
        assert!(err.fragment_log.contains("0:2:"));
        assert!(err.vertex_log.is_empty());
    }

    #[test]
    fn test_readback_returns_clear_color() {
        let mut device = RecordingDevice::new();
        device.clear_color([1.0, 0.0, 0.0, 1.0]);
        device.clear(ClearMask::COLOR);
        let mut out = vec![0u8; 8];
        device.read_pixels(Rect::new(0, 0, 2, 1), PixelFormat::Rgba, PixelType::UnsignedByte, &mut out);
        assert_eq!(out, vec![255, 0, 0, 255, 255, 0, 0, 255]);
    }

    #[test]
    fn test_fence_signals_after_latency() {
        let mut device = RecordingDevice::new();
        device.set_fence_latency(2);
        let fence = device.fence_sync();
        assert!(!device.fence_signaled(fence));
        assert!(!device.fence_signaled(fence));
        assert!(device.fence_signaled(fence));
    }
}
