//! Device context abstraction
//!
//! [`GpuDevice`] is the single injected handle through which every GPU command
//! is issued. It deliberately mirrors a stateful GL-style API: most calls act
//! on whatever object is currently bound, which is why the renderer routes all
//! fixed-function and binding calls through [`crate::state::GpuState`].
//!
//! Backends:
//! - [`RecordingDevice`]: headless, records every call (tests, tooling)
//! - `GlowDevice`: OpenGL ES 3 / WebGL2 through `glow` (feature `gl`)

#[cfg(feature = "gl")]
mod glow_device;
mod recording;
mod types;

#[cfg(feature = "gl")]
pub use glow_device::GlowDevice;
pub use recording::{DeviceCommand, DeviceError, RecordedUniform, RecordingDevice};
pub use types::*;

/// A live device context.
///
/// Implementations are not required to be thread-safe; the renderer drives a
/// device from exactly one thread.
pub trait GpuDevice {
    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    fn parameters(&self) -> DeviceParameters;

    /// Names of supported optional extensions (GL spelling, e.g.
    /// `EXT_texture_filter_anisotropic`).
    fn extensions(&self) -> Vec<String>;

    fn shader_precision_supported(&self, stage: ShaderStage, precision: Precision) -> bool;

    fn is_context_lost(&self) -> bool;

    /// Format/type pair readable from the bound framebuffer besides RGBA8.
    fn implementation_read_format(&self) -> (PixelFormat, PixelType);

    // ------------------------------------------------------------------
    // Fixed-function state
    // ------------------------------------------------------------------

    fn enable(&mut self, capability: Capability);
    fn disable(&mut self, capability: Capability);
    fn blend_equation_separate(&mut self, rgb: BlendEquation, alpha: BlendEquation);
    fn blend_func_separate(
        &mut self,
        src_rgb: BlendFactor,
        dst_rgb: BlendFactor,
        src_alpha: BlendFactor,
        dst_alpha: BlendFactor,
    );
    fn blend_color(&mut self, color: [f32; 4]);
    fn depth_func(&mut self, func: CompareFunction);
    fn depth_mask(&mut self, write: bool);
    fn clear_depth(&mut self, depth: f32);
    fn stencil_mask(&mut self, mask: u32);
    fn stencil_func(&mut self, func: CompareFunction, reference: i32, mask: u32);
    fn stencil_op(&mut self, fail: StencilOp, depth_fail: StencilOp, pass: StencilOp);
    fn clear_stencil(&mut self, value: i32);
    fn color_mask(&mut self, mask: [bool; 4]);
    fn clear_color(&mut self, color: [f32; 4]);
    fn cull_face(&mut self, face: CullFace);
    fn front_face(&mut self, winding: FrontFace);
    fn line_width(&mut self, width: f32);
    fn polygon_offset(&mut self, factor: f32, units: f32);
    fn viewport(&mut self, rect: Rect);
    fn scissor(&mut self, rect: Rect);
    fn clear(&mut self, mask: ClearMask);

    // ------------------------------------------------------------------
    // Programs
    // ------------------------------------------------------------------

    /// Compile both stages and link them.
    fn create_program(&mut self, source: &ShaderSource) -> Result<GpuProgram, ProgramDiagnostics>;

    /// Non-blocking completion check for drivers that compile in parallel.
    fn program_ready(&mut self, _program: GpuProgram) -> bool {
        true
    }

    fn delete_program(&mut self, program: GpuProgram);
    fn active_uniforms(&self, program: GpuProgram) -> Vec<ActiveUniform>;
    fn active_attributes(&self, program: GpuProgram) -> Vec<ActiveAttribute>;
    fn use_program(&mut self, program: Option<GpuProgram>);
    fn set_uniform(&mut self, location: UniformLocation, value: UniformUpload<'_>);

    // ------------------------------------------------------------------
    // Textures
    // ------------------------------------------------------------------

    fn create_texture(&mut self) -> GpuTexture;
    fn delete_texture(&mut self, texture: GpuTexture);
    fn active_texture(&mut self, unit: u32);
    fn bind_texture(&mut self, target: TextureTarget, texture: Option<GpuTexture>);
    fn tex_image(
        &mut self,
        target: ImageTarget,
        level: u32,
        desc: &TexImageDesc,
        data: Option<&[u8]>,
    );
    fn tex_sub_image(
        &mut self,
        target: ImageTarget,
        level: u32,
        region: TexRegion,
        format: PixelFormat,
        data_type: PixelType,
        data: &[u8],
    );
    fn tex_parameters(&mut self, target: TextureTarget, params: &SamplerParams);
    fn generate_mipmap(&mut self, target: TextureTarget);

    // ------------------------------------------------------------------
    // Buffers and vertex input
    // ------------------------------------------------------------------

    fn create_buffer(&mut self) -> GpuBuffer;
    fn delete_buffer(&mut self, buffer: GpuBuffer);
    fn bind_buffer(&mut self, target: BufferTarget, buffer: Option<GpuBuffer>);
    fn buffer_data(&mut self, target: BufferTarget, data: &[u8], usage: BufferUsage);
    fn buffer_sub_data(&mut self, target: BufferTarget, offset: usize, data: &[u8]);
    fn enable_vertex_attrib(&mut self, location: u32);
    fn disable_vertex_attrib(&mut self, location: u32);
    #[allow(clippy::too_many_arguments)]
    fn vertex_attrib_pointer(
        &mut self,
        location: u32,
        size: u32,
        component: ComponentType,
        normalized: bool,
        stride: usize,
        offset: usize,
    );
    fn vertex_attrib_divisor(&mut self, location: u32, divisor: u32);

    // ------------------------------------------------------------------
    // Framebuffers
    // ------------------------------------------------------------------

    fn create_framebuffer(&mut self) -> GpuFramebuffer;
    fn delete_framebuffer(&mut self, framebuffer: GpuFramebuffer);
    fn bind_framebuffer(&mut self, framebuffer: Option<GpuFramebuffer>);
    fn framebuffer_texture(
        &mut self,
        attachment: Attachment,
        target: ImageTarget,
        texture: Option<GpuTexture>,
        level: u32,
        layer: u32,
    );
    fn create_renderbuffer(&mut self) -> GpuRenderbuffer;
    fn delete_renderbuffer(&mut self, renderbuffer: GpuRenderbuffer);
    fn renderbuffer_storage(
        &mut self,
        renderbuffer: GpuRenderbuffer,
        format: InternalFormat,
        width: u32,
        height: u32,
        samples: u32,
    );
    fn framebuffer_renderbuffer(&mut self, attachment: Attachment, renderbuffer: GpuRenderbuffer);
    /// Copy (resolve) the colour buffer of `source` into `destination`.
    fn blit_framebuffer(
        &mut self,
        source: Option<GpuFramebuffer>,
        destination: Option<GpuFramebuffer>,
        width: u32,
        height: u32,
        mask: ClearMask,
    );
    fn read_pixels(&mut self, rect: Rect, format: PixelFormat, data_type: PixelType, out: &mut [u8]);

    // ------------------------------------------------------------------
    // Draws
    // ------------------------------------------------------------------

    fn draw_arrays(&mut self, mode: DrawMode, first: u32, count: u32, instances: u32);
    fn draw_elements(
        &mut self,
        mode: DrawMode,
        count: u32,
        index_type: IndexType,
        offset: usize,
        instances: u32,
    );

    // ------------------------------------------------------------------
    // Synchronisation
    // ------------------------------------------------------------------

    fn fence_sync(&mut self) -> GpuFence;
    fn fence_signaled(&mut self, fence: GpuFence) -> bool;
    fn delete_fence(&mut self, fence: GpuFence);

    // ------------------------------------------------------------------
    // Context loss (optional driver extension)
    // ------------------------------------------------------------------

    /// Ask the driver to simulate a context loss. Returns false if unsupported.
    fn lose_context(&mut self) -> bool {
        false
    }

    /// Ask the driver to restore a simulated context loss.
    fn restore_context(&mut self) -> bool {
        false
    }
}
