//! Handle types and enumerations shared by every device backend.
//!
//! These mirror the vocabulary of a GL-style command API closely enough that a
//! backend can translate each value one-to-one into a driver constant.

use serde::{Deserialize, Serialize};

macro_rules! gpu_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);
    };
}

gpu_handle!(
    /// Linked shader program
    GpuProgram
);
gpu_handle!(
    /// Texture object
    GpuTexture
);
gpu_handle!(
    /// Vertex, index or pixel-pack buffer
    GpuBuffer
);
gpu_handle!(
    /// Framebuffer object (`None` at call sites means the default surface)
    GpuFramebuffer
);
gpu_handle!(
    /// Renderbuffer used for depth/stencil or multisampled colour storage
    GpuRenderbuffer
);
gpu_handle!(
    /// Sync object for asynchronous readback
    GpuFence
);
gpu_handle!(
    /// Location of a uniform inside one linked program
    UniformLocation
);

/// Fixed-function capabilities toggled with enable/disable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Blend,
    DepthTest,
    StencilTest,
    CullFace,
    ScissorTest,
    PolygonOffsetFill,
    SampleAlphaToCoverage,
    Dither,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendEquation {
    #[default]
    Add,
    Subtract,
    ReverseSubtract,
    Min,
    Max,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    OneMinusSrcColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstAlpha,
    OneMinusDstAlpha,
    DstColor,
    OneMinusDstColor,
    SrcAlphaSaturate,
    ConstantColor,
    OneMinusConstantColor,
    ConstantAlpha,
    OneMinusConstantAlpha,
}

/// Depth and stencil comparison function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CompareFunction {
    Never,
    Less,
    Equal,
    #[default]
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

impl CompareFunction {
    /// Mirror a depth comparison for a reversed (1 = near) depth buffer.
    pub fn reversed(self) -> Self {
        match self {
            CompareFunction::Less => CompareFunction::Greater,
            CompareFunction::LessEqual => CompareFunction::GreaterEqual,
            CompareFunction::Greater => CompareFunction::Less,
            CompareFunction::GreaterEqual => CompareFunction::LessEqual,
            other => other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StencilOp {
    #[default]
    Keep,
    Zero,
    Replace,
    Increment,
    IncrementWrap,
    Decrement,
    DecrementWrap,
    Invert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CullFace {
    Back,
    Front,
    FrontAndBack,
}

/// Winding order of front-facing triangles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FrontFace {
    #[default]
    Ccw,
    Cw,
}

/// Integer pixel rectangle used for viewports, scissors and readback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Scale every component, rounding to whole pixels.
    pub fn scaled(&self, factor: f32) -> Self {
        Self {
            x: (self.x as f32 * factor).floor() as i32,
            y: (self.y as f32 * factor).floor() as i32,
            width: (self.width as f32 * factor).floor() as u32,
            height: (self.height as f32 * factor).floor() as u32,
        }
    }

    /// True if `other` lies completely inside this rectangle.
    pub fn contains(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.x as i64 + other.width as i64 <= self.x as i64 + self.width as i64
            && other.y as i64 + other.height as i64 <= self.y as i64 + self.height as i64
    }
}

bitflags::bitflags! {
    /// Buffers affected by a clear
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ClearMask: u8 {
        const COLOR = 1 << 0;
        const DEPTH = 1 << 1;
        const STENCIL = 1 << 2;
    }
}

/// Bind point for texture objects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureTarget {
    Texture2D,
    CubeMap,
    Texture2DArray,
    Texture3D,
}

/// Image slot written by `tex_image` / `tex_sub_image` / framebuffer attachments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageTarget {
    Texture2D,
    /// Cube face 0..6 in +X, -X, +Y, -Y, +Z, -Z order
    CubeFace(u8),
    Texture2DArray,
    Texture3D,
}

impl ImageTarget {
    /// Bind point owning this image slot.
    pub fn bind_target(self) -> TextureTarget {
        match self {
            ImageTarget::Texture2D => TextureTarget::Texture2D,
            ImageTarget::CubeFace(_) => TextureTarget::CubeMap,
            ImageTarget::Texture2DArray => TextureTarget::Texture2DArray,
            ImageTarget::Texture3D => TextureTarget::Texture3D,
        }
    }
}

/// Client-side pixel layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PixelFormat {
    Alpha,
    Red,
    Rg,
    Rgb,
    #[default]
    Rgba,
    RedInteger,
    RgInteger,
    RgbaInteger,
    Depth,
    DepthStencil,
}

impl PixelFormat {
    pub fn components(self) -> usize {
        match self {
            PixelFormat::Alpha
            | PixelFormat::Red
            | PixelFormat::RedInteger
            | PixelFormat::Depth
            | PixelFormat::DepthStencil => 1,
            PixelFormat::Rg | PixelFormat::RgInteger => 2,
            PixelFormat::Rgb => 3,
            PixelFormat::Rgba | PixelFormat::RgbaInteger => 4,
        }
    }
}

/// Client-side component type for pixels and vertex attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PixelType {
    #[default]
    UnsignedByte,
    Byte,
    UnsignedShort,
    Short,
    UnsignedInt,
    Int,
    HalfFloat,
    Float,
    UnsignedInt248,
}

impl PixelType {
    pub fn bytes(self) -> usize {
        match self {
            PixelType::UnsignedByte | PixelType::Byte => 1,
            PixelType::UnsignedShort | PixelType::Short | PixelType::HalfFloat => 2,
            PixelType::UnsignedInt | PixelType::Int | PixelType::Float => 4,
            PixelType::UnsignedInt248 => 4,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, PixelType::HalfFloat | PixelType::Float)
    }
}

/// Sized GPU storage format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum InternalFormat {
    R8,
    Rg8,
    Rgb8,
    #[default]
    Rgba8,
    Srgb8Alpha8,
    R16F,
    Rg16F,
    Rgba16F,
    R32F,
    Rg32F,
    Rgba32F,
    Depth16,
    Depth24,
    Depth32F,
    Depth24Stencil8,
    CompressedRgbaS3tcDxt5,
    CompressedRgbaAstc4x4,
    CompressedRgbaBptc,
    CompressedRgbEtc2,
}

impl InternalFormat {
    pub fn is_depth(self) -> bool {
        matches!(
            self,
            InternalFormat::Depth16
                | InternalFormat::Depth24
                | InternalFormat::Depth32F
                | InternalFormat::Depth24Stencil8
        )
    }

    pub fn is_compressed(self) -> bool {
        matches!(
            self,
            InternalFormat::CompressedRgbaS3tcDxt5
                | InternalFormat::CompressedRgbaAstc4x4
                | InternalFormat::CompressedRgbaBptc
                | InternalFormat::CompressedRgbEtc2
        )
    }

    /// Approximate bytes per texel, used for memory accounting.
    pub fn bytes_per_texel(self) -> f32 {
        match self {
            InternalFormat::R8 => 1.0,
            InternalFormat::Rg8 | InternalFormat::R16F | InternalFormat::Depth16 => 2.0,
            InternalFormat::Rgb8 | InternalFormat::Depth24 => 3.0,
            InternalFormat::Rgba8
            | InternalFormat::Srgb8Alpha8
            | InternalFormat::Rg16F
            | InternalFormat::R32F
            | InternalFormat::Depth32F
            | InternalFormat::Depth24Stencil8 => 4.0,
            InternalFormat::Rgba16F | InternalFormat::Rg32F => 8.0,
            InternalFormat::Rgba32F => 16.0,
            InternalFormat::CompressedRgbEtc2 => 0.5,
            InternalFormat::CompressedRgbaS3tcDxt5
            | InternalFormat::CompressedRgbaAstc4x4
            | InternalFormat::CompressedRgbaBptc => 1.0,
        }
    }
}

/// Dimensions and formats of one `tex_image` upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TexImageDesc {
    pub width: u32,
    pub height: u32,
    /// Layers for arrays, slices for 3D textures, 1 otherwise
    pub depth: u32,
    pub internal_format: InternalFormat,
    pub format: PixelFormat,
    pub data_type: PixelType,
}

/// Sub-region of a texture image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TexRegion {
    pub x: u32,
    pub y: u32,
    pub z: u32,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Wrapping {
    Repeat,
    #[default]
    ClampToEdge,
    MirroredRepeat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Filter {
    Nearest,
    #[default]
    Linear,
    NearestMipmapNearest,
    NearestMipmapLinear,
    LinearMipmapNearest,
    LinearMipmapLinear,
}

impl Filter {
    pub fn uses_mipmaps(self) -> bool {
        !matches!(self, Filter::Nearest | Filter::Linear)
    }
}

/// Sampling state applied to the texture bound at the current unit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerParams {
    pub wrap_s: Wrapping,
    pub wrap_t: Wrapping,
    pub wrap_r: Wrapping,
    pub min_filter: Filter,
    pub mag_filter: Filter,
    /// 1.0 disables anisotropic filtering
    pub anisotropy: f32,
    /// Depth comparison for shadow samplers
    pub compare: Option<CompareFunction>,
}

impl Default for SamplerParams {
    fn default() -> Self {
        Self {
            wrap_s: Wrapping::ClampToEdge,
            wrap_t: Wrapping::ClampToEdge,
            wrap_r: Wrapping::ClampToEdge,
            min_filter: Filter::Linear,
            mag_filter: Filter::Linear,
            anisotropy: 1.0,
            compare: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferTarget {
    Array,
    ElementArray,
    PixelPack,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BufferUsage {
    #[default]
    StaticDraw,
    DynamicDraw,
    StreamDraw,
    StreamRead,
}

/// Component type of a vertex attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentType {
    Float,
    UnsignedShort,
    UnsignedInt,
}

impl ComponentType {
    pub fn bytes(self) -> usize {
        match self {
            ComponentType::UnsignedShort => 2,
            ComponentType::Float | ComponentType::UnsignedInt => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexType {
    U16,
    U32,
}

impl IndexType {
    pub fn bytes(self) -> usize {
        match self {
            IndexType::U16 => 2,
            IndexType::U32 => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DrawMode {
    Points,
    Lines,
    LineStrip,
    LineLoop,
    Triangles,
    TriangleStrip,
}

/// Framebuffer attachment point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attachment {
    Color(u32),
    Depth,
    Stencil,
    DepthStencil,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

/// Shader float precision qualifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    #[default]
    High,
    Medium,
    Low,
}

impl Precision {
    pub fn qualifier(self) -> &'static str {
        match self {
            Precision::High => "highp",
            Precision::Medium => "mediump",
            Precision::Low => "lowp",
        }
    }

    /// Next lower precision, if any.
    pub fn lower(self) -> Option<Self> {
        match self {
            Precision::High => Some(Precision::Medium),
            Precision::Medium => Some(Precision::Low),
            Precision::Low => None,
        }
    }
}

/// GLSL type of an active uniform or attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformType {
    Float,
    Vec2,
    Vec3,
    Vec4,
    Int,
    IVec2,
    IVec3,
    IVec4,
    UInt,
    Bool,
    Mat2,
    Mat3,
    Mat4,
    Sampler2D,
    SamplerCube,
    Sampler2DArray,
    Sampler3D,
    Sampler2DShadow,
}

impl UniformType {
    pub fn is_sampler(self) -> bool {
        matches!(
            self,
            UniformType::Sampler2D
                | UniformType::SamplerCube
                | UniformType::Sampler2DArray
                | UniformType::Sampler3D
                | UniformType::Sampler2DShadow
        )
    }

    /// Texture bind point expected by a sampler type.
    pub fn sampler_target(self) -> Option<TextureTarget> {
        match self {
            UniformType::Sampler2D | UniformType::Sampler2DShadow => {
                Some(TextureTarget::Texture2D)
            }
            UniformType::SamplerCube => Some(TextureTarget::CubeMap),
            UniformType::Sampler2DArray => Some(TextureTarget::Texture2DArray),
            UniformType::Sampler3D => Some(TextureTarget::Texture3D),
            _ => None,
        }
    }

    /// Number of consecutive attribute locations occupied by this type.
    pub fn attribute_slots(self) -> u32 {
        match self {
            UniformType::Mat2 => 2,
            UniformType::Mat3 => 3,
            UniformType::Mat4 => 4,
            _ => 1,
        }
    }

    /// Parse a GLSL type keyword.
    pub fn from_glsl(keyword: &str) -> Option<Self> {
        Some(match keyword {
            "float" => UniformType::Float,
            "vec2" => UniformType::Vec2,
            "vec3" => UniformType::Vec3,
            "vec4" => UniformType::Vec4,
            "int" => UniformType::Int,
            "ivec2" => UniformType::IVec2,
            "ivec3" => UniformType::IVec3,
            "ivec4" => UniformType::IVec4,
            "uint" => UniformType::UInt,
            "bool" => UniformType::Bool,
            "mat2" => UniformType::Mat2,
            "mat3" => UniformType::Mat3,
            "mat4" => UniformType::Mat4,
            "sampler2D" => UniformType::Sampler2D,
            "samplerCube" => UniformType::SamplerCube,
            "sampler2DArray" => UniformType::Sampler2DArray,
            "sampler3D" => UniformType::Sampler3D,
            "sampler2DShadow" => UniformType::Sampler2DShadow,
            _ => return None,
        })
    }
}

/// Uniform reported by the driver after linking
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveUniform {
    /// Full name, e.g. `diffuse`, `boneMatrices[0]`, `pointLights[1].color`
    pub name: String,
    pub location: UniformLocation,
    pub kind: UniformType,
    /// Array length (1 for non-arrays)
    pub size: u32,
}

/// Vertex attribute reported by the driver after linking
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveAttribute {
    pub name: String,
    pub location: u32,
    pub kind: UniformType,
}

/// Borrowed uniform payload for one `set_uniform` call
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformUpload<'a> {
    Float(&'a [f32]),
    Vec2(&'a [f32]),
    Vec3(&'a [f32]),
    Vec4(&'a [f32]),
    Int(&'a [i32]),
    UInt(&'a [u32]),
    Mat3(&'a [f32]),
    Mat4(&'a [f32]),
}

/// Vertex + fragment text handed to the driver
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ShaderSource {
    /// Human-readable program name used in logs
    pub name: String,
    pub vertex: String,
    pub fragment: String,
}

/// Driver logs produced by a failed compile or link
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProgramDiagnostics {
    pub vertex_log: String,
    pub fragment_log: String,
    pub program_log: String,
}

/// Limits reported by the driver
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceParameters {
    pub version: String,
    pub renderer: String,
    pub max_texture_units: u32,
    pub max_vertex_texture_units: u32,
    pub max_texture_size: u32,
    pub max_cube_map_size: u32,
    pub max_3d_texture_size: u32,
    pub max_array_texture_layers: u32,
    pub max_vertex_attribs: u32,
    pub max_vertex_uniform_vectors: u32,
    pub max_fragment_uniform_vectors: u32,
    pub max_varying_vectors: u32,
    pub max_samples: u32,
    /// Zero when anisotropic filtering is unavailable
    pub max_anisotropy: f32,
}

impl Default for DeviceParameters {
    fn default() -> Self {
        Self {
            version: "OpenGL ES 3.0".to_string(),
            renderer: "headless".to_string(),
            max_texture_units: 16,
            max_vertex_texture_units: 16,
            max_texture_size: 4096,
            max_cube_map_size: 4096,
            max_3d_texture_size: 2048,
            max_array_texture_layers: 256,
            max_vertex_attribs: 16,
            max_vertex_uniform_vectors: 1024,
            max_fragment_uniform_vectors: 1024,
            max_varying_vectors: 15,
            max_samples: 4,
            max_anisotropy: 16.0,
        }
    }
}
