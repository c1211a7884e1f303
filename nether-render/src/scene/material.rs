//! Materials: shading model, render state and texture slots

use glam::{Vec2, Vec3};

use super::camera::Plane;
use super::{MaterialId, TextureId, next_resource_id};
use crate::device::{BlendEquation, BlendFactor, CompareFunction, StencilOp};
use crate::uniforms::UniformValue;

/// Which faces are rasterised
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Side {
    #[default]
    Front,
    Back,
    Double,
}

impl Side {
    /// Side used when drawing into a shadow map unless overridden.
    pub fn shadow_side(self) -> Side {
        match self {
            Side::Front => Side::Back,
            Side::Back => Side::Front,
            Side::Double => Side::Double,
        }
    }
}

/// Explicit blend equation and factors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CustomBlending {
    pub equation: BlendEquation,
    pub src: BlendFactor,
    pub dst: BlendFactor,
    /// Falls back to the colour equation/factors when `None`
    pub equation_alpha: Option<BlendEquation>,
    pub src_alpha: Option<BlendFactor>,
    pub dst_alpha: Option<BlendFactor>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Blending {
    None,
    #[default]
    Normal,
    Additive,
    Subtractive,
    Multiply,
    Custom(CustomBlending),
}

/// Stencil test and write configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StencilState {
    pub func: CompareFunction,
    pub reference: i32,
    pub func_mask: u32,
    pub write_mask: u32,
    pub fail: StencilOp,
    pub z_fail: StencilOp,
    pub z_pass: StencilOp,
}

impl Default for StencilState {
    fn default() -> Self {
        Self {
            func: CompareFunction::Always,
            reference: 0,
            func_mask: 0xff,
            write_mask: 0xff,
            fail: StencilOp::Keep,
            z_fail: StencilOp::Keep,
            z_pass: StencilOp::Keep,
        }
    }
}

/// Packing of depth values written by depth materials
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DepthPacking {
    #[default]
    Basic,
    Rgba,
}

/// User-supplied shader source
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ShaderMaterial {
    pub vertex: String,
    pub fragment: String,
    pub uniforms: Vec<(String, UniformValue)>,
    pub defines: Vec<(String, String)>,
    /// Skip the built-in prefix (version, precision, common uniforms)
    pub raw: bool,
    /// Receive the light uniform block
    pub lights: bool,
}

impl ShaderMaterial {
    pub fn new(vertex: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self {
            vertex: vertex.into(),
            fragment: fragment.into(),
            ..Default::default()
        }
    }

    pub fn with_uniform(mut self, name: &str, value: UniformValue) -> Self {
        self.set_uniform(name, value);
        self
    }

    pub fn with_define(mut self, name: &str, value: &str) -> Self {
        self.defines.push((name.to_string(), value.to_string()));
        self
    }

    pub fn set_uniform(&mut self, name: &str, value: UniformValue) {
        match self.uniforms.iter_mut().find(|(n, _)| n == name) {
            Some((_, slot)) => *slot = value,
            None => self.uniforms.push((name.to_string(), value)),
        }
    }
}

/// Shading model
#[derive(Debug, Clone, PartialEq, Default)]
pub enum MaterialKind {
    /// Unlit colour and maps
    #[default]
    Basic,
    Lambert,
    Phong,
    Standard,
    Physical,
    Normal,
    Depth { packing: DepthPacking },
    /// Linear distance to a reference point (point light shadows)
    Distance {
        reference_position: Vec3,
        near: f32,
        far: f32,
    },
    /// Transparent surface that only shows received shadows
    Shadow,
    /// Separable blur over a variance shadow map
    ShadowBlur {
        source: Option<TextureId>,
        horizontal: bool,
        samples: u32,
        radius: f32,
        resolution: Vec2,
    },
    Points { size: f32, size_attenuation: bool },
    Line,
    Shader(Box<ShaderMaterial>),
}

/// A material: shading model plus render state.
///
/// Mutate through [`crate::Scene::material_mut`] so the version is bumped.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    id: MaterialId,
    version: u64,
    pub name: String,
    pub kind: MaterialKind,
    pub visible: bool,

    pub side: Side,
    pub shadow_side: Option<Side>,
    pub blending: Blending,
    pub premultiplied_alpha: bool,
    pub transparent: bool,
    pub opacity: f32,
    pub transmission: f32,
    pub alpha_test: f32,
    pub alpha_to_coverage: bool,
    pub depth_test: bool,
    pub depth_write: bool,
    pub depth_func: CompareFunction,
    pub color_write: bool,
    pub stencil: Option<StencilState>,
    /// `(factor, units)`
    pub polygon_offset: Option<(f32, f32)>,
    pub vertex_colors: bool,
    pub flat_shading: bool,
    pub wireframe: bool,
    pub line_width: f32,
    pub fog: bool,
    pub tone_mapped: bool,
    pub dithering: bool,
    pub clipping_planes: Vec<Plane>,
    pub clip_intersection: bool,
    pub clip_shadows: bool,

    pub color: Vec3,
    pub emissive: Vec3,
    pub emissive_intensity: f32,
    pub specular: Vec3,
    pub shininess: f32,
    pub roughness: f32,
    pub metalness: f32,
    pub ior: f32,
    pub thickness: f32,
    pub attenuation_color: Vec3,
    pub attenuation_distance: f32,
    pub clearcoat: f32,
    pub clearcoat_roughness: f32,
    pub env_map_intensity: f32,
    pub ao_map_intensity: f32,
    pub light_map_intensity: f32,
    pub normal_scale: Vec2,
    pub bump_scale: f32,
    pub displacement_scale: f32,
    pub displacement_bias: f32,

    pub map: Option<TextureId>,
    pub alpha_map: Option<TextureId>,
    pub normal_map: Option<TextureId>,
    pub bump_map: Option<TextureId>,
    pub displacement_map: Option<TextureId>,
    pub emissive_map: Option<TextureId>,
    pub roughness_map: Option<TextureId>,
    pub metalness_map: Option<TextureId>,
    pub specular_map: Option<TextureId>,
    pub ao_map: Option<TextureId>,
    pub light_map: Option<TextureId>,
    pub env_map: Option<TextureId>,
    pub transmission_map: Option<TextureId>,
    pub thickness_map: Option<TextureId>,
}

impl Default for Material {
    fn default() -> Self {
        Self::new(MaterialKind::Basic)
    }
}

impl Material {
    pub fn new(kind: MaterialKind) -> Self {
        Self {
            id: MaterialId(next_resource_id()),
            version: 0,
            name: String::new(),
            kind,
            visible: true,
            side: Side::Front,
            shadow_side: None,
            blending: Blending::Normal,
            premultiplied_alpha: false,
            transparent: false,
            opacity: 1.0,
            transmission: 0.0,
            alpha_test: 0.0,
            alpha_to_coverage: false,
            depth_test: true,
            depth_write: true,
            depth_func: CompareFunction::LessEqual,
            color_write: true,
            stencil: None,
            polygon_offset: None,
            vertex_colors: false,
            flat_shading: false,
            wireframe: false,
            line_width: 1.0,
            fog: true,
            tone_mapped: true,
            dithering: false,
            clipping_planes: Vec::new(),
            clip_intersection: false,
            clip_shadows: false,
            color: Vec3::ONE,
            emissive: Vec3::ZERO,
            emissive_intensity: 1.0,
            specular: Vec3::splat(0.067),
            shininess: 30.0,
            roughness: 1.0,
            metalness: 0.0,
            ior: 1.5,
            thickness: 0.0,
            attenuation_color: Vec3::ONE,
            attenuation_distance: f32::INFINITY,
            clearcoat: 0.0,
            clearcoat_roughness: 0.0,
            env_map_intensity: 1.0,
            ao_map_intensity: 1.0,
            light_map_intensity: 1.0,
            normal_scale: Vec2::ONE,
            bump_scale: 1.0,
            displacement_scale: 1.0,
            displacement_bias: 0.0,
            map: None,
            alpha_map: None,
            normal_map: None,
            bump_map: None,
            displacement_map: None,
            emissive_map: None,
            roughness_map: None,
            metalness_map: None,
            specular_map: None,
            ao_map: None,
            light_map: None,
            env_map: None,
            transmission_map: None,
            thickness_map: None,
        }
    }

    pub fn basic(color: Vec3) -> Self {
        Self {
            color,
            ..Self::new(MaterialKind::Basic)
        }
    }

    pub fn standard(color: Vec3, roughness: f32, metalness: f32) -> Self {
        Self {
            color,
            roughness,
            metalness,
            ..Self::new(MaterialKind::Standard)
        }
    }

    pub fn shader(shader: ShaderMaterial) -> Self {
        Self::new(MaterialKind::Shader(Box::new(shader)))
    }

    pub fn with_transparency(mut self, opacity: f32) -> Self {
        self.transparent = true;
        self.opacity = opacity;
        self
    }

    pub fn id(&self) -> MaterialId {
        self.id
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Force programs and uniforms to be re-evaluated.
    pub fn needs_update(&mut self) {
        self.version += 1;
    }

    /// Copy with a fresh id and version (used for cached override materials).
    pub fn duplicate(&self) -> Self {
        Self {
            id: MaterialId(next_resource_id()),
            version: 0,
            ..self.clone()
        }
    }

    /// Whether the shading model consumes the light uniform block.
    pub fn uses_lights(&self) -> bool {
        match &self.kind {
            MaterialKind::Lambert
            | MaterialKind::Phong
            | MaterialKind::Standard
            | MaterialKind::Physical
            | MaterialKind::Shadow => true,
            MaterialKind::Shader(shader) => shader.lights,
            _ => false,
        }
    }

    pub fn is_shader(&self) -> bool {
        matches!(self.kind, MaterialKind::Shader(_))
    }

    /// Every texture the material samples.
    pub fn textures(&self) -> impl Iterator<Item = TextureId> + '_ {
        let slots = [
            self.map,
            self.alpha_map,
            self.normal_map,
            self.bump_map,
            self.displacement_map,
            self.emissive_map,
            self.roughness_map,
            self.metalness_map,
            self.specular_map,
            self.ao_map,
            self.light_map,
            self.env_map,
            self.transmission_map,
            self.thickness_map,
        ];
        let custom: Vec<TextureId> = match &self.kind {
            MaterialKind::Shader(shader) => shader
                .uniforms
                .iter()
                .flat_map(|(_, value)| value.textures())
                .collect(),
            _ => Vec::new(),
        };
        slots.into_iter().flatten().chain(custom)
    }
}
