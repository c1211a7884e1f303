//! Program parameter descriptor
//!
//! [`get_parameters`] reduces a material, the frame's light shapes and the
//! drawn object to the handful of facts that change generated shader text.
//! Uniform values never appear here: two materials that differ only in
//! colour or opacity produce equal parameters and share one program.

use crate::config::{ColorSpace, ShadowSettings, ShadowType, ToneMapping};
use crate::device::Precision;
use crate::lights::LightCounts;
use crate::scene::{
    DepthPacking, Fog, Material, MaterialKind, Node, Scene, Side, TextureKind,
};

/// Morph targets a program can blend without morphed normals.
pub const MAX_MORPH_TARGETS: u32 = 8;
/// Morph targets a program can blend when normals are morphed too.
pub const MAX_MORPH_TARGETS_WITH_NORMALS: u32 = 4;

/// Built-in shader a material maps to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderId {
    Basic,
    Lambert,
    Phong,
    Standard,
    Physical,
    Normal,
    Depth,
    Distance,
    Shadow,
    ShadowBlur,
    Points,
    Line,
    /// User source from a shader material
    Custom,
}

impl ShaderId {
    pub fn of(kind: &MaterialKind) -> Self {
        match kind {
            MaterialKind::Basic => ShaderId::Basic,
            MaterialKind::Lambert => ShaderId::Lambert,
            MaterialKind::Phong => ShaderId::Phong,
            MaterialKind::Standard => ShaderId::Standard,
            MaterialKind::Physical => ShaderId::Physical,
            MaterialKind::Normal => ShaderId::Normal,
            MaterialKind::Depth { .. } => ShaderId::Depth,
            MaterialKind::Distance { .. } => ShaderId::Distance,
            MaterialKind::Shadow => ShaderId::Shadow,
            MaterialKind::ShadowBlur { .. } => ShaderId::ShadowBlur,
            MaterialKind::Points { .. } => ShaderId::Points,
            MaterialKind::Line => ShaderId::Line,
            MaterialKind::Shader(_) => ShaderId::Custom,
        }
    }

    /// Name used for program labels and the `SHADER_NAME` define.
    pub fn name(self) -> &'static str {
        match self {
            ShaderId::Basic => "MeshBasicMaterial",
            ShaderId::Lambert => "MeshLambertMaterial",
            ShaderId::Phong => "MeshPhongMaterial",
            ShaderId::Standard => "MeshStandardMaterial",
            ShaderId::Physical => "MeshPhysicalMaterial",
            ShaderId::Normal => "MeshNormalMaterial",
            ShaderId::Depth => "MeshDepthMaterial",
            ShaderId::Distance => "MeshDistanceMaterial",
            ShaderId::Shadow => "ShadowMaterial",
            ShaderId::ShadowBlur => "ShadowBlurMaterial",
            ShaderId::Points => "PointsMaterial",
            ShaderId::Line => "LineBasicMaterial",
            ShaderId::Custom => "ShaderMaterial",
        }
    }
}

bitflags::bitflags! {
    /// Boolean switches that select shader code paths
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ProgramFeatures: u64 {
        const MAP = 1 << 0;
        const ALPHA_MAP = 1 << 1;
        const NORMAL_MAP = 1 << 2;
        const BUMP_MAP = 1 << 3;
        const DISPLACEMENT_MAP = 1 << 4;
        const EMISSIVE_MAP = 1 << 5;
        const ROUGHNESS_MAP = 1 << 6;
        const METALNESS_MAP = 1 << 7;
        const SPECULAR_MAP = 1 << 8;
        const AO_MAP = 1 << 9;
        const LIGHT_MAP = 1 << 10;
        const ENV_MAP = 1 << 11;
        /// Environment map is a cube texture (otherwise equirectangular)
        const ENV_MAP_CUBE = 1 << 12;
        const TRANSMISSION = 1 << 13;
        const TRANSMISSION_MAP = 1 << 14;
        const THICKNESS_MAP = 1 << 15;
        const CLEARCOAT = 1 << 16;
        const ALPHA_TEST = 1 << 17;
        const ALPHA_TO_COVERAGE = 1 << 18;
        const VERTEX_COLORS = 1 << 19;
        const INSTANCING = 1 << 20;
        const INSTANCING_COLOR = 1 << 21;
        const SKINNING = 1 << 22;
        const MORPH_TARGETS = 1 << 23;
        const MORPH_NORMALS = 1 << 24;
        /// Morph data holds offsets instead of absolute positions
        const MORPH_RELATIVE = 1 << 25;
        const FLAT_SHADING = 1 << 26;
        const DOUBLE_SIDED = 1 << 27;
        const FLIP_SIDED = 1 << 28;
        const FOG = 1 << 29;
        const FOG_EXP2 = 1 << 30;
        /// Shadow maps are sampled for lights with shadows
        const SHADOW_MAP = 1 << 31;
        const RECEIVE_SHADOW = 1 << 32;
        const PREMULTIPLIED_ALPHA = 1 << 33;
        const DITHERING = 1 << 34;
        const LOGARITHMIC_DEPTH = 1 << 35;
        const REVERSED_DEPTH = 1 << 36;
        const SIZE_ATTENUATION = 1 << 37;
        const DEPTH_PACKING_RGBA = 1 << 38;
        /// First (horizontal) pass of the shadow blur
        const HORIZONTAL_PASS = 1 << 39;
        /// Geometry provides texture coordinates
        const VERTEX_UVS = 1 << 40;
        const VERTEX_TEXTURES = 1 << 41;
    }
}

/// Preprocessor define emitted for each feature.
const FEATURE_DEFINES: [(ProgramFeatures, &str); 42] = [
    (ProgramFeatures::MAP, "USE_MAP"),
    (ProgramFeatures::ALPHA_MAP, "USE_ALPHAMAP"),
    (ProgramFeatures::NORMAL_MAP, "USE_NORMALMAP"),
    (ProgramFeatures::BUMP_MAP, "USE_BUMPMAP"),
    (ProgramFeatures::DISPLACEMENT_MAP, "USE_DISPLACEMENTMAP"),
    (ProgramFeatures::EMISSIVE_MAP, "USE_EMISSIVEMAP"),
    (ProgramFeatures::ROUGHNESS_MAP, "USE_ROUGHNESSMAP"),
    (ProgramFeatures::METALNESS_MAP, "USE_METALNESSMAP"),
    (ProgramFeatures::SPECULAR_MAP, "USE_SPECULARMAP"),
    (ProgramFeatures::AO_MAP, "USE_AOMAP"),
    (ProgramFeatures::LIGHT_MAP, "USE_LIGHTMAP"),
    (ProgramFeatures::ENV_MAP, "USE_ENVMAP"),
    (ProgramFeatures::ENV_MAP_CUBE, "ENVMAP_TYPE_CUBE"),
    (ProgramFeatures::TRANSMISSION, "USE_TRANSMISSION"),
    (ProgramFeatures::TRANSMISSION_MAP, "USE_TRANSMISSIONMAP"),
    (ProgramFeatures::THICKNESS_MAP, "USE_THICKNESSMAP"),
    (ProgramFeatures::CLEARCOAT, "USE_CLEARCOAT"),
    (ProgramFeatures::ALPHA_TEST, "USE_ALPHATEST"),
    (ProgramFeatures::ALPHA_TO_COVERAGE, "ALPHA_TO_COVERAGE"),
    (ProgramFeatures::VERTEX_COLORS, "USE_COLOR"),
    (ProgramFeatures::INSTANCING, "USE_INSTANCING"),
    (ProgramFeatures::INSTANCING_COLOR, "USE_INSTANCING_COLOR"),
    (ProgramFeatures::SKINNING, "USE_SKINNING"),
    (ProgramFeatures::MORPH_TARGETS, "USE_MORPHTARGETS"),
    (ProgramFeatures::MORPH_NORMALS, "USE_MORPHNORMALS"),
    (ProgramFeatures::MORPH_RELATIVE, "MORPHTARGETS_RELATIVE"),
    (ProgramFeatures::FLAT_SHADING, "FLAT_SHADED"),
    (ProgramFeatures::DOUBLE_SIDED, "DOUBLE_SIDED"),
    (ProgramFeatures::FLIP_SIDED, "FLIP_SIDED"),
    (ProgramFeatures::FOG, "USE_FOG"),
    (ProgramFeatures::FOG_EXP2, "FOG_EXP2"),
    (ProgramFeatures::SHADOW_MAP, "USE_SHADOWMAP"),
    (ProgramFeatures::RECEIVE_SHADOW, "RECEIVE_SHADOW"),
    (ProgramFeatures::PREMULTIPLIED_ALPHA, "PREMULTIPLIED_ALPHA"),
    (ProgramFeatures::DITHERING, "DITHERING"),
    (ProgramFeatures::LOGARITHMIC_DEPTH, "USE_LOGDEPTHBUF"),
    (ProgramFeatures::REVERSED_DEPTH, "USE_REVERSEDEPTHBUF"),
    (ProgramFeatures::SIZE_ATTENUATION, "USE_SIZEATTENUATION"),
    (ProgramFeatures::DEPTH_PACKING_RGBA, "DEPTH_PACKING_RGBA"),
    (ProgramFeatures::HORIZONTAL_PASS, "HORIZONTAL_PASS"),
    (ProgramFeatures::VERTEX_UVS, "USE_UV"),
    (ProgramFeatures::VERTEX_TEXTURES, "VERTEX_TEXTURES"),
];

impl ProgramFeatures {
    /// Defines for every set flag, in a fixed order.
    pub fn defines(self) -> impl Iterator<Item = &'static str> {
        FEATURE_DEFINES
            .iter()
            .filter(move |(flag, _)| self.contains(*flag))
            .map(|(_, define)| *define)
    }
}

/// User shader text carried by custom materials
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CustomSource {
    pub vertex: String,
    pub fragment: String,
    pub defines: Vec<(String, String)>,
    /// No built-in prefix
    pub raw: bool,
}

/// Everything that selects a program permutation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProgramParameters {
    pub shader: ShaderId,
    pub precision: Precision,
    pub features: ProgramFeatures,
    /// Zero for materials that ignore lights
    pub lights: LightCounts,
    /// `None` unless shadow maps are sampled
    pub shadow_type: Option<ShadowType>,
    pub num_clipping_planes: u32,
    pub num_clip_intersection: u32,
    pub morph_targets: u32,
    pub bones: u32,
    pub tone_mapping: ToneMapping,
    pub output_color_space: ColorSpace,
    /// Taps per side of the shadow blur
    pub blur_samples: u32,
    pub custom: Option<CustomSource>,
}

/// Frame-wide inputs to [`get_parameters`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterContext {
    pub precision: Precision,
    pub logarithmic_depth: bool,
    pub reversed_depth: bool,
    pub vertex_textures: bool,
    /// Operator for the current target; `None` off-screen
    pub tone_mapping: ToneMapping,
    pub output_color_space: ColorSpace,
    /// `(planes, intersection planes)` for this material
    pub clipping: (u32, u32),
    pub max_bones: u32,
}

impl Default for ParameterContext {
    fn default() -> Self {
        Self {
            precision: Precision::High,
            logarithmic_depth: false,
            reversed_depth: false,
            vertex_textures: true,
            tone_mapping: ToneMapping::None,
            output_color_space: ColorSpace::Linear,
            clipping: (0, 0),
            max_bones: 256,
        }
    }
}

/// Describe the program `material` needs when drawing `object`.
///
/// Pure: reads its inputs, touches no GPU state.
pub fn get_parameters(
    material: &Material,
    lights: &LightCounts,
    shadows: &ShadowSettings,
    scene: &Scene,
    object: Option<&Node>,
    ctx: &ParameterContext,
) -> ProgramParameters {
    let shader = ShaderId::of(&material.kind);
    let drawable = object.and_then(Node::as_drawable);
    let geometry = drawable.and_then(|d| scene.geometry(d.geometry));
    let mut features = ProgramFeatures::empty();

    let maps = [
        (material.map, ProgramFeatures::MAP),
        (material.alpha_map, ProgramFeatures::ALPHA_MAP),
        (material.normal_map, ProgramFeatures::NORMAL_MAP),
        (material.bump_map, ProgramFeatures::BUMP_MAP),
        (material.displacement_map, ProgramFeatures::DISPLACEMENT_MAP),
        (material.emissive_map, ProgramFeatures::EMISSIVE_MAP),
        (material.roughness_map, ProgramFeatures::ROUGHNESS_MAP),
        (material.metalness_map, ProgramFeatures::METALNESS_MAP),
        (material.specular_map, ProgramFeatures::SPECULAR_MAP),
        (material.ao_map, ProgramFeatures::AO_MAP),
        (material.light_map, ProgramFeatures::LIGHT_MAP),
        (material.env_map, ProgramFeatures::ENV_MAP),
    ];
    for (slot, flag) in maps {
        features.set(flag, slot.is_some());
    }
    if let Some(env_map) = material.env_map {
        let cube = scene
            .texture(env_map)
            .is_some_and(|t| t.kind == TextureKind::Cube);
        features.set(ProgramFeatures::ENV_MAP_CUBE, cube);
    }
    if material.displacement_map.is_some() && !ctx.vertex_textures {
        features.remove(ProgramFeatures::DISPLACEMENT_MAP);
    }
    features.set(ProgramFeatures::VERTEX_TEXTURES, ctx.vertex_textures);

    if shader == ShaderId::Physical {
        features.set(ProgramFeatures::CLEARCOAT, material.clearcoat > 0.0);
        if material.transmission > 0.0 {
            features.insert(ProgramFeatures::TRANSMISSION);
            features.set(ProgramFeatures::TRANSMISSION_MAP, material.transmission_map.is_some());
            features.set(ProgramFeatures::THICKNESS_MAP, material.thickness_map.is_some());
        }
    }

    features.set(ProgramFeatures::ALPHA_TEST, material.alpha_test > 0.0);
    features.set(ProgramFeatures::ALPHA_TO_COVERAGE, material.alpha_to_coverage);
    features.set(ProgramFeatures::VERTEX_COLORS, material.vertex_colors);
    features.set(ProgramFeatures::FLAT_SHADING, material.flat_shading);
    features.set(ProgramFeatures::DOUBLE_SIDED, material.side == Side::Double);
    features.set(ProgramFeatures::FLIP_SIDED, material.side == Side::Back);
    features.set(ProgramFeatures::PREMULTIPLIED_ALPHA, material.premultiplied_alpha);
    features.set(ProgramFeatures::DITHERING, material.dithering);
    features.set(ProgramFeatures::LOGARITHMIC_DEPTH, ctx.logarithmic_depth);
    features.set(ProgramFeatures::REVERSED_DEPTH, ctx.reversed_depth);

    if material.fog
        && let Some(fog) = scene.fog
    {
        features.insert(ProgramFeatures::FOG);
        features.set(ProgramFeatures::FOG_EXP2, matches!(fog, Fog::Exp2 { .. }));
    }

    let mut blur_samples = 0;
    match &material.kind {
        MaterialKind::Depth { packing } => {
            features.set(ProgramFeatures::DEPTH_PACKING_RGBA, *packing == DepthPacking::Rgba);
        }
        MaterialKind::Points {
            size_attenuation, ..
        } => {
            features.set(ProgramFeatures::SIZE_ATTENUATION, *size_attenuation);
        }
        MaterialKind::ShadowBlur {
            horizontal, samples, ..
        } => {
            features.set(ProgramFeatures::HORIZONTAL_PASS, *horizontal);
            blur_samples = *samples;
        }
        _ => {}
    }

    let mut bones = 0;
    let mut morph_targets = 0;
    if let Some(drawable) = drawable {
        if let Some(instancing) = &drawable.instancing {
            features.insert(ProgramFeatures::INSTANCING);
            features.set(ProgramFeatures::INSTANCING_COLOR, instancing.colors.is_some());
        }
        if let Some(skeleton) = &drawable.skeleton {
            features.insert(ProgramFeatures::SKINNING);
            bones = (skeleton.bone_matrices.len() as u32).min(ctx.max_bones);
        }
    }
    if let Some(geometry) = geometry {
        features.set(
            ProgramFeatures::VERTEX_UVS,
            geometry.has_attribute("uv") && features.intersects(uv_features()),
        );
        let morph_normals = geometry.morph_attribute("normal").is_some_and(|t| !t.is_empty());
        let limit = if morph_normals {
            MAX_MORPH_TARGETS_WITH_NORMALS
        } else {
            MAX_MORPH_TARGETS
        };
        morph_targets = geometry
            .morph_attribute("position")
            .map_or(0, |t| (t.len() as u32).min(limit));
        if morph_targets > 0 {
            features.insert(ProgramFeatures::MORPH_TARGETS);
            features.set(ProgramFeatures::MORPH_NORMALS, morph_normals);
            features.set(ProgramFeatures::MORPH_RELATIVE, geometry.morph_targets_relative);
        }
    } else {
        features.set(ProgramFeatures::VERTEX_UVS, features.intersects(uv_features()));
    }

    let uses_lights = material.uses_lights();
    let lights = if uses_lights {
        *lights
    } else {
        LightCounts::default()
    };
    let receives = object.is_some_and(|o| o.receive_shadow);
    let shadow_casting = lights.directional_shadows + lights.point_shadows + lights.spot_shadows > 0;
    let shadow_type = if uses_lights && shadows.enabled && shadow_casting {
        features.insert(ProgramFeatures::SHADOW_MAP);
        features.set(ProgramFeatures::RECEIVE_SHADOW, receives);
        Some(shadows.shadow_type)
    } else {
        None
    };

    let tone_mapping = if material.tone_mapped {
        ctx.tone_mapping
    } else {
        ToneMapping::None
    };

    let custom = match &material.kind {
        MaterialKind::Shader(shader) => Some(CustomSource {
            vertex: shader.vertex.clone(),
            fragment: shader.fragment.clone(),
            defines: shader.defines.clone(),
            raw: shader.raw,
        }),
        _ => None,
    };

    ProgramParameters {
        shader,
        precision: ctx.precision,
        features,
        lights,
        shadow_type,
        num_clipping_planes: ctx.clipping.0,
        num_clip_intersection: ctx.clipping.1,
        morph_targets,
        bones,
        tone_mapping,
        output_color_space: ctx.output_color_space,
        blur_samples,
        custom,
    }
}

/// Features that sample with texture coordinates.
fn uv_features() -> ProgramFeatures {
    ProgramFeatures::MAP
        | ProgramFeatures::ALPHA_MAP
        | ProgramFeatures::NORMAL_MAP
        | ProgramFeatures::BUMP_MAP
        | ProgramFeatures::DISPLACEMENT_MAP
        | ProgramFeatures::EMISSIVE_MAP
        | ProgramFeatures::ROUGHNESS_MAP
        | ProgramFeatures::METALNESS_MAP
        | ProgramFeatures::SPECULAR_MAP
        | ProgramFeatures::AO_MAP
        | ProgramFeatures::LIGHT_MAP
        | ProgramFeatures::TRANSMISSION_MAP
        | ProgramFeatures::THICKNESS_MAP
}
