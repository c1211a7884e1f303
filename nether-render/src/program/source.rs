//! Shader source assembly
//!
//! Source is built in four passes over plain text:
//! 1. prefix: version, precision, feature defines and common declarations
//! 2. `#include <chunk>` expansion, recursive
//! 3. whole-identifier substitution of light and clipping counts
//! 4. expansion of `#pragma unroll_loop_start` blocks
//!
//! Everything here is pure; the same parameters always yield the same text.

use std::fmt::Write as _;

use super::ProgramError;
use super::chunks;
use super::parameters::{ProgramFeatures, ProgramParameters, ShaderId};
use crate::config::{ColorSpace, ShadowType, ToneMapping};
use crate::device::ShaderSource;

const MAX_INCLUDE_DEPTH: usize = 16;
const UNROLL_START: &str = "#pragma unroll_loop_start";
const UNROLL_END: &str = "#pragma unroll_loop_end";

/// Build both stages for `parameters`.
pub fn assemble_source(parameters: &ProgramParameters) -> Result<ShaderSource, ProgramError> {
    let (vertex_body, fragment_body) = match (&parameters.custom, chunks::templates(parameters.shader)) {
        (Some(custom), _) => (custom.vertex.as_str(), custom.fragment.as_str()),
        (None, Some(templates)) => templates,
        (None, None) => {
            return Err(ProgramError::MissingChunk(parameters.shader.name().to_string()));
        }
    };

    let raw = parameters.custom.as_ref().is_some_and(|c| c.raw);
    let (vertex_prefix, fragment_prefix) = if raw {
        let defines = custom_defines(parameters);
        (defines.clone(), defines)
    } else {
        (vertex_prefix(parameters), fragment_prefix(parameters))
    };

    let counts = count_replacements(parameters);
    let finish = |prefix: String, body: &str| -> Result<String, ProgramError> {
        let text = resolve_includes(body, 0)?;
        let text = replace_identifiers(&text, &counts);
        let text = unroll_loops(&text)?;
        Ok(prefix + &text)
    };

    Ok(ShaderSource {
        name: parameters.shader.name().to_string(),
        vertex: finish(vertex_prefix, vertex_body)?,
        fragment: finish(fragment_prefix, fragment_body)?,
    })
}

fn custom_defines(parameters: &ProgramParameters) -> String {
    let mut out = String::new();
    if let Some(custom) = &parameters.custom {
        for (name, value) in &custom.defines {
            let _ = writeln!(out, "#define {} {}", name, value);
        }
    }
    out
}

/// Lines shared by both stages: version, precision and defines.
fn common_prefix(parameters: &ProgramParameters) -> String {
    let precision = parameters.precision.qualifier();
    let mut out = String::new();
    out.push_str("#version 300 es\n");
    let _ = writeln!(out, "#define SHADER_NAME {}", parameters.shader.name());
    let _ = writeln!(out, "precision {} float;", precision);
    let _ = writeln!(out, "precision {} int;", precision);
    let _ = writeln!(out, "precision {} sampler2D;", precision);
    let _ = writeln!(out, "precision {} samplerCube;", precision);

    match parameters.shader {
        ShaderId::Lambert => out.push_str("#define LAMBERT\n"),
        ShaderId::Phong => out.push_str("#define PHONG\n"),
        ShaderId::Standard => out.push_str("#define STANDARD\n"),
        ShaderId::Physical => out.push_str("#define STANDARD\n#define PHYSICAL\n"),
        _ => {}
    }
    for define in parameters.features.defines() {
        let _ = writeln!(out, "#define {}", define);
    }
    out.push_str(&custom_defines(parameters));

    if parameters.features.contains(ProgramFeatures::SKINNING) {
        let _ = writeln!(out, "#define MAX_BONES {}", parameters.bones.max(1));
    }
    if parameters.morph_targets > 0 {
        let _ = writeln!(out, "#define MORPHTARGETS_COUNT {}", parameters.morph_targets);
    }
    if let Some(shadow_type) = parameters.shadow_type {
        let define = match shadow_type {
            ShadowType::Basic => "SHADOWMAP_TYPE_BASIC",
            ShadowType::Pcf => "SHADOWMAP_TYPE_PCF",
            ShadowType::PcfSoft => "SHADOWMAP_TYPE_PCF_SOFT",
            ShadowType::Vsm => "SHADOWMAP_TYPE_VSM",
        };
        let _ = writeln!(out, "#define {}", define);
    }
    if parameters.shader == ShaderId::ShadowBlur {
        let _ = writeln!(out, "#define VSM_SAMPLES {}", parameters.blur_samples.max(1));
    }
    out
}

fn vertex_prefix(parameters: &ProgramParameters) -> String {
    let mut out = common_prefix(parameters);
    out.push_str(VERTEX_DECLARATIONS);

    let count = parameters.morph_targets;
    if count > 0 {
        let normals = parameters.features.contains(ProgramFeatures::MORPH_NORMALS);
        for i in 0..count {
            let _ = writeln!(out, "in vec3 morphTarget{};", i);
        }
        if normals {
            for i in 0..count {
                let _ = writeln!(out, "in vec3 morphNormal{};", i);
            }
        }
        out.push_str(&morph_getter("getMorphTarget", "morphTarget", count));
        if normals {
            out.push_str(&morph_getter("getMorphNormal", "morphNormal", count));
        }
    }
    out
}

/// Constant-index accessor over the numbered morph attributes.
fn morph_getter(function: &str, attribute: &str, count: u32) -> String {
    let mut out = format!("vec3 {}( const in int i ) {{\n", function);
    for i in 0..count {
        let _ = writeln!(out, "\tif ( i == {} ) return {}{};", i, attribute, i);
    }
    out.push_str("\treturn vec3( 0.0 );\n}\n");
    out
}

fn fragment_prefix(parameters: &ProgramParameters) -> String {
    let mut out = common_prefix(parameters);

    let tone_mapping = match parameters.tone_mapping {
        ToneMapping::None => None,
        ToneMapping::Linear => Some("LinearToneMapping"),
        ToneMapping::Reinhard => Some("ReinhardToneMapping"),
        ToneMapping::Cineon => Some("CineonToneMapping"),
        ToneMapping::AcesFilmic => Some("ACESFilmicToneMapping"),
        ToneMapping::AgX => Some("AgXToneMapping"),
        ToneMapping::Neutral => Some("NeutralToneMapping"),
    };
    if let Some(function) = tone_mapping {
        out.push_str("#define TONE_MAPPING\n");
        let _ = writeln!(out, "#define toneMapping( a ) {}( a )", function);
    }
    if parameters.output_color_space == ColorSpace::Srgb {
        out.push_str("#define OUTPUT_SRGB\n");
    }
    out.push_str(FRAGMENT_DECLARATIONS);
    out
}

const VERTEX_DECLARATIONS: &str = "\
uniform mat4 modelMatrix;
uniform mat4 modelViewMatrix;
uniform mat4 projectionMatrix;
uniform mat4 viewMatrix;
uniform mat3 normalMatrix;
uniform vec3 cameraPosition;
uniform bool isOrthographic;
#ifdef USE_INSTANCING
in mat4 instanceMatrix;
#endif
#ifdef USE_INSTANCING_COLOR
in vec3 instanceColor;
#endif
in vec3 position;
in vec3 normal;
in vec2 uv;
#ifdef USE_COLOR
in vec3 color;
#endif
#ifdef USE_SKINNING
in vec4 skinIndex;
in vec4 skinWeight;
#endif
";

const FRAGMENT_DECLARATIONS: &str = "\
uniform mat4 viewMatrix;
uniform vec3 cameraPosition;
uniform bool isOrthographic;
out highp vec4 pc_fragColor;
#define gl_FragColor pc_fragColor
";

/// Expand `#include <name>` lines from the chunk library.
pub fn resolve_includes(source: &str, depth: usize) -> Result<String, ProgramError> {
    if depth > MAX_INCLUDE_DEPTH {
        return Err(ProgramError::MissingChunk(format!(
            "include nesting deeper than {}",
            MAX_INCLUDE_DEPTH
        )));
    }
    let mut out = String::with_capacity(source.len());
    for line in source.lines() {
        let trimmed = line.trim();
        if let Some(rest) = trimmed.strip_prefix("#include") {
            let name = rest.trim().trim_start_matches('<').trim_end_matches('>').trim();
            let chunk = chunks::chunk(name).ok_or_else(|| ProgramError::MissingChunk(name.to_string()))?;
            out.push_str(&resolve_includes(chunk, depth + 1)?);
        } else {
            out.push_str(line);
            out.push('\n');
        }
    }
    Ok(out)
}

fn count_replacements(parameters: &ProgramParameters) -> Vec<(&'static str, u32)> {
    let l = &parameters.lights;
    let spot_coords = (l.spot_shadows + l.spot_maps).saturating_sub(l.spot_shadows_with_maps);
    vec![
        ("NUM_DIR_LIGHTS", l.directional),
        ("NUM_POINT_LIGHTS", l.point),
        ("NUM_SPOT_LIGHTS", l.spot),
        ("NUM_SPOT_LIGHT_MAPS", l.spot_maps),
        ("NUM_SPOT_LIGHT_COORDS", spot_coords),
        ("NUM_RECT_AREA_LIGHTS", l.rect_area),
        ("NUM_HEMI_LIGHTS", l.hemisphere),
        ("NUM_DIR_LIGHT_SHADOWS", l.directional_shadows),
        ("NUM_POINT_LIGHT_SHADOWS", l.point_shadows),
        ("NUM_SPOT_LIGHT_SHADOWS", l.spot_shadows),
        ("NUM_SPOT_LIGHT_SHADOWS_WITH_MAPS", l.spot_shadows_with_maps),
        ("NUM_CLIPPING_PLANES", parameters.num_clipping_planes),
        (
            "UNION_CLIPPING_PLANES",
            parameters
                .num_clipping_planes
                .saturating_sub(parameters.num_clip_intersection),
        ),
        ("MORPHTARGETS_COUNT", parameters.morph_targets),
    ]
}

fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Replace whole identifiers only, so `NUM_SPOT_LIGHTS` never matches
/// inside `NUM_SPOT_LIGHTS_WITH_MAPS`.
pub fn replace_identifiers<V: std::fmt::Display>(source: &str, replacements: &[(&str, V)]) -> String {
    let mut out = String::with_capacity(source.len());
    let mut rest = source;
    while let Some(start) = rest.find(|c: char| c.is_ascii_alphabetic() || c == '_') {
        out.push_str(&rest[..start]);
        let word = &rest[start..];
        let end = word.find(|c: char| !is_identifier_char(c)).unwrap_or(word.len());
        let ident = &word[..end];
        match replacements.iter().find(|(name, _)| *name == ident) {
            Some((_, value)) => {
                let _ = write!(out, "{}", value);
            }
            None => out.push_str(ident),
        }
        rest = &word[end..];
    }
    out.push_str(rest);
    out
}

/// Replace each unroll block with one copy of its body per index.
pub fn unroll_loops(source: &str) -> Result<String, ProgramError> {
    let mut out = String::with_capacity(source.len());
    let mut rest = source;
    while let Some(start) = rest.find(UNROLL_START) {
        out.push_str(&rest[..start]);
        let block_start = start + UNROLL_START.len();
        let block_len = rest[block_start..]
            .find(UNROLL_END)
            .ok_or_else(|| ProgramError::MalformedLoop("missing unroll_loop_end".into()))?;
        let block = &rest[block_start..block_start + block_len];
        out.push_str(&unroll_block(block)?);
        rest = &rest[block_start + block_len + UNROLL_END.len()..];
    }
    out.push_str(rest);
    Ok(out)
}

fn unroll_block(block: &str) -> Result<String, ProgramError> {
    let malformed = || ProgramError::MalformedLoop(block.trim().lines().next().unwrap_or("").to_string());

    let for_at = block.find("for").ok_or_else(malformed)?;
    let open = for_at + block[for_at..].find('{').ok_or_else(malformed)?;
    let close = block.rfind('}').filter(|c| *c > open).ok_or_else(malformed)?;
    let header = block[for_at + 3..open].trim().trim_start_matches('(').trim_end_matches(')');
    let body = &block[open + 1..close];

    let mut clauses = header.split(';');
    let (Some(init), Some(test)) = (clauses.next(), clauses.next()) else {
        return Err(malformed());
    };
    let begin: u32 = init
        .split('=')
        .nth(1)
        .and_then(|v| v.trim().parse().ok())
        .ok_or_else(malformed)?;
    let end: u32 = test
        .split('<')
        .nth(1)
        .and_then(|v| v.trim().parse().ok())
        .ok_or_else(malformed)?;

    let mut out = String::new();
    for index in begin..end {
        let iteration = body.replace("[ i ]", &format!("[ {} ]", index));
        let iteration = replace_identifiers(&iteration, &[("UNROLLED_LOOP_INDEX", index)]);
        out.push_str("\t{");
        out.push_str(&iteration);
        out.push_str("}\n");
    }
    Ok(out)
}
