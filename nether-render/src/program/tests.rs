//! Tests for program parameters, source assembly and the program cache

use glam::Vec3;

use super::*;
use crate::config::ShadowSettings;
use crate::device::{DeviceCommand, GpuDevice, RecordingDevice};
use crate::lights::LightCounts;
use crate::scene::{Image, Material, MaterialKind, Scene, ShaderMaterial, Texture};
use crate::state::GpuState;

fn params(material: &Material, lights: &LightCounts) -> ProgramParameters {
    params_with_shadows(material, lights, &ShadowSettings::default())
}

fn params_with_shadows(
    material: &Material,
    lights: &LightCounts,
    shadows: &ShadowSettings,
) -> ProgramParameters {
    let scene = Scene::new();
    get_parameters(
        material,
        lights,
        shadows,
        &scene,
        None,
        &ParameterContext::default(),
    )
}

fn shadows_on() -> ShadowSettings {
    ShadowSettings {
        enabled: true,
        ..Default::default()
    }
}

fn two_directional() -> LightCounts {
    LightCounts {
        directional: 2,
        ..Default::default()
    }
}

fn state() -> GpuState<RecordingDevice> {
    GpuState::new(RecordingDevice::new(), false)
}

fn created(state: &GpuState<RecordingDevice>) -> usize {
    state
        .device()
        .count(|c| matches!(c, DeviceCommand::CreateProgram { .. }))
}

// ============================================================================
// Parameters and keys
// ============================================================================

#[test]
fn test_equal_materials_share_key() {
    let a = Material::standard(Vec3::ONE, 0.5, 0.0);
    let b = Material::standard(Vec3::new(1.0, 0.0, 0.0), 0.2, 1.0);
    let lights = two_directional();
    assert_eq!(
        get_program_cache_key(&params(&a, &lights)),
        get_program_cache_key(&params(&b, &lights))
    );
}

#[test]
fn test_uniform_values_do_not_change_key() {
    let mut material = Material::basic(Vec3::ONE);
    let before = get_program_cache_key(&params(&material, &LightCounts::default()));
    material.opacity = 0.25;
    material.color = Vec3::ZERO;
    let after = get_program_cache_key(&params(&material, &LightCounts::default()));
    assert_eq!(before, after);
}

#[test]
fn test_map_changes_key() {
    let mut scene = Scene::new();
    let texture = scene.add_texture(Texture::new(Image::solid(2, 2, [255; 4])));
    let mut material = Material::basic(Vec3::ONE);
    let before = get_program_cache_key(&params(&material, &LightCounts::default()));
    material.map = Some(texture);
    let after = get_program_cache_key(&params(&material, &LightCounts::default()));
    assert_ne!(before, after);
}

#[test]
fn test_light_counts_only_affect_lit_materials() {
    let lit = Material::standard(Vec3::ONE, 0.5, 0.0);
    let unlit = Material::basic(Vec3::ONE);
    let none = LightCounts::default();
    let some = two_directional();

    assert_ne!(
        get_program_cache_key(&params(&lit, &none)),
        get_program_cache_key(&params(&lit, &some))
    );
    assert_eq!(
        get_program_cache_key(&params(&unlit, &none)),
        get_program_cache_key(&params(&unlit, &some))
    );
    assert_eq!(params(&unlit, &some).lights, LightCounts::default());
}

#[test]
fn test_tone_mapping_respects_material_flag() {
    let mut material = Material::basic(Vec3::ONE);
    let ctx = ParameterContext {
        tone_mapping: crate::config::ToneMapping::AcesFilmic,
        ..Default::default()
    };
    let scene = Scene::new();
    let shadows = ShadowSettings::default();
    let mapped = get_parameters(&material, &LightCounts::default(), &shadows, &scene, None, &ctx);
    material.tone_mapped = false;
    let unmapped = get_parameters(&material, &LightCounts::default(), &shadows, &scene, None, &ctx);

    assert_eq!(mapped.tone_mapping, crate::config::ToneMapping::AcesFilmic);
    assert_eq!(unmapped.tone_mapping, crate::config::ToneMapping::None);
}

#[test]
fn test_shadow_type_needs_shadow_casting_lights() {
    let material = Material::standard(Vec3::ONE, 0.5, 0.0);
    assert_eq!(params(&material, &two_directional()).shadow_type, None);

    let lights = LightCounts {
        directional: 1,
        directional_shadows: 1,
        ..Default::default()
    };
    assert_eq!(params(&material, &lights).shadow_type, None);

    let p = params_with_shadows(&material, &lights, &shadows_on());
    assert_eq!(p.shadow_type, Some(ShadowSettings::default().shadow_type));
    assert!(p.features.contains(ProgramFeatures::SHADOW_MAP));
}

#[test]
fn test_key_display_is_fixed_width_hex() {
    assert_eq!(ProgramKey(0xab).to_string(), "00000000000000ab");
}

// ============================================================================
// Source assembly
// ============================================================================

#[test]
fn test_assembly_resolves_includes_and_counts() {
    let material = Material::standard(Vec3::ONE, 0.5, 0.0);
    let source = assemble_source(&params(&material, &two_directional())).unwrap();

    for text in [&source.vertex, &source.fragment] {
        assert!(text.starts_with("#version 300 es\n"));
        assert!(!text.contains("#include"));
        assert!(!text.contains("#pragma unroll_loop"));
        assert!(!text.contains("NUM_DIR_LIGHTS"));
    }
    assert!(source.fragment.contains("#define STANDARD"));
    assert!(source.fragment.contains("uniform DirectionalLight directionalLights[2];"));
    assert_eq!(source.name, "MeshStandardMaterial");
}

#[test]
fn test_unrolled_loop_repeats_body_per_light() {
    let material = Material::standard(Vec3::ONE, 0.5, 0.0);
    let source = assemble_source(&params(&material, &two_directional())).unwrap();

    assert!(source.fragment.contains("directionalLights[ 0 ]"));
    assert!(source.fragment.contains("directionalLights[ 1 ]"));
    assert!(!source.fragment.contains("directionalLights[ 2 ]"));
    assert!(!source.fragment.contains("UNROLLED_LOOP_INDEX"));
}

#[test]
fn test_feature_defines_are_emitted() {
    let mut scene = Scene::new();
    let texture = scene.add_texture(Texture::new(Image::solid(2, 2, [255; 4])));
    let mut material = Material::basic(Vec3::ONE);
    material.map = Some(texture);
    material.alpha_test = 0.5;
    let source = assemble_source(&params(&material, &LightCounts::default())).unwrap();

    assert!(source.fragment.contains("#define USE_MAP\n"));
    assert!(source.fragment.contains("#define USE_ALPHATEST\n"));
    assert!(source.fragment.contains("#define USE_UV\n"));
}

#[test]
fn test_raw_shader_gets_only_custom_defines() {
    let mut shader = ShaderMaterial::new(
        "in vec3 position;\nvoid main() { gl_Position = vec4( position, 1.0 ); }\n",
        "void main() {}\n",
    )
    .with_define("WIDTH", "4");
    shader.raw = true;
    let material = Material::shader(shader);
    let source = assemble_source(&params(&material, &LightCounts::default())).unwrap();

    assert!(source.vertex.starts_with("#define WIDTH 4\n"));
    assert!(!source.vertex.contains("#version"));
    assert!(!source.fragment.contains("precision"));
}

#[test]
fn test_custom_shader_can_include_chunks() {
    let material = Material::shader(ShaderMaterial::new(
        "void main() { gl_Position = projectionMatrix * modelViewMatrix * vec4( position, 1.0 ); }\n",
        "#include <packing>\nvoid main() { gl_FragColor = packDepthToRGBA( 0.5 ); }\n",
    ));
    let source = assemble_source(&params(&material, &LightCounts::default())).unwrap();
    assert!(source.fragment.contains("vec4 packDepthToRGBA"));
    assert!(source.vertex.contains("uniform mat4 modelViewMatrix;"));
}

#[test]
fn test_missing_chunk_is_an_error() {
    let material = Material::shader(ShaderMaterial::new(
        "void main() {}\n",
        "#include <no_such_chunk>\nvoid main() {}\n",
    ));
    let err = assemble_source(&params(&material, &LightCounts::default())).unwrap_err();
    assert!(matches!(err, ProgramError::MissingChunk(name) if name == "no_such_chunk"));
}

#[test]
fn test_identifier_replacement_is_whole_word() {
    let text = "NUM_SPOT_LIGHTS NUM_SPOT_LIGHTS_WITH_MAPS xNUM_SPOT_LIGHTS";
    let out = source::replace_identifiers(text, &[("NUM_SPOT_LIGHTS", 3)]);
    assert_eq!(out, "3 NUM_SPOT_LIGHTS_WITH_MAPS xNUM_SPOT_LIGHTS");
}

#[test]
fn test_unroll_with_offset_start() {
    let text = "#pragma unroll_loop_start\nfor ( int i = 1; i < 3; i ++ ) {\n\tx[ i ] = UNROLLED_LOOP_INDEX;\n}\n#pragma unroll_loop_end\n";
    let out = source::unroll_loops(text).unwrap();
    assert!(out.contains("x[ 1 ] = 1;"));
    assert!(out.contains("x[ 2 ] = 2;"));
    assert!(!out.contains("x[ 0 ]"));
}

#[test]
fn test_unroll_rejects_symbolic_bounds() {
    let text = "#pragma unroll_loop_start\nfor ( int i = 0; i < COUNT; i ++ ) {\n}\n#pragma unroll_loop_end\n";
    assert!(matches!(
        source::unroll_loops(text),
        Err(ProgramError::MalformedLoop(_))
    ));
}

// ============================================================================
// Diagnostics
// ============================================================================

#[test]
fn test_error_line_parsing() {
    assert_eq!(
        diagnostics::error_line("WARNING: 0:2: x\nERROR: 0:17: 'foo' : syntax error\n"),
        Some(17)
    );
    assert_eq!(diagnostics::error_line("link failed"), None);
}

#[test]
fn test_excerpt_marks_failing_line() {
    let source: String = (1..=20).map(|i| format!("line {}\n", i)).collect();
    let excerpt = diagnostics::excerpt(&source, 10);
    let lines: Vec<&str> = excerpt.lines().collect();
    assert_eq!(lines.len(), 13);
    assert!(lines[0].ends_with("line 4"));
    assert!(lines[6].starts_with("> "));
    assert!(lines[6].ends_with("line 10"));
    assert!(lines[5].starts_with("  "));
}

// ============================================================================
// Cache
// ============================================================================

#[test]
fn test_equal_keys_share_one_program() {
    let mut state = state();
    let mut cache = ProgramCache::new();
    let p = params(&Material::basic(Vec3::ONE), &LightCounts::default());
    let key = get_program_cache_key(&p);

    let a = cache.acquire_program(&mut state, &p, key).unwrap();
    let b = cache.acquire_program(&mut state, &p, key).unwrap();
    assert!(std::rc::Rc::ptr_eq(&a, &b));
    assert_eq!(created(&state), 1);
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_program_deleted_after_last_release() {
    let mut state = state();
    let mut cache = ProgramCache::new();
    let p = params(&Material::basic(Vec3::ONE), &LightCounts::default());
    let key = get_program_cache_key(&p);

    let a = cache.acquire_program(&mut state, &p, key).unwrap();
    let b = cache.acquire_program(&mut state, &p, key).unwrap();
    let gpu = a.gpu();

    cache.release_program(&mut state, a);
    assert_eq!(state.device().count(|c| matches!(c, DeviceCommand::DeleteProgram(_))), 0);

    cache.release_program(&mut state, b);
    assert_eq!(
        state.device().count(|c| *c == DeviceCommand::DeleteProgram(gpu)),
        1
    );
    assert!(cache.is_empty());
    assert!(state.device().errors().is_empty());
}

#[test]
fn test_compile_failure_is_reported_and_not_retried() {
    let mut device = RecordingDevice::new();
    device.set_compile_failure_marker("BROKEN_TOKEN");
    let mut state = GpuState::new(device, false);
    let mut cache = ProgramCache::new();
    let material = Material::shader(ShaderMaterial::new(
        "void main() {}\n",
        "void main() {\n\tBROKEN_TOKEN;\n}\n",
    ));
    let p = params(&material, &LightCounts::default());
    let key = get_program_cache_key(&p);

    let err = cache.acquire_program(&mut state, &p, key).unwrap_err();
    let report = err.report().expect("driver report");
    let excerpt = report.fragment_excerpt.as_deref().expect("fragment excerpt");
    assert!(excerpt.lines().any(|l| l.starts_with("> ") && l.contains("BROKEN_TOKEN")));
    assert!(report.vertex_excerpt.is_none());
    assert!(report.to_string().contains("ShaderMaterial"));

    assert!(cache.acquire_program(&mut state, &p, key).is_err());
    assert_eq!(
        state.device().count(|c| matches!(c, DeviceCommand::CompileFailed { .. })),
        1
    );
    assert!(cache.failure(key).is_some());

    cache.forget_failure(key);
    assert!(cache.acquire_program(&mut state, &p, key).is_err());
    assert_eq!(
        state.device().count(|c| matches!(c, DeviceCommand::CompileFailed { .. })),
        2
    );
}

#[test]
fn test_reset_disowns_stale_handles() {
    let mut state = state();
    let mut cache = ProgramCache::new();
    let p = params(&Material::basic(Vec3::ONE), &LightCounts::default());
    let key = get_program_cache_key(&p);
    let stale = cache.acquire_program(&mut state, &p, key).unwrap();

    assert!(state.device_mut().lose_context());
    assert!(state.device_mut().restore_context());
    state.reset();
    cache.reset();

    drop(stale);
    cache.collect(&mut state);
    assert!(state.device().errors().is_empty());
    assert_eq!(state.device().count(|c| matches!(c, DeviceCommand::DeleteProgram(_))), 0);

    cache.acquire_program(&mut state, &p, key).unwrap();
    assert_eq!(created(&state), 2);
}

#[test]
fn test_reflection_exposes_light_struct_members() {
    let mut state = state();
    let mut cache = ProgramCache::new();
    let p = params(&Material::standard(Vec3::ONE, 0.5, 0.0), &two_directional());
    let program = cache
        .acquire_program(&mut state, &p, get_program_cache_key(&p))
        .unwrap();

    assert!(program.has_uniform("directionalLights[1].color"));
    assert!(program.has_uniform("diffuse"));
    assert!(program.has_uniform("roughness"));
    assert!(!program.has_uniform("pointLights[0].color"));
    assert!(program.attributes().iter().any(|a| a.name == "position"));
}

#[test]
fn test_shadow_program_reflects_shadow_uniforms() {
    let mut state = state();
    let mut cache = ProgramCache::new();
    let lights = LightCounts {
        directional: 1,
        directional_shadows: 1,
        point: 1,
        point_shadows: 1,
        ..Default::default()
    };
    let p = params_with_shadows(&Material::new(MaterialKind::Lambert), &lights, &shadows_on());
    let program = cache
        .acquire_program(&mut state, &p, get_program_cache_key(&p))
        .unwrap();

    assert!(program.has_uniform("directionalShadowMap"));
    assert!(program.has_uniform("directionalShadowMatrix"));
    assert!(program.has_uniform("directionalLightShadows[0].shadowBias"));
    assert!(program.has_uniform("pointLightShadows[0].shadowCameraFar"));
}

#[test]
fn test_readiness_follows_driver_latency() {
    let mut device = RecordingDevice::new();
    device.set_compile_latency(2);
    let mut state = GpuState::new(device, false);
    let mut cache = ProgramCache::new();
    let p = params(&Material::basic(Vec3::ONE), &LightCounts::default());
    let program = cache
        .acquire_program(&mut state, &p, get_program_cache_key(&p))
        .unwrap();

    assert!(!cache.is_program_ready(&mut state, &program));
    assert!(!cache.is_program_ready(&mut state, &program));
    assert!(cache.is_program_ready(&mut state, &program));
    assert!(cache.is_program_ready(&mut state, &program));
}
