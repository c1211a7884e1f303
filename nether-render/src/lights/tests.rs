//! Tests for the light collector

use glam::{Mat4, Vec3};

use super::*;
use crate::scene::{Camera, Light, LightShadow, NodeId};

fn source(node: u32, light: &Light, position: Vec3, cast_shadow: bool) -> LightSource<'_> {
    LightSource {
        node: NodeId(node),
        light,
        world: Mat4::from_translation(position),
        cast_shadow,
    }
}

fn camera() -> Camera {
    Camera::perspective(50f32.to_radians(), 1.0, 0.1, 100.0)
}

fn value<'a>(state: &'a LightsState, name: &str) -> Option<&'a UniformValue> {
    state
        .uniforms()
        .iter()
        .find(|(n, _)| n == name)
        .map(|(_, v)| v)
}

#[test]
fn test_ambient_lights_accumulate() {
    let a = Light::ambient(Vec3::new(1.0, 0.0, 0.0), 0.5);
    let b = Light::ambient(Vec3::new(0.0, 1.0, 0.0), 1.0);
    let mut lights = LightsState::new();
    lights.setup(&[source(0, &a, Vec3::ZERO, false), source(1, &b, Vec3::ZERO, false)]);
    lights.setup_view(&camera());

    assert_eq!(
        value(&lights, "ambientLightColor"),
        Some(&UniformValue::Vec3(Vec3::new(0.5, 1.0, 0.0)))
    );
    assert_eq!(lights.counts().total(), 0);
}

#[test]
fn test_value_change_keeps_structure_version() {
    let mut light = Light::point(Vec3::ONE, 1.0, 10.0);
    let mut lights = LightsState::new();
    lights.setup(&[source(0, &light, Vec3::ZERO, false)]);
    let first = lights.version();

    light.intensity = 3.0;
    light.color = Vec3::new(1.0, 0.5, 0.0);
    lights.setup(&[source(0, &light, Vec3::ZERO, false)]);
    let second = lights.version();

    assert_eq!(first.structure, second.structure);
    assert!(second.values > first.values);
}

#[test]
fn test_same_lights_keep_both_versions() {
    let light = Light::directional(Vec3::ONE, 1.0);
    let mut lights = LightsState::new();
    lights.setup(&[source(0, &light, Vec3::Y, false)]);
    let first = lights.version();
    lights.setup(&[source(0, &light, Vec3::Y, false)]);
    assert_eq!(lights.version(), first);
}

#[test]
fn test_adding_or_removing_light_changes_structure() {
    let a = Light::point(Vec3::ONE, 1.0, 0.0);
    let b = Light::spot(Vec3::ONE, 1.0, 0.5);
    let mut lights = LightsState::new();
    lights.setup(&[source(0, &a, Vec3::ZERO, false)]);
    let one = lights.version();

    lights.setup(&[source(0, &a, Vec3::ZERO, false), source(1, &b, Vec3::ZERO, false)]);
    let two = lights.version();
    assert!(two.structure > one.structure);

    lights.setup(&[source(0, &a, Vec3::ZERO, false)]);
    assert!(lights.version().structure > two.structure);
}

#[test]
fn test_toggling_shadow_changes_structure() {
    let light = Light::directional(Vec3::ONE, 1.0).with_shadow(LightShadow::default());
    let mut lights = LightsState::new();
    lights.setup(&[source(0, &light, Vec3::Y, false)]);
    let before = lights.version();
    lights.setup(&[source(0, &light, Vec3::Y, true)]);

    assert!(lights.version().structure > before.structure);
    assert_eq!(lights.counts().directional_shadows, 1);
}

#[test]
fn test_shadow_casters_sort_first() {
    let plain = Light::directional(Vec3::new(1.0, 0.0, 0.0), 1.0);
    let shadowed =
        Light::directional(Vec3::new(0.0, 1.0, 0.0), 1.0).with_shadow(LightShadow::default());
    let mut lights = LightsState::new();
    lights.setup(&[
        source(0, &plain, Vec3::Y, false),
        source(1, &shadowed, Vec3::Y, true),
    ]);
    lights.setup_view(&camera());

    assert_eq!(
        value(&lights, "directionalLights[0].color"),
        Some(&UniformValue::Vec3(Vec3::new(0.0, 1.0, 0.0)))
    );
}

#[test]
fn test_directions_are_in_view_space() {
    let light = Light::directional(Vec3::ONE, 1.0);
    let mut lights = LightsState::new();
    // Light on +X shining towards the origin
    lights.setup(&[source(0, &light, Vec3::new(10.0, 0.0, 0.0), false)]);

    // Camera on +X looking at the origin: world +X is view +Z
    let camera = camera().with_position(Vec3::new(5.0, 0.0, 0.0), Vec3::ZERO);
    lights.setup_view(&camera);

    let Some(UniformValue::Vec3(direction)) = value(&lights, "directionalLights[0].direction")
    else {
        panic!("direction missing");
    };
    assert!(direction.abs_diff_eq(Vec3::Z, 1e-4), "{:?}", direction);
}

#[test]
fn test_spot_cone_cosines() {
    let mut light = Light::spot(Vec3::ONE, 1.0, std::f32::consts::FRAC_PI_3);
    if let LightKind::Spot { penumbra, .. } = &mut light.kind {
        *penumbra = 0.5;
    }
    let mut lights = LightsState::new();
    lights.setup(&[source(0, &light, Vec3::Y, false)]);
    lights.setup_view(&camera());

    let cone = value(&lights, "spotLights[0].coneCos");
    let penumbra = value(&lights, "spotLights[0].penumbraCos");
    assert!(matches!(cone, Some(UniformValue::Float(c)) if (c - 0.5).abs() < 1e-5));
    let expected = (std::f32::consts::FRAC_PI_6).cos();
    assert!(matches!(penumbra, Some(UniformValue::Float(c)) if (c - expected).abs() < 1e-5));
}

#[test]
fn test_shadow_maps_bind_by_node() {
    let light = Light::point(Vec3::ONE, 1.0, 0.0).with_shadow(LightShadow::default());
    let mut lights = LightsState::new();
    lights.setup(&[source(4, &light, Vec3::ZERO, true)]);
    let texture = TextureId(99);
    lights.apply_shadows(|node| {
        (node == NodeId(4)).then_some(ShadowBinding {
            texture,
            matrix: Mat4::IDENTITY,
        })
    });
    lights.setup_view(&camera());

    assert_eq!(
        value(&lights, "pointShadowMap"),
        Some(&UniformValue::TextureArray(vec![Some(texture)]))
    );
    assert!(value(&lights, "pointLightShadows[0].shadowCameraFar").is_some());
}

#[test]
fn test_reset_moves_version_forward() {
    let light = Light::point(Vec3::ONE, 1.0, 0.0);
    let mut lights = LightsState::new();
    lights.setup(&[source(0, &light, Vec3::ZERO, false)]);
    let before = lights.version();
    lights.reset();
    assert!(lights.version().structure > before.structure);
    assert_eq!(lights.counts(), LightCounts::default());
}
