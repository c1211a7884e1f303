//! Shadow-map passes as seen through the renderer.

use glam::Vec3;
use nether_render::config::ShadowSettings;
use nether_render::device::{DeviceCommand, RecordingDevice};
use nether_render::scene::{Geometry, Light, LightShadow, Node};
use nether_render::shadow::ShadowStatus;
use nether_render::{Camera, Material, NodeId, Renderer, RendererConfig, Scene, ShadowType};

fn renderer(shadow_type: ShadowType, enabled: bool) -> Renderer<RecordingDevice> {
    let config = RendererConfig {
        shadows: ShadowSettings {
            enabled,
            shadow_type,
            ..ShadowSettings::default()
        },
        ..RendererConfig::default()
    };
    Renderer::new(RecordingDevice::new(), config).unwrap()
}

fn camera() -> Camera {
    Camera::perspective(60.0, 4.0 / 3.0, 0.1, 100.0)
        .with_position(Vec3::new(0.0, 2.0, 6.0), Vec3::ZERO)
}

/// One caster above a receiving floor, lit by `light`.
fn scene(light: Light, cast: bool) -> (Scene, NodeId) {
    let mut scene = Scene::new();
    let cube = scene.add_geometry(Geometry::cuboid(1.0, 1.0, 1.0));
    let slab = scene.add_geometry(Geometry::cuboid(10.0, 0.1, 10.0));
    let material = scene.add_material(Material::standard(Vec3::ONE, 0.5, 0.0));
    scene.add(Node::mesh(cube, material).with_shadows(true, false));
    scene.add(
        Node::mesh(slab, material)
            .with_position(Vec3::new(0.0, -1.0, 0.0))
            .with_shadows(false, true),
    );
    let light = scene.add(
        Node::light(light.with_shadow(LightShadow::default()))
            .with_position(Vec3::new(2.0, 8.0, 2.0))
            .with_shadows(cast, false),
    );
    (scene, light)
}

fn offscreen_draws(renderer: &Renderer<RecordingDevice>) -> usize {
    renderer
        .device()
        .draw_calls()
        .filter(|c| matches!(c, DeviceCommand::Draw { framebuffer: Some(_), .. }))
        .count()
}

#[test]
fn test_directional_shadow_pass_draws_casters_only() {
    let mut renderer = renderer(ShadowType::Pcf, true);
    let (mut scene, light) = scene(Light::directional(Vec3::ONE, 1.0), true);
    renderer.render(&mut scene, &camera()).unwrap();

    assert_eq!(renderer.shadow_map().status(light), ShadowStatus::Current);
    assert_eq!(renderer.shadow_map().len(), 1);
    assert_eq!(offscreen_draws(&renderer), 1);
    assert_eq!(renderer.info().calls, 3);
}

#[test]
fn test_shadow_maps_follow_auto_update() {
    let mut renderer = renderer(ShadowType::Pcf, true);
    let (mut scene, _) = scene(Light::directional(Vec3::ONE, 1.0), true);
    renderer.render(&mut scene, &camera()).unwrap();
    renderer.device_mut().clear_commands();
    renderer.render(&mut scene, &camera()).unwrap();
    assert_eq!(offscreen_draws(&renderer), 1);

    renderer.shadow_map_mut().settings.auto_update = false;
    renderer.device_mut().clear_commands();
    renderer.render(&mut scene, &camera()).unwrap();
    assert_eq!(offscreen_draws(&renderer), 0);

    renderer.shadow_map_mut().settings.needs_update = true;
    renderer.device_mut().clear_commands();
    renderer.render(&mut scene, &camera()).unwrap();
    assert_eq!(offscreen_draws(&renderer), 1);
    assert!(!renderer.shadow_map().settings.needs_update);
}

#[test]
fn test_disabled_shadows_allocate_nothing() {
    let mut renderer = renderer(ShadowType::Pcf, false);
    let (mut scene, light) = scene(Light::directional(Vec3::ONE, 1.0), true);
    renderer.render(&mut scene, &camera()).unwrap();

    assert_eq!(renderer.shadow_map().status(light), ShadowStatus::NoMap);
    assert!(renderer.shadow_map().is_empty());
    assert_eq!(offscreen_draws(&renderer), 0);
    assert_eq!(renderer.info().calls, 2);
}

#[test]
fn test_light_that_does_not_cast_gets_no_map() {
    let mut renderer = renderer(ShadowType::Pcf, true);
    let (mut scene, light) = scene(Light::spot(Vec3::ONE, 1.0, 0.6), false);
    renderer.render(&mut scene, &camera()).unwrap();

    assert_eq!(renderer.shadow_map().status(light), ShadowStatus::NoMap);
    assert_eq!(offscreen_draws(&renderer), 0);
}

#[test]
fn test_vsm_blurs_after_the_depth_pass() {
    let mut pcf = renderer(ShadowType::Pcf, true);
    let mut vsm = renderer(ShadowType::Vsm, true);
    let (mut scene, light) = scene(Light::directional(Vec3::ONE, 1.0), true);
    pcf.render(&mut scene, &camera()).unwrap();
    vsm.render(&mut scene, &camera()).unwrap();

    assert_eq!(vsm.shadow_map().status(light), ShadowStatus::Current);
    // Variance maps also take the receiving floor, then two separable blur
    // passes run on top of the depth pass
    assert_eq!(offscreen_draws(&vsm), offscreen_draws(&pcf) + 1 + 2);
}

#[test]
fn test_changing_shadow_type_rebuilds_lit_programs() {
    let mut renderer = renderer(ShadowType::Pcf, true);
    let (mut scene, _) = scene(Light::directional(Vec3::ONE, 1.0), true);
    renderer.render(&mut scene, &camera()).unwrap();

    let lit_programs_built = |renderer: &Renderer<RecordingDevice>| {
        renderer.device().count(|c| {
            matches!(c, DeviceCommand::CreateProgram { name, .. } if name == "MeshStandardMaterial")
        })
    };

    renderer.shadow_map_mut().settings.shadow_type = ShadowType::Vsm;
    renderer.device_mut().clear_commands();
    renderer.render(&mut scene, &camera()).unwrap();
    assert!(lit_programs_built(&renderer) > 0);

    // Switching back reuses the programs built for the first frame
    renderer.shadow_map_mut().settings.shadow_type = ShadowType::Pcf;
    renderer.device_mut().clear_commands();
    renderer.render(&mut scene, &camera()).unwrap();
    assert_eq!(lit_programs_built(&renderer), 0);
}
