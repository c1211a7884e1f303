use glam::{UVec2, Vec3, Vec4};

use super::*;
use crate::config::RendererConfig;
use crate::device::{DeviceCommand, DeviceParameters, RecordingDevice};
use crate::scene::{Light, Material, Node};

fn context(parameters: DeviceParameters) -> DrawContext<RecordingDevice> {
    DrawContext::new(
        RecordingDevice::new().with_parameters(parameters),
        RendererConfig::default(),
    )
    .unwrap()
}

fn enabled(shadow_type: ShadowType) -> ShadowMapRenderer {
    ShadowMapRenderer::new(ShadowSettings {
        enabled: true,
        shadow_type,
        ..ShadowSettings::default()
    })
}

struct Fixture {
    scene: Scene,
    light: NodeId,
    mesh: NodeId,
}

fn fixture(light: Light, position: Vec3) -> Fixture {
    let mut scene = Scene::new();
    let geometry = scene.add_geometry(Geometry::cuboid(1.0, 1.0, 1.0));
    let material = scene.add_material(Material::default());
    let mesh = scene.add(Node::mesh(geometry, material).with_shadows(true, false));
    let light = scene.add(
        Node::light(light.with_shadow(LightShadow::default()))
            .with_position(position)
            .with_shadows(true, false),
    );
    Fixture { scene, light, mesh }
}

/// Upload geometry the way the frame sync does.
fn sync(ctx: &mut DrawContext<RecordingDevice>, scene: &mut Scene) {
    scene.update_world_matrices();
    let ids: Vec<GeometryId> = scene
        .nodes()
        .filter_map(|(_, n)| n.as_drawable().map(|d| d.geometry))
        .collect();
    for id in ids {
        if let Some(geometry) = scene.geometry_mut(id) {
            geometry.compute_bounding_sphere();
            ctx.attributes.update_geometry(&mut ctx.state, geometry);
        }
    }
}

fn sources(scene: &Scene) -> Vec<LightSource<'_>> {
    scene
        .nodes()
        .filter_map(|(id, node)| {
            node.as_light().map(|light| LightSource {
                node: id,
                light,
                world: node.world_matrix(),
                cast_shadow: node.cast_shadow,
            })
        })
        .collect()
}

fn frame(
    shadows: &mut ShadowMapRenderer,
    ctx: &mut DrawContext<RecordingDevice>,
    scene: &mut Scene,
) -> (Vec<NodeId>, usize) {
    sync(ctx, scene);
    ctx.state.device_mut().clear_commands();
    let camera = Camera::perspective(50.0, 1.0, 0.1, 100.0);
    let lights = sources(scene);
    let rendered = shadows.render(ctx, scene, &camera, &lights);
    let draws = ctx.state.device().draw_calls().count();
    (rendered, draws)
}

fn light_shadow(scene: &mut Scene, light: NodeId) -> &mut LightShadow {
    scene
        .node_mut(light)
        .and_then(Node::as_light_mut)
        .and_then(|l| l.shadow.as_mut())
        .unwrap()
}

#[test]
fn test_directional_map_is_rendered() {
    let mut ctx = context(DeviceParameters::default());
    let mut shadows = enabled(ShadowType::Pcf);
    let Fixture {
        mut scene, light, ..
    } = fixture(Light::directional(Vec3::ONE, 1.0), Vec3::new(0.0, 10.0, 0.0));

    assert_eq!(shadows.status(light), ShadowStatus::NoMap);
    let (rendered, draws) = frame(&mut shadows, &mut ctx, &mut scene);
    assert_eq!(rendered, vec![light]);
    assert_eq!(draws, 1);
    assert_eq!(shadows.status(light), ShadowStatus::Current);

    let state = shadows.state(light).unwrap();
    assert_eq!((state.map().width(), state.map().height()), (512, 512));
    assert_eq!(state.map().min_filter, Filter::Nearest);
    let binding = shadows.binding(light).unwrap();
    assert_eq!(binding.texture, state.map().texture());

    // The light's target sits in the middle of the map
    let center = binding.matrix * Vec4::new(0.0, 0.0, 0.0, 1.0);
    assert!((center.x / center.w - 0.5).abs() < 1e-4);
    assert!((center.y / center.w - 0.5).abs() < 1e-4);
}

#[test]
fn test_disabled_renders_nothing() {
    let mut ctx = context(DeviceParameters::default());
    let mut shadows = ShadowMapRenderer::default();
    let Fixture {
        mut scene, light, ..
    } = fixture(Light::directional(Vec3::ONE, 1.0), Vec3::new(0.0, 10.0, 0.0));

    let (rendered, draws) = frame(&mut shadows, &mut ctx, &mut scene);
    assert!(rendered.is_empty());
    assert_eq!(draws, 0);
    assert_eq!(shadows.status(light), ShadowStatus::NoMap);
    assert!(shadows.binding(light).is_none());
}

#[test]
fn test_light_without_auto_update_goes_stale() {
    let mut ctx = context(DeviceParameters::default());
    let mut shadows = enabled(ShadowType::Pcf);
    let Fixture {
        mut scene, light, ..
    } = fixture(Light::directional(Vec3::ONE, 1.0), Vec3::new(0.0, 10.0, 0.0));
    light_shadow(&mut scene, light).auto_update = false;

    // A fresh map is always drawn once
    let (_, draws) = frame(&mut shadows, &mut ctx, &mut scene);
    assert_eq!(draws, 1);
    assert_eq!(shadows.status(light), ShadowStatus::Current);

    let (rendered, draws) = frame(&mut shadows, &mut ctx, &mut scene);
    assert!(rendered.is_empty());
    assert_eq!(draws, 0);
    assert_eq!(shadows.status(light), ShadowStatus::Stale);
    assert!(shadows.binding(light).is_some());

    light_shadow(&mut scene, light).needs_update = true;
    let (rendered, draws) = frame(&mut shadows, &mut ctx, &mut scene);
    assert_eq!(rendered, vec![light]);
    assert_eq!(draws, 1);
    assert_eq!(shadows.status(light), ShadowStatus::Current);
}

#[test]
fn test_global_gate_and_one_shot_request() {
    let mut ctx = context(DeviceParameters::default());
    let mut shadows = enabled(ShadowType::Pcf);
    shadows.settings.auto_update = false;
    let Fixture {
        mut scene, light, ..
    } = fixture(Light::directional(Vec3::ONE, 1.0), Vec3::new(0.0, 10.0, 0.0));

    let (_, draws) = frame(&mut shadows, &mut ctx, &mut scene);
    assert_eq!(draws, 0);
    assert_eq!(shadows.status(light), ShadowStatus::NoMap);

    shadows.settings.needs_update = true;
    let (_, draws) = frame(&mut shadows, &mut ctx, &mut scene);
    assert_eq!(draws, 1);
    assert!(!shadows.settings.needs_update);

    let (_, draws) = frame(&mut shadows, &mut ctx, &mut scene);
    assert_eq!(draws, 0);
    assert_eq!(shadows.status(light), ShadowStatus::Stale);
}

#[test]
fn test_non_casters_leave_a_cleared_map() {
    let mut ctx = context(DeviceParameters::default());
    let mut shadows = enabled(ShadowType::Pcf);
    let Fixture {
        mut scene,
        light,
        mesh,
    } = fixture(Light::directional(Vec3::ONE, 1.0), Vec3::new(0.0, 10.0, 0.0));
    scene.node_mut(mesh).unwrap().cast_shadow = false;

    let (rendered, draws) = frame(&mut shadows, &mut ctx, &mut scene);
    assert_eq!(rendered, vec![light]);
    assert_eq!(draws, 0);
    assert!(
        ctx.state
            .device()
            .commands()
            .iter()
            .any(|c| matches!(c, DeviceCommand::Clear { .. }))
    );
    assert_eq!(shadows.status(light), ShadowStatus::Current);
}

#[test]
fn test_casters_outside_the_shadow_frustum_are_culled() {
    let mut ctx = context(DeviceParameters::default());
    let mut shadows = enabled(ShadowType::Pcf);
    let Fixture {
        mut scene, mesh, ..
    } = fixture(Light::directional(Vec3::ONE, 1.0), Vec3::new(0.0, 10.0, 0.0));
    scene.node_mut(mesh).unwrap().position = Vec3::new(50.0, 0.0, 0.0);

    let (_, draws) = frame(&mut shadows, &mut ctx, &mut scene);
    assert_eq!(draws, 0);

    scene.node_mut(mesh).unwrap().frustum_culled = false;
    let (_, draws) = frame(&mut shadows, &mut ctx, &mut scene);
    assert_eq!(draws, 1);
}

#[test]
fn test_point_light_renders_into_the_atlas() {
    let mut ctx = context(DeviceParameters::default());
    let mut shadows = enabled(ShadowType::Pcf);
    let Fixture {
        mut scene, light, ..
    } = fixture(Light::point(Vec3::ONE, 1.0, 0.0), Vec3::new(0.0, 5.0, 0.0));

    let (_, draws) = frame(&mut shadows, &mut ctx, &mut scene);
    let state = shadows.state(light).unwrap();
    assert_eq!((state.map().width(), state.map().height()), (2048, 1024));
    assert_eq!(state.view_size(), UVec2::new(512, 512));

    // Only the -Y face sees the box below the light
    assert_eq!(draws, 1);
    let viewports: Vec<Rect> = ctx
        .state
        .device()
        .commands()
        .iter()
        .filter_map(|c| match c {
            DeviceCommand::Viewport(rect) => Some(*rect),
            _ => None,
        })
        .collect();
    assert!(viewports.contains(&Rect::new(512, 0, 512, 512)));
    assert!(viewports.contains(&Rect::new(1024, 512, 512, 512)));

    // Point maps are sampled in world space around the light
    let binding = shadows.binding(light).unwrap();
    let origin = binding.matrix * Vec4::new(0.0, 5.0, 0.0, 1.0);
    assert!(origin.truncate().length() < 1e-5);
}

#[test]
fn test_oversized_maps_are_clamped() {
    let mut ctx = context(DeviceParameters {
        max_texture_size: 1024,
        ..DeviceParameters::default()
    });
    let mut shadows = enabled(ShadowType::Pcf);
    let Fixture {
        mut scene, light, ..
    } = fixture(Light::point(Vec3::ONE, 1.0, 0.0), Vec3::new(0.0, 5.0, 0.0));
    light_shadow(&mut scene, light).map_size = UVec2::new(1024, 1024);

    frame(&mut shadows, &mut ctx, &mut scene);
    let state = shadows.state(light).unwrap();
    assert_eq!(state.view_size(), UVec2::new(256, 512));
    assert_eq!((state.map().width(), state.map().height()), (1024, 1024));
    assert_eq!(shadows.status(light), ShadowStatus::Current);
}

#[test]
fn test_resized_map_is_reallocated_and_redrawn() {
    let mut ctx = context(DeviceParameters::default());
    let mut shadows = enabled(ShadowType::Pcf);
    let Fixture {
        mut scene, light, ..
    } = fixture(Light::directional(Vec3::ONE, 1.0), Vec3::new(0.0, 10.0, 0.0));
    light_shadow(&mut scene, light).auto_update = false;
    frame(&mut shadows, &mut ctx, &mut scene);

    light_shadow(&mut scene, light).map_size = UVec2::new(256, 256);
    let (rendered, draws) = frame(&mut shadows, &mut ctx, &mut scene);
    assert_eq!(rendered, vec![light]);
    assert_eq!(draws, 1);
    assert_eq!(shadows.state(light).unwrap().map().width(), 256);
}

#[test]
fn test_state_is_dropped_when_light_stops_casting() {
    let mut ctx = context(DeviceParameters::default());
    let mut shadows = enabled(ShadowType::Pcf);
    let Fixture {
        mut scene, light, ..
    } = fixture(Light::directional(Vec3::ONE, 1.0), Vec3::new(0.0, 10.0, 0.0));
    frame(&mut shadows, &mut ctx, &mut scene);
    assert_eq!(shadows.len(), 1);

    scene.node_mut(light).unwrap().cast_shadow = false;
    frame(&mut shadows, &mut ctx, &mut scene);
    assert!(shadows.is_empty());
    assert_eq!(shadows.status(light), ShadowStatus::NoMap);
}

#[test]
fn test_variance_maps_are_blurred() {
    let mut ctx = context(DeviceParameters::default());
    let mut shadows = enabled(ShadowType::Vsm);
    let Fixture {
        mut scene, light, ..
    } = fixture(Light::spot(Vec3::ONE, 1.0, 0.6), Vec3::new(0.0, 10.0, 0.0));

    let (_, draws) = frame(&mut shadows, &mut ctx, &mut scene);
    // One caster plus the vertical and horizontal blur passes
    assert_eq!(draws, 3);
    let state = shadows.state(light).unwrap();
    assert_eq!(state.map().data_type, PixelType::HalfFloat);
    assert_eq!(state.map().internal_format, InternalFormat::Rgba16F);
}

#[test]
fn test_variance_without_half_float_falls_back_to_bytes() {
    let device = RecordingDevice::new().with_extensions(Vec::<String>::new());
    let mut ctx = DrawContext::new(device, RendererConfig::default()).unwrap();
    let mut shadows = enabled(ShadowType::Vsm);
    let Fixture {
        mut scene, light, ..
    } = fixture(Light::directional(Vec3::ONE, 1.0), Vec3::new(0.0, 10.0, 0.0));

    frame(&mut shadows, &mut ctx, &mut scene);
    let state = shadows.state(light).unwrap();
    assert_eq!(state.map().data_type, PixelType::UnsignedByte);
}

#[test]
fn test_shared_override_program_across_casters() {
    let mut ctx = context(DeviceParameters::default());
    let mut shadows = enabled(ShadowType::Pcf);
    let Fixture {
        mut scene, light, ..
    } = fixture(Light::directional(Vec3::ONE, 1.0), Vec3::new(0.0, 10.0, 0.0));
    let geometry = scene.add_geometry(Geometry::cuboid(1.0, 1.0, 1.0));
    let material = scene.add_material(Material::standard(Vec3::ONE, 0.5, 0.0));
    scene.add(
        Node::mesh(geometry, material)
            .with_position(Vec3::new(2.0, 0.0, 0.0))
            .with_shadows(true, false),
    );

    let (_, draws) = frame(&mut shadows, &mut ctx, &mut scene);
    assert_eq!(draws, 2);
    assert_eq!(ctx.programs.len(), 1);
    assert_eq!(shadows.status(light), ShadowStatus::Current);
}

#[test]
fn test_spot_camera_follows_angle_and_focus() {
    let light = Light::spot(Vec3::ONE, 1.0, std::f32::consts::FRAC_PI_6);
    let mut shadow = LightShadow::default();
    shadow.camera.focus = 0.5;
    let world = Mat4::from_translation(Vec3::new(0.0, 0.0, 10.0));
    let view = shadow_view(&light.kind, &shadow, &world, UVec2::new(512, 256), 0, false).unwrap();
    // fov = 2 * 30° * 0.5
    let projection = view.camera.projection_matrix();
    let expected = 1.0 / (15.0_f32.to_radians()).tan();
    assert!((projection.y_axis.y - expected).abs() < 1e-4);
    // aspect follows the map
    assert!((projection.x_axis.x * 2.0 - projection.y_axis.y).abs() < 1e-4);
}

#[test]
fn test_reversed_depth_matrix_keeps_unit_depth_range() {
    let light = Light::directional(Vec3::ONE, 1.0);
    let shadow = LightShadow::default();
    let world = Mat4::from_translation(Vec3::new(0.0, 10.0, 0.0));
    let normal = shadow_view(&light.kind, &shadow, &world, UVec2::splat(512), 0, false).unwrap();
    let reversed = shadow_view(&light.kind, &shadow, &world, UVec2::splat(512), 0, true).unwrap();

    let point = Vec4::new(0.0, 0.0, 0.0, 1.0);
    let near_depth = |m: Mat4| {
        let p = m * point;
        p.z / p.w
    };
    let (n, r) = (near_depth(normal.matrix), near_depth(reversed.matrix));
    assert!((0.0..=1.0).contains(&n));
    assert!((0.0..=1.0).contains(&r));
    assert!((n + r - 1.0).abs() < 1e-3);
}

#[test]
fn test_non_shadow_kinds_have_no_view() {
    let light = Light::ambient(Vec3::ONE, 1.0);
    let view = shadow_view(
        &light.kind,
        &LightShadow::default(),
        &Mat4::IDENTITY,
        UVec2::splat(512),
        0,
        false,
    );
    assert!(view.is_none());
    assert_eq!(view_count(&Light::point(Vec3::ONE, 1.0, 0.0).kind), 6);
    assert_eq!(frame_extents(&light.kind), UVec2::ONE);
}
