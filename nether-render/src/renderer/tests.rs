use glam::Vec3;

use super::*;
use crate::config::ShadowSettings;
use crate::device::{DeviceCommand, DrawMode, PixelFormat, PixelType, RecordingDevice};
use crate::scene::{
    Background, Geometry, Layers, Light, LightShadow, Material, Node, NodeId, Primitive, Side,
};

fn renderer() -> Renderer<RecordingDevice> {
    Renderer::new(RecordingDevice::new(), RendererConfig::default()).unwrap()
}

fn camera() -> Camera {
    Camera::perspective(60.0, 1.0, 0.1, 100.0)
}

/// Scene with one unit cube per material, spread along -Z.
fn scene_with(materials: Vec<Material>) -> (Scene, Vec<NodeId>) {
    let mut scene = Scene::new();
    let geometry = scene.add_geometry(Geometry::cuboid(1.0, 1.0, 1.0));
    let nodes = materials
        .into_iter()
        .enumerate()
        .map(|(i, material)| {
            let material = scene.add_material(material);
            scene.add(
                Node::mesh(geometry, material).with_position(Vec3::new(0.0, 0.0, -3.0 - i as f32)),
            )
        })
        .collect();
    (scene, nodes)
}

fn draws(renderer: &Renderer<RecordingDevice>) -> Vec<DeviceCommand> {
    renderer.device().draw_calls().cloned().collect()
}

#[test]
fn test_render_draws_every_visible_mesh() {
    let mut renderer = renderer();
    let (mut scene, _) = scene_with(vec![Material::default(), Material::default()]);
    renderer.render(&mut scene, &camera()).unwrap();

    let info = renderer.info();
    assert_eq!(info.frame, 1);
    assert_eq!(info.calls, 2);
    assert_eq!(info.triangles, 24);
    assert_eq!(info.geometries, 1);
    assert_eq!(info.programs, 1);
    assert!(renderer.device().errors().is_empty());
}

#[test]
fn test_frame_counters_reset_each_frame() {
    let mut renderer = renderer();
    let (mut scene, _) = scene_with(vec![Material::default()]);
    renderer.render(&mut scene, &camera()).unwrap();
    renderer.render(&mut scene, &camera()).unwrap();
    let info = renderer.info();
    assert_eq!(info.frame, 2);
    assert_eq!(info.calls, 1);
}

#[test]
fn test_culling_layers_and_visibility() {
    let mut renderer = renderer();
    let (mut scene, nodes) = scene_with(vec![
        Material::default(),
        Material::default(),
        Material::default(),
        Material::default(),
    ]);
    // Behind the camera
    scene.node_mut(nodes[0]).unwrap().position = Vec3::new(0.0, 0.0, 10.0);
    // Hidden node
    scene.node_mut(nodes[1]).unwrap().visible = false;
    // Layer the camera does not see
    scene.node_mut(nodes[2]).unwrap().layers = Layers(2);

    renderer.render(&mut scene, &camera()).unwrap();
    assert_eq!(renderer.info().calls, 1);

    // Culling can be turned off per node
    scene.node_mut(nodes[0]).unwrap().frustum_culled = false;
    renderer.render(&mut scene, &camera()).unwrap();
    assert_eq!(renderer.info().calls, 2);
}

#[test]
fn test_invisible_material_is_not_pushed() {
    let mut renderer = renderer();
    let mut hidden = Material::default();
    hidden.visible = false;
    let (mut scene, _) = scene_with(vec![hidden, Material::default()]);
    renderer.render(&mut scene, &camera()).unwrap();
    assert_eq!(renderer.render_list.len(), 1);
}

#[test]
fn test_opaque_pass_precedes_transparent_pass() {
    let mut renderer = renderer();
    let mut scene = Scene::new();
    let geometry = scene.add_geometry(Geometry::cuboid(1.0, 1.0, 1.0));
    let glass = scene.add_material(Material::basic(Vec3::ONE).with_transparency(0.5));
    let solid = scene.add_material(Material::default());
    // Declared first, drawn last
    scene.add(Node::points(geometry, glass).with_position(Vec3::new(0.0, 0.0, -2.0)));
    scene.add(Node::mesh(geometry, solid).with_position(Vec3::new(0.0, 0.0, -5.0)));

    renderer.render(&mut scene, &camera()).unwrap();
    let modes: Vec<DrawMode> = draws(&renderer)
        .into_iter()
        .filter_map(|c| match c {
            DeviceCommand::Draw { mode, .. } => Some(mode),
            _ => None,
        })
        .collect();
    assert_eq!(modes, vec![DrawMode::Triangles, DrawMode::Points]);
}

#[test]
fn test_transparent_items_sort_back_to_front() {
    let mut renderer = renderer();
    let (mut scene, nodes) = scene_with(vec![
        Material::default().with_transparency(0.5),
        Material::default().with_transparency(0.5),
        Material::default().with_transparency(0.5),
    ]);
    renderer.render(&mut scene, &camera()).unwrap();
    let order: Vec<NodeId> = renderer.render_list.transparent().map(|i| i.node).collect();
    assert_eq!(order, vec![nodes[2], nodes[1], nodes[0]]);
}

#[test]
fn test_opaque_sort_can_be_disabled() {
    let mut renderer = renderer();
    renderer.set_opaque_sort(None);
    let (mut scene, nodes) = scene_with(vec![
        Material::standard(Vec3::ONE, 0.5, 0.0),
        Material::default(),
        Material::standard(Vec3::ONE, 0.5, 0.0),
    ]);
    renderer.render(&mut scene, &camera()).unwrap();
    let order: Vec<NodeId> = renderer.render_list.opaque().map(|i| i.node).collect();
    assert_eq!(order, nodes);
}

#[test]
fn test_double_sided_transparent_draws_back_then_front() {
    let mut renderer = renderer();
    let mut material = Material::default().with_transparency(0.5);
    material.side = Side::Double;
    let (mut scene, _) = scene_with(vec![material]);
    renderer.render(&mut scene, &camera()).unwrap();
    assert_eq!(renderer.info().calls, 2);
}

#[test]
fn test_group_render_order_is_inherited() {
    let mut renderer = renderer();
    let mut scene = Scene::new();
    let geometry = scene.add_geometry(Geometry::cuboid(1.0, 1.0, 1.0));
    let material = scene.add_material(Material::default());
    let group = scene.add(Node::group().with_render_order(7));
    let child = scene.add_child(
        group,
        Node::mesh(geometry, material).with_position(Vec3::new(0.0, 0.0, -4.0)),
    );
    renderer.render(&mut scene, &camera()).unwrap();
    let item = renderer.render_list.opaque().next().copied().unwrap();
    assert_eq!(item.node, child);
    assert_eq!(item.group_order, 7);
}

#[test]
fn test_per_group_materials_push_one_item_per_group() {
    let mut renderer = renderer();
    let mut scene = Scene::new();
    let mut geometry = Geometry::cuboid(1.0, 1.0, 1.0);
    geometry.add_group(0, 18, 0);
    geometry.add_group(18, 18, 1);
    let geometry = scene.add_geometry(geometry);
    let a = scene.add_material(Material::default());
    let b = scene.add_material(Material::standard(Vec3::ONE, 0.5, 0.0));
    scene.add(
        Node::multi_material_mesh(geometry, vec![a, b]).with_position(Vec3::new(0.0, 0.0, -4.0)),
    );
    renderer.render(&mut scene, &camera()).unwrap();
    assert_eq!(renderer.render_list.len(), 2);
    assert_eq!(renderer.info().triangles, 12);
}

#[test]
fn test_override_material_replaces_item_materials() {
    let mut renderer = renderer();
    let (mut scene, _) = scene_with(vec![
        Material::standard(Vec3::ONE, 0.5, 0.0),
        Material::default(),
    ]);
    scene.override_material = Some(scene.add_material(Material::basic(Vec3::X)));
    renderer.render(&mut scene, &camera()).unwrap();
    let programs: Vec<_> = draws(&renderer)
        .into_iter()
        .filter_map(|c| match c {
            DeviceCommand::Draw { program, .. } => program,
            _ => None,
        })
        .collect();
    assert_eq!(programs.len(), 2);
    assert_eq!(programs[0], programs[1]);
    assert_eq!(renderer.info().programs, 1);
}

#[test]
fn test_background_forces_a_colour_clear() {
    let mut renderer = renderer();
    renderer.core.config.render.auto_clear = false;
    let (mut scene, _) = scene_with(vec![]);

    renderer.render(&mut scene, &camera()).unwrap();
    assert_eq!(
        renderer
            .device()
            .count(|c| matches!(c, DeviceCommand::Clear { .. })),
        0
    );

    scene.background = Some(Background::Color(Vec3::new(1.0, 0.0, 0.0)));
    renderer.render(&mut scene, &camera()).unwrap();
    let commands = renderer.device().commands();
    assert!(commands.contains(&DeviceCommand::ClearColor([1.0, 0.0, 0.0, 1.0])));
    assert!(commands.iter().any(|c| matches!(
        c,
        DeviceCommand::Clear { mask, .. } if mask.contains(ClearMask::COLOR)
    )));
}

#[test]
fn test_clear_color_is_premultiplied() {
    let mut renderer = renderer();
    renderer.set_clear_color(Vec3::new(1.0, 0.5, 0.0), 0.5);
    renderer.clear(ClearMask::COLOR);
    assert!(
        renderer
            .device()
            .commands()
            .contains(&DeviceCommand::ClearColor([0.5, 0.25, 0.0, 0.5]))
    );
}

#[test]
fn test_transmissive_objects_trigger_the_capture_pass() {
    let mut renderer = renderer();
    let mut glass = Material::standard(Vec3::ONE, 0.1, 0.0);
    glass.transmission = 1.0;
    let (mut scene, _) = scene_with(vec![Material::default(), glass]);
    renderer.render(&mut scene, &camera()).unwrap();

    // Opaque twice (capture + screen), transmissive once
    assert_eq!(renderer.info().calls, 3);
    let offscreen = renderer.device().count(|c| {
        matches!(c, DeviceCommand::Draw { framebuffer, .. } if framebuffer.is_some())
    });
    assert_eq!(offscreen, 1);
    let target = renderer.transmission_target.as_ref().unwrap();
    assert_eq!((target.width(), target.height()), (800, 600));
    assert!(target.generate_mipmaps);
    assert_eq!(target.data_type, PixelType::HalfFloat);
    // The capture is only sampled during the frame it was made in
    assert!(renderer.core.transmission.is_none());
}

#[test]
fn test_transmission_pass_adds_back_faces_of_double_sided() {
    let mut renderer = renderer();
    let mut glass = Material::standard(Vec3::ONE, 0.1, 0.0);
    glass.transmission = 1.0;
    glass.side = Side::Double;
    let (mut scene, _) = scene_with(vec![glass]);
    renderer.render(&mut scene, &camera()).unwrap();
    assert_eq!(renderer.info().calls, 2);
}

#[test]
fn test_viewport_follows_pixel_ratio() {
    let mut renderer = renderer();
    renderer.set_size(200, 100);
    renderer.set_pixel_ratio(2.0);
    assert_eq!(renderer.drawing_buffer_size(), (400, 200));
    assert_eq!(
        renderer.device().commands().last(),
        Some(&DeviceCommand::Viewport(Rect::new(0, 0, 400, 200)))
    );
}

#[test]
fn test_read_render_target_pixels() {
    let mut renderer = renderer();
    let target = RenderTarget::new(4, 4);
    renderer.set_render_target(Some(&target), 0, 0).unwrap();
    renderer.set_clear_color(Vec3::new(0.0, 1.0, 0.0), 1.0);
    let (mut scene, _) = scene_with(vec![]);
    renderer.render(&mut scene, &camera()).unwrap();

    let mut out = vec![0u8; 2 * 2 * 4];
    renderer
        .read_render_target_pixels(
            &target,
            0,
            Rect::new(1, 1, 2, 2),
            PixelFormat::Rgba,
            PixelType::UnsignedByte,
            &mut out,
        )
        .unwrap();
    assert_eq!(&out[..4], &[0, 255, 0, 255]);
}

#[test]
fn test_readback_validation() {
    let mut renderer = renderer();
    let target = RenderTarget::new(4, 4);
    let mut out = vec![0u8; 64];
    let mut read = |renderer: &mut Renderer<RecordingDevice>, rect, data_type| {
        renderer.read_render_target_pixels(
            &target,
            0,
            rect,
            PixelFormat::Rgba,
            data_type,
            &mut out,
        )
    };

    assert!(matches!(
        read(&mut renderer, Rect::new(0, 0, 4, 4), PixelType::UnsignedByte),
        Err(RenderError::InvalidRenderTarget(_))
    ));
    renderer.set_render_target(Some(&target), 0, 0).unwrap();
    assert!(matches!(
        read(&mut renderer, Rect::new(0, 0, 4, 4), PixelType::Float),
        Err(RenderError::UnreadablePixels { .. })
    ));
    assert!(matches!(
        read(&mut renderer, Rect::new(2, 2, 4, 4), PixelType::UnsignedByte),
        Err(RenderError::ReadbackOutOfBounds { .. })
    ));
    assert!(matches!(
        read(&mut renderer, Rect::new(-1, 0, 1, 1), PixelType::UnsignedByte),
        Err(RenderError::ReadbackOutOfBounds { .. })
    ));
    let mut short = vec![0u8; 8];
    assert!(matches!(
        renderer.read_render_target_pixels(
            &target,
            0,
            Rect::new(0, 0, 2, 2),
            PixelFormat::Rgba,
            PixelType::UnsignedByte,
            &mut short,
        ),
        Err(RenderError::ReadbackBufferTooSmall { needed: 16, got: 8 })
    ));
}

#[test]
fn test_readback_picks_the_cube_face() {
    let mut renderer = renderer();
    let target = RenderTarget::cube(4);
    renderer.set_render_target(Some(&target), 2, 0).unwrap();
    renderer.set_clear_color(Vec3::new(0.0, 0.0, 1.0), 1.0);
    renderer.clear(ClearMask::COLOR);

    let mut read = |face| {
        let mut out = vec![0u8; 4];
        renderer
            .read_render_target_pixels(
                &target,
                face,
                Rect::new(0, 0, 1, 1),
                PixelFormat::Rgba,
                PixelType::UnsignedByte,
                &mut out,
            )
            .map(|_| out)
    };
    assert_eq!(read(2).unwrap(), vec![0, 0, 255, 255]);
    assert_eq!(read(0).unwrap(), vec![0, 0, 0, 0]);
    assert!(matches!(read(6), Err(RenderError::InvalidRenderTarget(_))));
}

#[test]
fn test_async_readback_waits_for_the_fence() {
    let mut renderer = renderer();
    renderer.device_mut().set_fence_latency(3);
    let target = RenderTarget::new(2, 2);
    renderer.set_render_target(Some(&target), 0, 0).unwrap();
    renderer.clear(ClearMask::COLOR);

    let mut out = vec![0u8; 16];
    pollster::block_on(renderer.read_render_target_pixels_async(
        &target,
        0,
        Rect::new(0, 0, 2, 2),
        PixelFormat::Rgba,
        PixelType::UnsignedByte,
        &mut out,
    ))
    .unwrap();

    let commands = renderer.device().commands();
    let fence = commands
        .iter()
        .position(|c| matches!(c, DeviceCommand::FenceSync(_)))
        .unwrap();
    let read = commands
        .iter()
        .position(|c| matches!(c, DeviceCommand::ReadPixels { .. }))
        .unwrap();
    assert!(fence < read);
    assert_eq!(
        renderer
            .device()
            .count(|c| matches!(c, DeviceCommand::DeleteFence(_))),
        1
    );
}

#[test]
fn test_compile_async_resolves_when_programs_are_ready() {
    let mut renderer = renderer();
    renderer.device_mut().set_compile_latency(4);
    let (mut scene, _) = scene_with(vec![
        Material::default(),
        Material::standard(Vec3::ONE, 0.5, 0.0),
    ]);
    pollster::block_on(renderer.compile_async(&mut scene, &camera()));
    assert_eq!(renderer.info().programs, 2);
    assert_eq!(renderer.device().draw_calls().count(), 0);
}

#[test]
fn test_dispose_material_releases_unshared_programs() {
    let mut renderer = renderer();
    let (mut scene, nodes) = scene_with(vec![
        Material::default(),
        Material::standard(Vec3::ONE, 0.5, 0.0),
    ]);
    renderer.render(&mut scene, &camera()).unwrap();
    assert_eq!(renderer.info().programs, 2);

    let standard = scene.node(nodes[1]).unwrap().as_drawable().unwrap().materials.ids()[0];
    scene.remove(nodes[1]);
    renderer.dispose_material(standard);
    assert_eq!(renderer.info().programs, 1);
    assert_eq!(renderer.device().live_programs(), 1);
}

#[test]
fn test_prune_releases_buffers_of_removed_geometry() {
    let mut renderer = renderer();
    let (mut scene, nodes) = scene_with(vec![Material::default()]);
    renderer.render(&mut scene, &camera()).unwrap();
    assert_eq!(renderer.info().geometries, 1);

    let geometry = scene.node(nodes[0]).unwrap().as_drawable().unwrap().geometry;
    scene.remove(nodes[0]);
    scene.remove_geometry(geometry);
    renderer.prune(&scene);
    assert_eq!(renderer.info().geometries, 0);
}

#[test]
fn test_context_loss_skips_frames_and_restore_rebuilds() {
    let mut renderer = renderer();
    let (mut scene, _) = scene_with(vec![Material::default()]);
    renderer.render(&mut scene, &camera()).unwrap();

    assert!(renderer.force_context_loss());
    assert!(renderer.is_context_lost());
    assert!(matches!(
        renderer.render(&mut scene, &camera()),
        Err(RenderError::ContextLost)
    ));

    assert!(renderer.force_context_restore().unwrap());
    renderer.device_mut().clear_commands();
    renderer.render(&mut scene, &camera()).unwrap();
    assert_eq!(renderer.info().calls, 1);
    assert_eq!(renderer.info().programs, 1);
    assert!(renderer.device().errors().is_empty());
}

#[test]
fn test_context_restored_by_the_driver_is_noticed_on_render() {
    let mut renderer = renderer();
    let (mut scene, _) = scene_with(vec![Material::default()]);
    renderer.render(&mut scene, &camera()).unwrap();

    renderer.device_mut().lose_context();
    assert!(renderer.render(&mut scene, &camera()).is_err());
    renderer.device_mut().restore_context();
    renderer.render(&mut scene, &camera()).unwrap();
    assert!(!renderer.is_context_lost());
    assert_eq!(renderer.info().calls, 1);
    assert!(renderer.device().errors().is_empty());
}

#[test]
fn test_one_shot_shadow_request_is_consumed() {
    let config = RendererConfig {
        shadows: ShadowSettings {
            enabled: true,
            ..ShadowSettings::default()
        },
        ..RendererConfig::default()
    };
    let mut renderer = Renderer::new(RecordingDevice::new(), config).unwrap();
    let (mut scene, nodes) = scene_with(vec![Material::default()]);
    scene.node_mut(nodes[0]).unwrap().cast_shadow = true;
    let shadow = LightShadow {
        auto_update: false,
        ..LightShadow::default()
    };
    let light = scene.add(
        Node::light(Light::directional(Vec3::ONE, 1.0).with_shadow(shadow))
            .with_position(Vec3::new(0.0, 10.0, 0.0))
            .with_shadows(true, false),
    );

    // First frame draws the freshly allocated map
    renderer.render(&mut scene, &camera()).unwrap();
    assert_eq!(renderer.info().calls, 2);

    // Nothing asks for a redraw
    renderer.render(&mut scene, &camera()).unwrap();
    assert_eq!(renderer.info().calls, 1);

    let set_request = |scene: &mut Scene, value| {
        let light = scene.node_mut(light).unwrap().as_light_mut().unwrap();
        light.shadow.as_mut().unwrap().needs_update = value;
    };
    set_request(&mut scene, true);
    renderer.render(&mut scene, &camera()).unwrap();
    assert_eq!(renderer.info().calls, 2);
    let consumed = scene.node(light).unwrap().as_light().unwrap();
    assert!(!consumed.shadow.as_ref().unwrap().needs_update);
}

#[test]
fn test_line_primitives_count_lines() {
    let mut renderer = renderer();
    let mut scene = Scene::new();
    let geometry = scene.add_geometry(Geometry::cuboid(1.0, 1.0, 1.0));
    let material = scene.add_material(Material::default());
    scene.add(
        Node::line(geometry, material, Primitive::LineSegments)
            .with_position(Vec3::new(0.0, 0.0, -4.0)),
    );
    renderer.render(&mut scene, &camera()).unwrap();
    assert!(renderer.info().lines > 0);
    assert_eq!(renderer.info().triangles, 0);
}
