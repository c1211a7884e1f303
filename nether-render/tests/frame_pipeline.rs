//! End-to-end frame tests against the recording device.
//!
//! Only the public API is used here; unit tests next to each module cover
//! the internals.

use glam::Vec3;
use nether_render::device::{
    ClearMask, DeviceCommand, DrawMode, PixelFormat, PixelType, RecordingDevice, Rect,
};
use nether_render::scene::{Geometry, Node, ShaderMaterial};
use nether_render::{
    Camera, Material, NodeId, RenderError, RenderTarget, Renderer, RendererConfig, Scene,
};

fn renderer() -> Renderer<RecordingDevice> {
    Renderer::new(RecordingDevice::new(), RendererConfig::default()).unwrap()
}

fn camera() -> Camera {
    Camera::perspective(60.0, 4.0 / 3.0, 0.1, 100.0)
}

fn scene_with(materials: Vec<Material>) -> (Scene, Vec<NodeId>) {
    let mut scene = Scene::new();
    let geometry = scene.add_geometry(Geometry::cuboid(1.0, 1.0, 1.0));
    let nodes = materials
        .into_iter()
        .enumerate()
        .map(|(i, material)| {
            let material = scene.add_material(material);
            scene.add(
                Node::mesh(geometry, material).with_position(Vec3::new(i as f32, 0.0, -4.0)),
            )
        })
        .collect();
    (scene, nodes)
}

fn count(
    renderer: &Renderer<RecordingDevice>,
    predicate: impl Fn(&DeviceCommand) -> bool,
) -> usize {
    renderer.device().count(predicate)
}

#[test]
fn test_second_frame_reuses_programs_and_buffers() {
    let mut renderer = renderer();
    let (mut scene, _) = scene_with(vec![
        Material::standard(Vec3::ONE, 0.5, 0.0),
        Material::standard(Vec3::ONE, 0.5, 0.0),
    ]);
    renderer.render(&mut scene, &camera()).unwrap();
    assert!(count(&renderer, |c| matches!(c, DeviceCommand::CreateProgram { .. })) > 0);

    renderer.device_mut().clear_commands();
    renderer.render(&mut scene, &camera()).unwrap();
    assert_eq!(count(&renderer, |c| matches!(c, DeviceCommand::CreateProgram { .. })), 0);
    assert_eq!(count(&renderer, |c| matches!(c, DeviceCommand::BufferData { .. })), 0);
    assert_eq!(renderer.device().draw_calls().count(), 2);
}

#[test]
fn test_equal_materials_share_one_program() {
    let mut renderer = renderer();
    let (mut scene, _) = scene_with(vec![
        Material::standard(Vec3::X, 0.2, 0.0),
        Material::standard(Vec3::Y, 0.9, 1.0),
        Material::basic(Vec3::Z),
    ]);
    renderer.render(&mut scene, &camera()).unwrap();

    // Colours and scalar factors are uniforms; only the shading model differs
    assert_eq!(renderer.info().programs, 2);
    assert_eq!(renderer.info().calls, 3);
}

#[test]
fn test_broken_shader_is_skipped_with_diagnostics() {
    let mut renderer = renderer();
    renderer.device_mut().set_compile_failure_marker("NOT_GLSL");
    let broken = Material::shader(ShaderMaterial::new(
        "void main() {\n\tgl_Position = vec4(0.0);\n}\n",
        "void main() {\n\tNOT_GLSL;\n}\n",
    ));
    let (mut scene, nodes) = scene_with(vec![Material::default(), broken]);
    renderer.render(&mut scene, &camera()).unwrap();

    assert_eq!(renderer.info().calls, 1);
    let material = scene.node(nodes[1]).unwrap().as_drawable().unwrap().materials.ids()[0];
    let report = renderer.material_diagnostics(material).expect("diagnostics");
    assert!(report.fragment_excerpt.as_deref().unwrap().contains("NOT_GLSL"));

    // A failed permutation is not recompiled every frame
    renderer.device_mut().clear_commands();
    renderer.render(&mut scene, &camera()).unwrap();
    assert_eq!(count(&renderer, |c| matches!(c, DeviceCommand::CompileFailed { .. })), 0);

    // Disposing the material lets the next frame try the build again
    renderer.dispose_material(material);
    renderer.device_mut().clear_commands();
    renderer.render(&mut scene, &camera()).unwrap();
    assert_eq!(count(&renderer, |c| matches!(c, DeviceCommand::CompileFailed { .. })), 1);
    assert!(renderer.material_diagnostics(material).is_some());
}

#[test]
fn test_render_to_target_then_read_back() {
    let mut renderer = renderer();
    let target = RenderTarget::new(8, 8);
    renderer.set_render_target(Some(&target), 0, 0).unwrap();
    renderer.set_clear_color(Vec3::new(1.0, 0.0, 0.0), 1.0);
    let (mut scene, _) = scene_with(vec![Material::default()]);
    renderer.render(&mut scene, &camera()).unwrap();

    let offscreen = renderer
        .device()
        .draw_calls()
        .filter(|c| matches!(c, DeviceCommand::Draw { framebuffer: Some(_), .. }))
        .count();
    assert_eq!(offscreen, 1);

    let mut out = vec![0u8; 4];
    pollster::block_on(renderer.read_render_target_pixels_async(
        &target,
        0,
        Rect::new(3, 3, 1, 1),
        PixelFormat::Rgba,
        PixelType::UnsignedByte,
        &mut out,
    ))
    .unwrap();
    assert_eq!(out, [255, 0, 0, 255]);

    renderer.set_render_target(None, 0, 0).unwrap();
    assert!(renderer.render_target().is_none());
}

#[test]
fn test_manual_clear_respects_mask() {
    let mut renderer = renderer();
    renderer.clear(ClearMask::DEPTH);
    let masks: Vec<ClearMask> = renderer
        .device()
        .commands()
        .iter()
        .filter_map(|c| match c {
            DeviceCommand::Clear { mask, .. } => Some(*mask),
            _ => None,
        })
        .collect();
    assert_eq!(masks, vec![ClearMask::DEPTH]);
}

#[test]
fn test_context_loss_round_trip() {
    let mut renderer = renderer();
    let (mut scene, _) = scene_with(vec![Material::default()]);
    renderer.render(&mut scene, &camera()).unwrap();

    assert!(renderer.force_context_loss());
    assert!(matches!(
        renderer.render(&mut scene, &camera()),
        Err(RenderError::ContextLost)
    ));

    assert!(renderer.force_context_restore().unwrap());
    renderer.device_mut().clear_commands();
    renderer.render(&mut scene, &camera()).unwrap();

    // Everything is re-created on the fresh context
    assert_eq!(count(&renderer, |c| matches!(c, DeviceCommand::CreateProgram { .. })), 1);
    assert!(count(&renderer, |c| matches!(c, DeviceCommand::BufferData { .. })) > 0);
    assert_eq!(renderer.info().calls, 1);
}

#[test]
fn test_points_are_counted_per_vertex() {
    let mut renderer = renderer();
    let mut scene = Scene::new();
    let geometry = scene.add_geometry(Geometry::cuboid(1.0, 1.0, 1.0));
    let material = scene.add_material(Material::default());
    scene.add(Node::points(geometry, material).with_position(Vec3::new(0.0, 0.0, -3.0)));
    renderer.render(&mut scene, &camera()).unwrap();

    let info = renderer.info();
    assert_eq!(info.calls, 1);
    assert_eq!(info.triangles, 0);
    assert!(info.points > 0);
    assert!(renderer
        .device()
        .draw_calls()
        .all(|c| matches!(c, DeviceCommand::Draw { mode: DrawMode::Points, .. })));
}

#[test]
fn test_dispose_releases_every_program() {
    let mut renderer = renderer();
    let (mut scene, nodes) = scene_with(vec![Material::default()]);
    renderer.render(&mut scene, &camera()).unwrap();
    assert_eq!(renderer.device().live_programs(), 1);

    let material = scene.node(nodes[0]).unwrap().as_drawable().unwrap().materials.ids()[0];
    renderer.dispose_material(material);
    assert_eq!(renderer.device().live_programs(), 0);
    assert_eq!(renderer.info().programs, 0);
}

#[test]
fn test_toggling_transparency_moves_draw_after_opaque() {
    let mut renderer = renderer();
    let mut scene = Scene::new();
    let geometry = scene.add_geometry(Geometry::cuboid(1.0, 1.0, 1.0));
    let dots = scene.add_material(Material::default());
    let solid = scene.add_material(Material::default());
    scene.add(Node::points(geometry, dots).with_position(Vec3::new(0.0, 0.0, -4.0)));
    scene.add(Node::mesh(geometry, solid).with_position(Vec3::new(1.0, 0.0, -4.0)));

    let modes = |renderer: &Renderer<RecordingDevice>| -> Vec<DrawMode> {
        renderer
            .device()
            .draw_calls()
            .filter_map(|c| match c {
                DeviceCommand::Draw { mode, .. } => Some(*mode),
                _ => None,
            })
            .collect()
    };

    renderer.render(&mut scene, &camera()).unwrap();
    assert_eq!(modes(&renderer), vec![DrawMode::Points, DrawMode::Triangles]);

    scene.material_mut(dots).unwrap().transparent = true;
    renderer.device_mut().clear_commands();
    renderer.render(&mut scene, &camera()).unwrap();
    assert_eq!(modes(&renderer), vec![DrawMode::Triangles, DrawMode::Points]);
}
