//! Tests for texture, render target and buffer uploads

use glam::Mat4;

use super::*;
use crate::capabilities::Capabilities;
use crate::config::{ColorSpace, RendererConfig};
use crate::device::{
    ActiveAttribute, DeviceCommand, DeviceParameters, IndexType, InternalFormat, PixelType,
    RecordingDevice, TexRegion, UniformType,
};
use crate::error::RenderError;
use crate::scene::{
    BufferAttribute, DepthTexture, Geometry, Image, Instancing, NodeId, RenderTarget, Texture,
};
use crate::state::GpuState;

fn setup(device: RecordingDevice) -> (GpuState<RecordingDevice>, Capabilities) {
    let caps = Capabilities::probe(&device, &RendererConfig::default()).expect("probe");
    let mut state = GpuState::new(device, false);
    state.device_mut().clear_commands();
    (state, caps)
}

fn count(state: &GpuState<RecordingDevice>, f: impl Fn(&DeviceCommand) -> bool) -> usize {
    state.device().count(f)
}

fn is_tex_image(c: &DeviceCommand) -> bool {
    matches!(c, DeviceCommand::TexImage { .. })
}

// ============================================================================
// Textures
// ============================================================================

#[test]
fn test_texture_uploads_once_per_version() {
    let (mut state, caps) = setup(RecordingDevice::new());
    let mut textures = TextureManager::new();
    let mut texture = Texture::new(Image::solid(4, 4, [255; 4]));

    assert!(textures.upload_texture(&mut state, &caps, &mut texture));
    assert!(!textures.upload_texture(&mut state, &caps, &mut texture));
    assert_eq!(count(&state, is_tex_image), 1);

    texture.needs_update();
    assert!(textures.upload_texture(&mut state, &caps, &mut texture));
    assert_eq!(count(&state, is_tex_image), 2);
    // Storage is reused
    assert_eq!(
        count(&state, |c| matches!(c, DeviceCommand::CreateTexture(_))),
        1
    );
}

#[test]
fn test_dirty_region_uses_sub_image() {
    let (mut state, caps) = setup(RecordingDevice::new());
    let mut textures = TextureManager::new();
    let mut texture = Texture::new(Image::solid(4, 4, [0; 4]));
    textures.upload_texture(&mut state, &caps, &mut texture);

    texture.update_region(TexRegion {
        x: 1,
        y: 1,
        width: 2,
        height: 2,
        depth: 1,
        ..Default::default()
    });
    textures.upload_texture(&mut state, &caps, &mut texture);

    assert_eq!(count(&state, is_tex_image), 1);
    assert!(state.device().commands().iter().any(|c| matches!(
        c,
        DeviceCommand::TexSubImage { bytes: 16, .. }
    )));
    assert!(texture.dirty_regions().is_empty());
}

#[test]
fn test_oversized_texture_is_skipped() {
    let device = RecordingDevice::new().with_parameters(DeviceParameters {
        max_texture_size: 2,
        ..DeviceParameters::default()
    });
    let (mut state, caps) = setup(device);
    let mut textures = TextureManager::new();
    let mut texture = Texture::new(Image::solid(4, 4, [0; 4]));

    assert!(!textures.upload_texture(&mut state, &caps, &mut texture));
    assert_eq!(count(&state, is_tex_image), 0);
    // Not retried until the texture changes
    assert!(textures.is_uploaded(&texture));
}

#[test]
fn test_srgb_texture_uses_srgb_storage() {
    let (mut state, caps) = setup(RecordingDevice::new());
    let mut textures = TextureManager::new();
    let mut texture = Texture::new(Image::solid(1, 1, [0; 4]));
    texture.color_space = ColorSpace::Srgb;
    textures.upload_texture(&mut state, &caps, &mut texture);

    assert!(state.device().commands().iter().any(|c| matches!(
        c,
        DeviceCommand::TexImage { desc, .. } if desc.internal_format == InternalFormat::Srgb8Alpha8
    )));
}

#[test]
fn test_cube_texture_uploads_six_faces() {
    let (mut state, caps) = setup(RecordingDevice::new());
    let mut textures = TextureManager::new();
    let face = || Image::solid(2, 2, [0; 4]);
    let mut texture = Texture::cube([face(), face(), face(), face(), face(), face()]);
    textures.upload_texture(&mut state, &caps, &mut texture);
    assert_eq!(count(&state, is_tex_image), 6);
}

#[test]
fn test_anisotropy_is_clamped() {
    let (mut state, caps) = setup(RecordingDevice::new());
    let mut textures = TextureManager::new();
    let mut texture = Texture::new(Image::solid(1, 1, [0; 4]));
    texture.anisotropy = 64.0;
    textures.upload_texture(&mut state, &caps, &mut texture);

    assert!(state.device().commands().iter().any(|c| matches!(
        c,
        DeviceCommand::TexParameters { params, .. } if params.anisotropy == 16.0
    )));
}

// ============================================================================
// Render targets
// ============================================================================

#[test]
fn test_render_target_validation() {
    let (mut state, caps) = setup(RecordingDevice::new().with_extensions(Vec::<String>::new()));
    let mut textures = TextureManager::new();

    let empty = RenderTarget::new(0, 4);
    assert!(matches!(
        textures.setup_render_target(&mut state, &caps, &empty),
        Err(RenderError::InvalidRenderTarget(_))
    ));

    let mut cube = RenderTarget::cube(8);
    cube.depth_texture = Some(DepthTexture {
        format: InternalFormat::Depth24,
    });
    assert!(textures.setup_render_target(&mut state, &caps, &cube).is_err());

    let mut float = RenderTarget::new(8, 8);
    float.data_type = PixelType::Float;
    float.internal_format = InternalFormat::Rgba32F;
    assert!(textures.setup_render_target(&mut state, &caps, &float).is_err());
}

#[test]
fn test_render_target_allocated_once() {
    let (mut state, caps) = setup(RecordingDevice::new());
    let mut textures = TextureManager::new();
    let mut target = RenderTarget::new(16, 16);

    let first = textures
        .setup_render_target(&mut state, &caps, &target)
        .expect("valid target");
    let again = textures
        .setup_render_target(&mut state, &caps, &target)
        .expect("valid target");
    assert_eq!(first, again);
    assert_eq!(textures.gpu_texture(target.texture()).map(|t| t.1), Some(first.color));

    // Resizing reallocates
    target.set_size(32, 32);
    textures
        .setup_render_target(&mut state, &caps, &target)
        .expect("valid target");
    assert_eq!(
        count(&state, |c| matches!(c, DeviceCommand::CreateFramebuffer(_))),
        2
    );
    assert_eq!(
        count(&state, |c| matches!(c, DeviceCommand::DeleteFramebuffer(_))),
        1
    );
    // The current binding is restored
    assert_eq!(state.current_framebuffer(), None);
}

#[test]
fn test_cube_target_has_framebuffer_per_face() {
    let (mut state, caps) = setup(RecordingDevice::new());
    let mut textures = TextureManager::new();
    let target = RenderTarget::cube(8);
    textures
        .setup_render_target(&mut state, &caps, &target)
        .expect("valid target");
    assert_eq!(
        count(&state, |c| matches!(c, DeviceCommand::CreateFramebuffer(_))),
        6
    );
    // One shared depth renderbuffer
    assert_eq!(
        count(&state, |c| matches!(c, DeviceCommand::CreateRenderbuffer(_))),
        1
    );
}

#[test]
fn test_depth_texture_is_sampleable() {
    let (mut state, caps) = setup(RecordingDevice::new());
    let mut textures = TextureManager::new();
    let mut target = RenderTarget::new(8, 8);
    target.depth_texture = Some(DepthTexture {
        format: InternalFormat::Depth24,
    });
    let allocated = textures
        .setup_render_target(&mut state, &caps, &target)
        .expect("valid target");
    assert!(allocated.depth.is_some());
    assert_eq!(
        textures.gpu_texture(target.depth_texture_id()).map(|t| t.1),
        allocated.depth
    );
    assert_eq!(
        count(&state, |c| matches!(c, DeviceCommand::CreateRenderbuffer(_))),
        0
    );
}

#[test]
fn test_multisampled_target_resolves_with_blit() {
    let (mut state, caps) = setup(RecordingDevice::new());
    let mut textures = TextureManager::new();
    let mut target = RenderTarget::new(8, 8);
    target.samples = 4;
    textures
        .setup_render_target(&mut state, &caps, &target)
        .expect("valid target");

    assert!(textures.bind_render_target(&mut state, &target, 0, 0));
    textures.update_multisample_render_target(&mut state, &target);
    assert_eq!(
        count(&state, |c| matches!(c, DeviceCommand::BlitFramebuffer { .. })),
        1
    );
    assert!(state.device().commands().iter().any(|c| matches!(
        c,
        DeviceCommand::RenderbufferStorage { samples: 4, .. }
    )));
}

#[test]
fn test_dispose_render_target_forgets_textures() {
    let (mut state, caps) = setup(RecordingDevice::new());
    let mut textures = TextureManager::new();
    let target = RenderTarget::new(8, 8);
    textures
        .setup_render_target(&mut state, &caps, &target)
        .expect("valid target");
    assert_eq!(textures.count(), 1);

    textures.dispose_render_target(&mut state, target.id());
    assert_eq!(textures.count(), 0);
    assert!(textures.gpu_texture(target.texture()).is_none());
    assert!(state.device().errors().is_empty());
}

// ============================================================================
// Buffers
// ============================================================================

fn triangle() -> Geometry {
    Geometry::new()
        .with_attribute(
            "position",
            BufferAttribute::from_f32(vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0], 3),
        )
        .with_index(BufferAttribute::from_u16(vec![0, 1, 2]))
}

fn is_buffer_data(c: &DeviceCommand) -> bool {
    matches!(c, DeviceCommand::BufferData { .. })
}

#[test]
fn test_geometry_uploads_once() {
    let (mut state, _) = setup(RecordingDevice::new());
    let mut attributes = AttributeManager::new();
    let mut geometry = triangle();

    assert!(attributes.update_geometry(&mut state, &mut geometry));
    assert!(!attributes.update_geometry(&mut state, &mut geometry));
    assert_eq!(count(&state, is_buffer_data), 2);
    assert_eq!(
        attributes.index_buffer(&geometry).map(|(_, t)| t),
        Some(IndexType::U16)
    );
}

#[test]
fn test_update_range_uploads_sub_data() {
    let (mut state, _) = setup(RecordingDevice::new());
    let mut attributes = AttributeManager::new();
    let mut geometry = triangle();
    attributes.update_geometry(&mut state, &mut geometry);
    state.device_mut().clear_commands();

    if let Some(position) = geometry.attribute_mut("position") {
        position.write_f32(3, &[2.0, 0.0, 0.0]);
    }
    attributes.update_geometry(&mut state, &mut geometry);

    assert_eq!(count(&state, is_buffer_data), 0);
    assert!(state.device().commands().iter().any(|c| matches!(
        c,
        DeviceCommand::BufferSubData {
            offset: 12,
            bytes: 12,
            ..
        }
    )));
}

#[test]
fn test_resized_attribute_reallocates() {
    let (mut state, _) = setup(RecordingDevice::new());
    let mut attributes = AttributeManager::new();
    let mut geometry = triangle();
    attributes.update_geometry(&mut state, &mut geometry);
    state.device_mut().clear_commands();

    if let Some(position) = geometry.attribute_mut("position") {
        *position.data_mut() = crate::scene::AttributeData::F32(vec![0.0; 12]);
    }
    attributes.update_geometry(&mut state, &mut geometry);
    assert_eq!(count(&state, is_buffer_data), 1);
    assert_eq!(
        count(&state, |c| matches!(c, DeviceCommand::CreateBuffer(_))),
        0
    );
}

#[test]
fn test_vertex_setup_enables_program_attributes() {
    let (mut state, _) = setup(RecordingDevice::new());
    let mut attributes = AttributeManager::new();
    let mut geometry = triangle();
    attributes.update_geometry(&mut state, &mut geometry);

    let node = NodeId(3);
    let mut instancing = Instancing::new(&[Mat4::IDENTITY, Mat4::IDENTITY]);
    attributes.update_instancing(&mut state, node, &mut instancing);
    state.device_mut().clear_commands();

    let active = [
        ActiveAttribute {
            name: "position".into(),
            location: 0,
            kind: UniformType::Vec3,
        },
        ActiveAttribute {
            name: "uv".into(),
            location: 1,
            kind: UniformType::Vec2,
        },
        ActiveAttribute {
            name: "instanceMatrix".into(),
            location: 2,
            kind: UniformType::Mat4,
        },
    ];
    attributes.setup_vertex_attributes(&mut state, &active, &geometry, Some(node));

    // position + 4 matrix columns; uv is missing from the geometry
    assert_eq!(
        count(&state, |c| matches!(c, DeviceCommand::EnableVertexAttrib(_))),
        5
    );
    assert_eq!(
        count(&state, |c| matches!(
            c,
            DeviceCommand::VertexAttribDivisor { divisor: 1, .. }
        )),
        4
    );
    assert!(state.device().commands().iter().any(|c| matches!(
        c,
        DeviceCommand::VertexAttribPointer {
            location: 3,
            stride: 64,
            offset: 16,
            ..
        }
    )));
}

#[test]
fn test_wireframe_index_from_triangles() {
    let (mut state, _) = setup(RecordingDevice::new());
    let mut attributes = AttributeManager::new();
    let geometry = triangle();

    let wireframe = attributes
        .update_wireframe(&mut state, &geometry)
        .expect("indexed geometry");
    assert_eq!(wireframe.count, 6);
    assert_eq!(wireframe.index_type, IndexType::U16);

    // Cached until the source index changes
    let again = attributes.update_wireframe(&mut state, &geometry);
    assert_eq!(again, Some(wireframe));
    assert_eq!(count(&state, is_buffer_data), 1);
}

#[test]
fn test_dispose_geometry_deletes_buffers() {
    let (mut state, _) = setup(RecordingDevice::new());
    let mut attributes = AttributeManager::new();
    let mut geometry = triangle();
    attributes.update_geometry(&mut state, &mut geometry);
    attributes.dispose_geometry(&mut state, geometry.id());

    assert_eq!(attributes.count(), 0);
    assert_eq!(
        count(&state, |c| matches!(c, DeviceCommand::DeleteBuffer(_))),
        2
    );
}
