//! Tests for GpuState

use super::*;
use crate::device::{DeviceCommand, RecordingDevice, ShaderSource};
use crate::scene::StencilState;

fn fresh_state() -> GpuState<RecordingDevice> {
    let mut state = GpuState::new(RecordingDevice::new(), false);
    state.device_mut().clear_commands();
    state
}

fn command_count(state: &GpuState<RecordingDevice>) -> usize {
    state.device().commands().len()
}

#[test]
fn test_repeated_setters_issue_one_call() {
    let mut state = fresh_state();

    state.set_depth_func(CompareFunction::Less);
    state.set_depth_func(CompareFunction::Less);
    state.set_color_mask(false);
    state.set_color_mask(false);
    state.set_line_width(2.0);
    state.set_line_width(2.0);

    assert_eq!(command_count(&state), 3);
}

#[test]
fn test_renderer_defaults_are_mirrored() {
    let mut state = fresh_state();

    // Already applied by new()
    state.set_depth_test(true);
    state.set_depth_func(CompareFunction::LessEqual);
    state.set_cull_face(Some(CullFace::Back));
    state.set_blending(Blending::None, false);
    state.set_clear_color([0.0, 0.0, 0.0, 1.0]);

    assert_eq!(command_count(&state), 0);
}

#[test]
fn test_capability_toggle_is_diffed() {
    let mut state = fresh_state();

    assert!(state.enable(Capability::ScissorTest));
    assert!(!state.enable(Capability::ScissorTest));
    assert!(state.is_enabled(Capability::ScissorTest));
    assert!(state.disable(Capability::ScissorTest));
    assert!(!state.disable(Capability::ScissorTest));
}

#[test]
fn test_blending_preset_change_only_issues_changed_parts() {
    let mut state = fresh_state();

    state.set_blending(Blending::Normal, false);
    let after_normal = command_count(&state);
    // Equation is already Add; only enable + factors
    assert_eq!(after_normal, 2);

    state.set_blending(Blending::Normal, false);
    assert_eq!(command_count(&state), after_normal);

    // Same equation, different factors
    state.set_blending(Blending::Additive, false);
    let new = &state.device().commands()[after_normal..];
    assert_eq!(new.len(), 1);
    assert!(matches!(new[0], DeviceCommand::BlendFunc { .. }));

    state.set_blending(Blending::None, false);
    assert_eq!(
        state.device().commands().last(),
        Some(&DeviceCommand::Disable(Capability::Blend))
    );
}

#[test]
fn test_program_and_framebuffer_bindings_report_changes() {
    let mut state = fresh_state();

    assert!(state.use_program(Some(GpuProgram(3))));
    assert!(!state.use_program(Some(GpuProgram(3))));
    assert_eq!(state.current_program(), Some(GpuProgram(3)));

    assert!(!state.bind_framebuffer(None));
    assert!(state.bind_framebuffer(Some(GpuFramebuffer(9))));
    assert_eq!(state.current_framebuffer(), Some(GpuFramebuffer(9)));
}

#[test]
fn test_texture_binding_per_unit() {
    let mut state = fresh_state();

    state.bind_texture(TextureTarget::Texture2D, Some(GpuTexture(1)), Some(0));
    state.bind_texture(TextureTarget::Texture2D, Some(GpuTexture(2)), Some(1));
    let before = command_count(&state);

    // Both already bound on their units
    state.bind_texture(TextureTarget::Texture2D, Some(GpuTexture(1)), Some(0));
    state.bind_texture(TextureTarget::Texture2D, Some(GpuTexture(2)), Some(1));
    assert_eq!(command_count(&state), before);

    assert_eq!(
        state.bound_texture(1),
        Some(BoundTexture {
            target: TextureTarget::Texture2D,
            texture: Some(GpuTexture(2)),
        })
    );
}

#[test]
fn test_deleting_bound_objects_clears_mirror() {
    let mut state = fresh_state();
    let texture = state.device_mut().create_texture();
    state.bind_texture(TextureTarget::Texture2D, Some(texture), Some(0));
    state.delete_texture(texture);
    assert_eq!(state.bound_texture(0).and_then(|b| b.texture), None);

    let program = state.device_mut().create_program(&ShaderSource::default());
    let Ok(program) = program else {
        panic!("empty program should link");
    };
    state.use_program(Some(program));
    state.delete_program(program);
    assert_eq!(state.current_program(), None);
}

#[test]
fn test_material_double_side_disables_culling() {
    let mut state = fresh_state();
    let mut material = Material::default();
    material.side = Side::Double;

    state.set_material(&material, false);
    assert!(!state.is_enabled(Capability::CullFace));

    material.side = Side::Front;
    state.set_material(&material, false);
    assert!(state.is_enabled(Capability::CullFace));
}

#[test]
fn test_material_back_side_flips_winding() {
    let mut state = fresh_state();
    let mut material = Material::default();
    material.side = Side::Back;

    state.set_material(&material, false);
    assert!(
        state
            .device()
            .commands()
            .contains(&DeviceCommand::FrontFace(FrontFace::Cw))
    );

    // Mirrored transform flips it back
    state.device_mut().clear_commands();
    state.set_material(&material, true);
    assert!(
        state
            .device()
            .commands()
            .contains(&DeviceCommand::FrontFace(FrontFace::Ccw))
    );
}

#[test]
fn test_opaque_normal_material_disables_blending() {
    let mut state = fresh_state();
    let material = Material::default();
    state.set_material(&material, false);
    assert!(!state.is_enabled(Capability::Blend));

    let transparent = Material::default().with_transparency(0.5);
    state.set_material(&transparent, false);
    assert!(state.is_enabled(Capability::Blend));
}

#[test]
fn test_material_stencil_is_applied() {
    let mut state = fresh_state();
    let mut material = Material::default();
    material.stencil = Some(StencilState {
        func: CompareFunction::Equal,
        reference: 1,
        ..Default::default()
    });
    state.set_material(&material, false);

    assert!(state.is_enabled(Capability::StencilTest));
    assert!(state.device().commands().contains(&DeviceCommand::StencilFunc {
        func: CompareFunction::Equal,
        reference: 1,
        mask: 0xff,
    }));
}

#[test]
fn test_reversed_depth_mirrors_comparisons() {
    let mut state = GpuState::new(RecordingDevice::new(), true);
    state.device_mut().clear_commands();
    state.set_depth_func(CompareFunction::Less);
    assert_eq!(
        state.device().commands(),
        &[DeviceCommand::DepthFunc(CompareFunction::Greater)]
    );
}

#[test]
fn test_locked_depth_mask_is_ignored() {
    let mut state = fresh_state();
    state.set_depth_locked(true);
    state.set_depth_write(false);
    assert_eq!(command_count(&state), 0);
    state.set_depth_locked(false);
    state.set_depth_write(false);
    assert_eq!(command_count(&state), 1);
}

#[test]
fn test_attribute_tracking_disables_unused() {
    let mut state = fresh_state();

    state.init_attributes();
    state.enable_attribute(0, 0);
    state.enable_attribute(1, 0);
    state.disable_unused_attributes();

    state.device_mut().clear_commands();
    state.init_attributes();
    state.enable_attribute(0, 0);
    state.disable_unused_attributes();

    assert_eq!(
        state.device().commands(),
        &[DeviceCommand::DisableVertexAttrib(1)]
    );
}

#[test]
fn test_attribute_divisor_is_diffed() {
    let mut state = fresh_state();
    state.init_attributes();
    state.enable_attribute(4, 1);
    state.enable_attribute(4, 1);
    let divisors = state
        .device()
        .count(|c| matches!(c, DeviceCommand::VertexAttribDivisor { .. }));
    assert_eq!(divisors, 1);
}

#[test]
fn test_reset_restores_known_state() {
    let mut state = fresh_state();
    state.use_program(Some(GpuProgram(5)));
    state.set_line_width(3.0);
    state.viewport(Rect::new(0, 0, 10, 10));

    state.reset();
    assert_eq!(state.current_program(), None);

    state.device_mut().clear_commands();
    // Viewport is unknown after a reset and must be reissued
    state.viewport(Rect::new(0, 0, 10, 10));
    state.set_line_width(1.0);
    assert_eq!(
        state.device().commands(),
        &[DeviceCommand::Viewport(Rect::new(0, 0, 10, 10))]
    );
}
