//! Tests for the uniform upload layer

use super::*;
use crate::device::UniformLocation;

/// Sink that records uploads and hands out sequential units.
#[derive(Default)]
struct TestSink {
    uploads: Vec<(UniformLocation, String)>,
    bound: Vec<(TextureTarget, Option<TextureId>)>,
    units: Option<TextureUnits>,
}

impl UniformSink for TestSink {
    fn upload(&mut self, location: UniformLocation, value: UniformUpload<'_>) {
        self.uploads.push((location, format!("{:?}", value)));
    }

    fn bind_texture(&mut self, target: TextureTarget, texture: Option<TextureId>) -> u32 {
        self.bound.push((target, texture));
        self.units
            .get_or_insert_with(|| TextureUnits::new(16))
            .allocate()
    }
}

fn uniform(name: &str, location: u32, kind: UniformType, size: u32) -> ActiveUniform {
    ActiveUniform {
        name: name.to_string(),
        location: UniformLocation(location),
        kind,
        size,
    }
}

fn table() -> UniformTable {
    UniformTable::from_active(&[
        uniform("diffuse", 0, UniformType::Vec3, 1),
        uniform("opacity", 1, UniformType::Float, 1),
        uniform("boneMatrices[0]", 2, UniformType::Mat4, 4),
        uniform("map", 3, UniformType::Sampler2D, 1),
        uniform("pointLights[0].color", 4, UniformType::Vec3, 1),
        uniform("isOrthographic", 5, UniformType::Bool, 1),
        uniform("spotShadowMap[0]", 6, UniformType::Sampler2D, 2),
    ])
}

#[test]
fn test_array_names_are_normalised() {
    let table = table();
    assert!(table.contains("boneMatrices"));
    assert!(table.contains("spotShadowMap"));
    assert!(table.contains("pointLights[0].color"));
    assert!(!table.contains("boneMatrices[0]"));
}

#[test]
fn test_equal_value_is_not_reuploaded() {
    let mut table = table();
    let mut sink = TestSink::default();

    assert!(table.set(&mut sink, "diffuse", &Vec3::new(1.0, 0.0, 0.0).into()));
    assert!(!table.set(&mut sink, "diffuse", &Vec3::new(1.0, 0.0, 0.0).into()));
    assert!(table.set(&mut sink, "diffuse", &Vec3::new(0.0, 1.0, 0.0).into()));
    assert_eq!(sink.uploads.len(), 2);
}

#[test]
fn test_unknown_uniform_is_ignored() {
    let mut table = table();
    let mut sink = TestSink::default();
    assert!(!table.set(&mut sink, "roughness", &0.5_f32.into()));
    assert!(sink.uploads.is_empty());
}

#[test]
fn test_matrix_arrays_compare_component_wise() {
    let mut table = table();
    let mut sink = TestSink::default();
    let bones = vec![Mat4::IDENTITY, Mat4::from_scale(Vec3::splat(2.0))];

    assert!(table.set(&mut sink, "boneMatrices", &bones.clone().into()));
    assert!(!table.set(&mut sink, "boneMatrices", &bones.into()));

    let moved = vec![Mat4::IDENTITY, Mat4::from_scale(Vec3::splat(3.0))];
    assert!(table.set(&mut sink, "boneMatrices", &moved.into()));
}

#[test]
fn test_arrays_are_truncated_to_declared_size() {
    let mut table = table();
    let mut sink = TestSink::default();
    let bones = vec![Mat4::IDENTITY; 10];
    table.set(&mut sink, "boneMatrices", &bones.into());

    let (_, recorded) = &sink.uploads[0];
    // 4 matrices of 16 floats
    assert_eq!(recorded.matches(',').count() + 1, 64);
}

#[test]
fn test_sampler_binds_texture_and_uploads_unit() {
    let mut table = table();
    let mut sink = TestSink::default();
    let texture = TextureId(11);

    assert!(table.set(&mut sink, "map", &UniformValue::Texture(Some(texture))));
    assert_eq!(sink.bound, vec![(TextureTarget::Texture2D, Some(texture))]);

    // Same unit on the next draw: texture is rebound, unit not reuploaded
    sink.units = Some(TextureUnits::new(16));
    assert!(!table.set(&mut sink, "map", &UniformValue::Texture(Some(texture))));
    assert_eq!(sink.bound.len(), 2);
    assert_eq!(sink.uploads.len(), 1);
}

#[test]
fn test_sampler_array_allocates_one_unit_each() {
    let mut table = table();
    let mut sink = TestSink::default();
    let value = UniformValue::TextureArray(vec![Some(TextureId(1)), Some(TextureId(2))]);
    table.set(&mut sink, "spotShadowMap", &value);
    assert_eq!(sink.bound.len(), 2);
    assert_eq!(sink.units.as_ref().map(TextureUnits::in_use), Some(2));
}

#[test]
fn test_bool_uploads_as_int() {
    let mut table = table();
    let mut sink = TestSink::default();
    table.set(&mut sink, "isOrthographic", &true.into());
    assert_eq!(sink.uploads[0].1, "Int([1])");
}

#[test]
fn test_invalidate_forces_reupload() {
    let mut table = table();
    let mut sink = TestSink::default();
    table.set(&mut sink, "opacity", &0.5_f32.into());
    table.invalidate();
    assert!(table.set(&mut sink, "opacity", &0.5_f32.into()));
}

#[test]
fn test_texture_units_wrap_over_budget() {
    let mut units = TextureUnits::new(2);
    assert_eq!(units.allocate(), 0);
    assert_eq!(units.allocate(), 1);
    assert_eq!(units.allocate(), 0);
    units.reset();
    assert_eq!(units.allocate(), 0);
}

#[test]
fn test_writer_skips_lazy_value_for_inactive_uniform() {
    let mut table = table();
    let mut sink = TestSink::default();
    let mut writer = UniformWriter::new(&mut table, &mut sink);
    let mut computed = false;
    writer.set_with("normalMatrix", || {
        computed = true;
        Mat3::IDENTITY
    });
    assert!(!computed);
    assert!(writer.set("opacity", 1.0_f32));
}

#[test]
fn test_value_texture_listing() {
    let value = UniformValue::TextureArray(vec![Some(TextureId(1)), None, Some(TextureId(3))]);
    assert_eq!(value.textures(), vec![TextureId(1), TextureId(3)]);
    assert!(UniformValue::Float(1.0).textures().is_empty());
}
