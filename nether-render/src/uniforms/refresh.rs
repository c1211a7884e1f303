//! Per-draw uniform refresh for objects, cameras, fog and materials
//!
//! Names follow the conventions of the built-in shader chunks (`diffuse`,
//! `modelViewMatrix`, `fogColor`, ...). Uniforms a program does not declare
//! are skipped by the table, so every function can refresh unconditionally.

use glam::{Mat3, Mat4, Vec2, Vec4};

use super::{UniformSink, UniformWriter};
use crate::scene::{
    Camera, Fog, Material, MaterialKind, Scene, Skeleton, TextureId, TextureKind,
};

/// Frame-level inputs needed by material refresh
pub(crate) struct MaterialContext<'a> {
    pub scene: &'a Scene,
    pub pixel_ratio: f32,
    /// Drawing buffer height in pixels
    pub height: f32,
    /// Opaque-pass capture sampled by transmissive materials
    pub transmission: Option<(TextureId, Vec2)>,
}

impl MaterialContext<'_> {
    fn uv_transform(&self, texture: Option<TextureId>) -> Mat3 {
        texture
            .and_then(|id| self.scene.texture(id))
            .map_or(Mat3::IDENTITY, |t| t.uv_transform())
    }
}

pub(crate) fn refresh_object<S: UniformSink>(
    w: &mut UniformWriter<'_, S>,
    model: &Mat4,
    view: &Mat4,
) {
    let model_view = *view * *model;
    w.set("modelMatrix", *model);
    w.set("modelViewMatrix", model_view);
    w.set_with("normalMatrix", || {
        Mat3::from_mat4(model_view).inverse().transpose()
    });
}

pub(crate) fn refresh_camera<S: UniformSink>(
    w: &mut UniformWriter<'_, S>,
    camera: &Camera,
    reversed_depth: bool,
    logarithmic_depth: bool,
) {
    w.set("projectionMatrix", camera.shader_projection_matrix(reversed_depth));
    w.set("viewMatrix", camera.view_matrix());
    w.set("cameraPosition", camera.position());
    w.set("isOrthographic", !camera.is_perspective());
    if logarithmic_depth {
        w.set("logDepthBufFC", 2.0 / (camera.far() + 1.0).log2());
    }
}

pub(crate) fn refresh_fog<S: UniformSink>(w: &mut UniformWriter<'_, S>, fog: &Fog) {
    match *fog {
        Fog::Linear { color, near, far } => {
            w.set("fogColor", color);
            w.set("fogNear", near);
            w.set("fogFar", far);
        }
        Fog::Exp2 { color, density } => {
            w.set("fogColor", color);
            w.set("fogDensity", density);
        }
    }
}

/// View-space clipping planes, already packed by the clipping state.
pub(crate) fn refresh_clipping<S: UniformSink>(w: &mut UniformWriter<'_, S>, planes: &[Vec4]) {
    if !planes.is_empty() {
        w.set("clippingPlanes", planes.to_vec());
    }
}

pub(crate) fn refresh_skinning<S: UniformSink>(
    w: &mut UniformWriter<'_, S>,
    skeleton: Option<&Skeleton>,
    morph_influences: &[f32],
) {
    if let Some(skeleton) = skeleton {
        w.set("bindMatrix", skeleton.bind_matrix);
        w.set("bindMatrixInverse", skeleton.bind_matrix_inverse);
        w.set_with("boneMatrices", || skeleton.bone_matrices.clone());
    }
    if !morph_influences.is_empty() {
        let sum: f32 = morph_influences.iter().sum();
        w.set("morphTargetBaseInfluence", 1.0 - sum);
        w.set_with("morphTargetInfluences", || morph_influences.to_vec());
    }
}

pub(crate) fn refresh_material<S: UniformSink>(
    w: &mut UniformWriter<'_, S>,
    material: &Material,
    ctx: &MaterialContext<'_>,
) {
    w.set("opacity", material.opacity);

    match &material.kind {
        MaterialKind::Basic | MaterialKind::Line => refresh_common(w, material, ctx),
        MaterialKind::Lambert => {
            refresh_common(w, material, ctx);
            refresh_surface(w, material, ctx);
        }
        MaterialKind::Phong => {
            refresh_common(w, material, ctx);
            refresh_surface(w, material, ctx);
            w.set("specular", material.specular);
            w.set("shininess", material.shininess.max(1e-4));
            w.texture("specularMap", material.specular_map);
        }
        MaterialKind::Standard => {
            refresh_common(w, material, ctx);
            refresh_surface(w, material, ctx);
            refresh_standard(w, material);
        }
        MaterialKind::Physical => {
            refresh_common(w, material, ctx);
            refresh_surface(w, material, ctx);
            refresh_standard(w, material);
            refresh_physical(w, material, ctx);
        }
        MaterialKind::Normal => {
            w.texture("normalMap", material.normal_map);
            w.set("normalScale", material.normal_scale);
            refresh_displacement(w, material);
        }
        MaterialKind::Depth { .. } => refresh_alpha_inputs(w, material, ctx),
        MaterialKind::Distance {
            reference_position,
            near,
            far,
        } => {
            refresh_alpha_inputs(w, material, ctx);
            w.set("referencePosition", *reference_position);
            w.set("nearDistance", *near);
            w.set("farDistance", *far);
        }
        MaterialKind::Shadow => {
            w.set("color", material.color);
        }
        MaterialKind::ShadowBlur {
            source,
            radius,
            resolution,
            ..
        } => {
            w.texture("shadow_pass", *source);
            w.set("radius", *radius);
            w.set("resolution", *resolution);
        }
        MaterialKind::Points {
            size,
            size_attenuation: _,
        } => {
            w.set("diffuse", material.color);
            w.set("size", *size * ctx.pixel_ratio);
            w.set("scale", ctx.height * 0.5);
            w.texture("map", material.map);
            w.set("mapTransform", ctx.uv_transform(material.map));
            w.texture("alphaMap", material.alpha_map);
            w.set("alphaTest", material.alpha_test);
        }
        MaterialKind::Shader(shader) => {
            for (name, value) in &shader.uniforms {
                w.set_ref(name, value);
            }
        }
    }
}

/// Maps shared by every lit and unlit surface material.
fn refresh_common<S: UniformSink>(
    w: &mut UniformWriter<'_, S>,
    material: &Material,
    ctx: &MaterialContext<'_>,
) {
    w.set("diffuse", material.color);
    refresh_alpha_inputs(w, material, ctx);
    if material.light_map.is_some() {
        w.texture("lightMap", material.light_map);
        w.set("lightMapIntensity", material.light_map_intensity);
    }
    if material.ao_map.is_some() {
        w.texture("aoMap", material.ao_map);
        w.set("aoMapIntensity", material.ao_map_intensity);
    }
    if let Some(env_map) = material.env_map {
        w.texture("envMap", Some(env_map));
        w.set("envMapIntensity", material.env_map_intensity);
        let cube = ctx
            .scene
            .texture(env_map)
            .is_some_and(|t| t.kind == TextureKind::Cube);
        w.set("flipEnvMap", if cube { -1.0_f32 } else { 1.0 });
    }
}

/// Inputs that affect coverage, needed by depth-only passes too.
fn refresh_alpha_inputs<S: UniformSink>(
    w: &mut UniformWriter<'_, S>,
    material: &Material,
    ctx: &MaterialContext<'_>,
) {
    if material.map.is_some() {
        w.texture("map", material.map);
        w.set("mapTransform", ctx.uv_transform(material.map));
    }
    if material.alpha_map.is_some() {
        w.texture("alphaMap", material.alpha_map);
        w.set("alphaMapTransform", ctx.uv_transform(material.alpha_map));
    }
    if material.alpha_test > 0.0 {
        w.set("alphaTest", material.alpha_test);
    }
    refresh_displacement(w, material);
}

fn refresh_displacement<S: UniformSink>(w: &mut UniformWriter<'_, S>, material: &Material) {
    if material.displacement_map.is_some() {
        w.texture("displacementMap", material.displacement_map);
        w.set("displacementScale", material.displacement_scale);
        w.set("displacementBias", material.displacement_bias);
    }
}

fn refresh_surface<S: UniformSink>(
    w: &mut UniformWriter<'_, S>,
    material: &Material,
    ctx: &MaterialContext<'_>,
) {
    w.set("emissive", material.emissive * material.emissive_intensity);
    if material.emissive_map.is_some() {
        w.texture("emissiveMap", material.emissive_map);
    }
    if material.normal_map.is_some() {
        w.texture("normalMap", material.normal_map);
        w.set("normalScale", material.normal_scale);
        w.set("normalMapTransform", ctx.uv_transform(material.normal_map));
    }
    if material.bump_map.is_some() {
        w.texture("bumpMap", material.bump_map);
        w.set("bumpScale", material.bump_scale);
    }
}

fn refresh_standard<S: UniformSink>(w: &mut UniformWriter<'_, S>, material: &Material) {
    w.set("roughness", material.roughness);
    w.set("metalness", material.metalness);
    if material.roughness_map.is_some() {
        w.texture("roughnessMap", material.roughness_map);
    }
    if material.metalness_map.is_some() {
        w.texture("metalnessMap", material.metalness_map);
    }
}

fn refresh_physical<S: UniformSink>(
    w: &mut UniformWriter<'_, S>,
    material: &Material,
    ctx: &MaterialContext<'_>,
) {
    w.set("ior", material.ior);
    w.set("clearcoat", material.clearcoat);
    w.set("clearcoatRoughness", material.clearcoat_roughness);
    if material.transmission > 0.0 {
        w.set("transmission", material.transmission);
        if let Some((texture, size)) = ctx.transmission {
            w.texture("transmissionSamplerMap", Some(texture));
            w.set("transmissionSamplerSize", size);
        }
        if material.transmission_map.is_some() {
            w.texture("transmissionMap", material.transmission_map);
        }
        w.set("thickness", material.thickness);
        if material.thickness_map.is_some() {
            w.texture("thicknessMap", material.thickness_map);
        }
        w.set("attenuationDistance", material.attenuation_distance);
        w.set("attenuationColor", material.attenuation_color);
    }
}
