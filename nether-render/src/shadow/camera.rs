//! Shadow cameras and world-to-map matrices

use glam::{Mat4, UVec2, Vec3, Vec4};

use crate::scene::{Camera, Frustum, LightKind, LightShadow};

/// Cells of the point-light atlas (columns, rows).
pub const POINT_FRAME_EXTENTS: UVec2 = UVec2::new(4, 2);

/// Atlas cell per cube face, in +X, -X, +Z, -Z, +Y, -Y order.
///
/// Row 1 holds `-X -Z +X +Z`, row 0 holds `-Y` and `+Y` in columns 1 and 3;
/// the fragment shader's cube-to-atlas lookup expects exactly this layout.
const CUBE_CELLS: [(u32, u32); 6] = [(2, 1), (0, 1), (3, 1), (1, 1), (3, 0), (1, 0)];
const CUBE_DIRECTIONS: [Vec3; 6] = [
    Vec3::X,
    Vec3::NEG_X,
    Vec3::Z,
    Vec3::NEG_Z,
    Vec3::Y,
    Vec3::NEG_Y,
];
const CUBE_UPS: [Vec3; 6] = [Vec3::Y, Vec3::Y, Vec3::Y, Vec3::Y, Vec3::Z, Vec3::NEG_Z];

/// Camera, culling frustum and map matrix for one shadow viewport.
#[derive(Debug, Clone, PartialEq)]
pub struct ShadowView {
    pub camera: Camera,
    pub frustum: Frustum,
    pub matrix: Mat4,
    /// Cell of the map this view renders into, in units of the per-view size
    pub cell: UVec2,
}

/// Number of views a light renders per update.
pub fn view_count(kind: &LightKind) -> usize {
    match kind {
        LightKind::Point { .. } => 6,
        _ => 1,
    }
}

/// Cells a light's map is divided into.
pub fn frame_extents(kind: &LightKind) -> UVec2 {
    match kind {
        LightKind::Point { .. } => POINT_FRAME_EXTENTS,
        _ => UVec2::ONE,
    }
}

/// Build view `index` of a light placed at `world`.
///
/// Returns `None` for light kinds that cast no shadows.
pub fn shadow_view(
    kind: &LightKind,
    shadow: &LightShadow,
    world: &Mat4,
    map_size: UVec2,
    index: usize,
    reversed_depth: bool,
) -> Option<ShadowView> {
    let position = world.w_axis.truncate();
    let bounds = &shadow.camera;
    let view = match kind {
        LightKind::Directional { target } => {
            let mut camera = Camera::orthographic(
                bounds.left,
                bounds.right,
                bounds.top,
                bounds.bottom,
                bounds.near,
                bounds.far,
            );
            camera.look_at(position, *target, up_for(*target - position));
            let matrix = texture_matrix(reversed_depth) * projected(&camera, reversed_depth);
            finish(camera, matrix, UVec2::ZERO)
        }
        LightKind::Spot {
            target,
            angle,
            distance,
            ..
        } => {
            let camera = spot_camera(position, *target, *angle, *distance, shadow, map_size);
            let matrix = texture_matrix(reversed_depth) * projected(&camera, reversed_depth);
            finish(camera, matrix, UVec2::ZERO)
        }
        LightKind::Point { .. } => {
            let face = index.min(5);
            let mut camera = Camera::perspective(90.0, 1.0, bounds.near, bounds.far);
            camera.look_at(position, position + CUBE_DIRECTIONS[face], CUBE_UPS[face]);
            // The distance shader works in world space around the light
            let matrix = Mat4::from_translation(-position);
            let (x, y) = CUBE_CELLS[face];
            finish(camera, matrix, UVec2::new(x, y))
        }
        _ => return None,
    };
    Some(view)
}

/// Projection matrix for a spot light's projected texture (no shadow needed).
pub fn spot_map_matrix(kind: &LightKind, shadow: Option<&LightShadow>, world: &Mat4) -> Mat4 {
    let LightKind::Spot {
        target,
        angle,
        distance,
        ..
    } = kind
    else {
        return Mat4::IDENTITY;
    };
    let fallback = LightShadow::default();
    let shadow = shadow.unwrap_or(&fallback);
    let camera = spot_camera(
        world.w_axis.truncate(),
        *target,
        *angle,
        *distance,
        shadow,
        shadow.map_size,
    );
    texture_matrix(false) * projected(&camera, false)
}

fn spot_camera(
    position: Vec3,
    target: Vec3,
    angle: f32,
    distance: f32,
    shadow: &LightShadow,
    map_size: UVec2,
) -> Camera {
    let bounds = &shadow.camera;
    let fov = (2.0 * angle * bounds.focus).to_degrees();
    let aspect = map_size.x.max(1) as f32 / map_size.y.max(1) as f32;
    let far = if distance > 0.0 { distance } else { bounds.far };
    let mut camera = Camera::perspective(fov, aspect, bounds.near, far);
    camera.look_at(position, target, up_for(target - position));
    camera
}

fn projected(camera: &Camera, reversed_depth: bool) -> Mat4 {
    camera.shader_projection_matrix(reversed_depth) * camera.view_matrix()
}

fn finish(camera: Camera, matrix: Mat4, cell: UVec2) -> ShadowView {
    let frustum = Frustum::from_matrix(&camera.view_projection());
    ShadowView {
        camera,
        frustum,
        matrix,
        cell,
    }
}

/// Clip space to texture space; depth is already 0..1 when reversed.
fn texture_matrix(reversed_depth: bool) -> Mat4 {
    let (z_scale, z_offset) = if reversed_depth { (1.0, 0.0) } else { (0.5, 0.5) };
    Mat4::from_cols(
        Vec4::new(0.5, 0.0, 0.0, 0.0),
        Vec4::new(0.0, 0.5, 0.0, 0.0),
        Vec4::new(0.0, 0.0, z_scale, 0.0),
        Vec4::new(0.5, 0.5, z_offset, 1.0),
    )
}

/// World up, unless the light looks straight along it.
fn up_for(direction: Vec3) -> Vec3 {
    let direction = direction.normalize_or_zero();
    if direction.cross(Vec3::Y).length_squared() < 1e-8 {
        Vec3::Z
    } else {
        Vec3::Y
    }
}
