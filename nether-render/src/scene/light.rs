//! Light sources and their shadow configuration

use glam::{UVec2, Vec3};

use super::TextureId;

/// Shadow camera bounds for a shadow-casting light
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowCameraBounds {
    pub near: f32,
    pub far: f32,
    /// Orthographic extents (directional lights)
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
    /// Narrows a spot light's shadow frustum (0..1)
    pub focus: f32,
}

impl Default for ShadowCameraBounds {
    fn default() -> Self {
        Self {
            near: 0.5,
            far: 500.0,
            left: -5.0,
            right: 5.0,
            top: 5.0,
            bottom: -5.0,
            focus: 1.0,
        }
    }
}

/// Shadow parameters attached to a light.
#[derive(Debug, Clone, PartialEq)]
pub struct LightShadow {
    pub map_size: UVec2,
    pub bias: f32,
    pub normal_bias: f32,
    pub radius: f32,
    pub blur_samples: u32,
    pub intensity: f32,
    pub camera: ShadowCameraBounds,
    /// Re-render every frame
    pub auto_update: bool,
    /// One-shot re-render request, cleared once the map is rendered
    pub needs_update: bool,
}

impl Default for LightShadow {
    fn default() -> Self {
        Self {
            map_size: UVec2::new(512, 512),
            bias: 0.0,
            normal_bias: 0.0,
            radius: 1.0,
            blur_samples: 8,
            intensity: 1.0,
            camera: ShadowCameraBounds::default(),
            auto_update: true,
            needs_update: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LightKind {
    Ambient,
    /// Shines from the light position towards `target` (world space)
    Directional { target: Vec3 },
    Point { distance: f32, decay: f32 },
    Spot {
        target: Vec3,
        distance: f32,
        /// Half-angle of the cone in radians
        angle: f32,
        penumbra: f32,
        decay: f32,
        /// Projected texture
        map: Option<TextureId>,
    },
    Hemisphere { ground_color: Vec3 },
    RectArea { width: f32, height: f32 },
    /// Spherical-harmonic irradiance probe (9 coefficients)
    Probe { coefficients: [Vec3; 9] },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Light {
    pub color: Vec3,
    pub intensity: f32,
    pub kind: LightKind,
    pub shadow: Option<LightShadow>,
}

impl Light {
    pub fn new(kind: LightKind, color: Vec3, intensity: f32) -> Self {
        Self {
            color,
            intensity,
            kind,
            shadow: None,
        }
    }

    pub fn ambient(color: Vec3, intensity: f32) -> Self {
        Self::new(LightKind::Ambient, color, intensity)
    }

    pub fn directional(color: Vec3, intensity: f32) -> Self {
        Self::new(
            LightKind::Directional { target: Vec3::ZERO },
            color,
            intensity,
        )
    }

    pub fn point(color: Vec3, intensity: f32, distance: f32) -> Self {
        Self::new(
            LightKind::Point {
                distance,
                decay: 2.0,
            },
            color,
            intensity,
        )
    }

    pub fn spot(color: Vec3, intensity: f32, angle: f32) -> Self {
        Self::new(
            LightKind::Spot {
                target: Vec3::ZERO,
                distance: 0.0,
                angle,
                penumbra: 0.0,
                decay: 2.0,
                map: None,
            },
            color,
            intensity,
        )
    }

    pub fn hemisphere(sky: Vec3, ground: Vec3, intensity: f32) -> Self {
        Self::new(
            LightKind::Hemisphere {
                ground_color: ground,
            },
            sky,
            intensity,
        )
    }

    pub fn with_shadow(mut self, shadow: LightShadow) -> Self {
        self.shadow = Some(shadow);
        self
    }

    /// Whether this kind of light can cast shadows at all.
    pub fn supports_shadows(&self) -> bool {
        matches!(
            self.kind,
            LightKind::Directional { .. } | LightKind::Point { .. } | LightKind::Spot { .. }
        )
    }
}
