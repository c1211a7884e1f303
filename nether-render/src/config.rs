//! Renderer configuration
//!
//! Construction options plus the default render and shadow settings. Every
//! field has a serde default so partial TOML files load cleanly:
//!
//! ```toml
//! antialias = true
//! precision = "medium"
//!
//! [render]
//! tone_mapping = "ACESFilmic"
//!
//! [shadows]
//! enabled = true
//! shadow_type = "PCFSoft"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::device::Precision;
use crate::error::ConfigError;

/// GPU selection hint passed through to the context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum PowerPreference {
    #[default]
    Default,
    HighPerformance,
    LowPower,
}

/// Shadow filtering technique
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ShadowType {
    #[serde(rename = "Basic")]
    Basic,
    #[default]
    #[serde(rename = "PCF")]
    Pcf,
    #[serde(rename = "PCFSoft")]
    PcfSoft,
    /// Variance shadow maps, blurred with a two-pass separable filter
    #[serde(rename = "VSM")]
    Vsm,
}

/// Tone mapping operator applied when rendering to the screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ToneMapping {
    #[default]
    None,
    Linear,
    Reinhard,
    Cineon,
    #[serde(rename = "ACESFilmic")]
    AcesFilmic,
    AgX,
    Neutral,
}

/// Colour space of texture data or of the final output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ColorSpace {
    #[default]
    Srgb,
    Linear,
}

/// Top-level renderer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RendererConfig {
    /// Request a depth buffer on the default surface (default: true)
    #[serde(default = "default_true")]
    pub depth: bool,
    /// Request a stencil buffer on the default surface (default: false)
    #[serde(default)]
    pub stencil: bool,
    /// Default surface has an alpha channel (default: false)
    #[serde(default)]
    pub alpha: bool,
    /// Multisample the default surface (default: false)
    #[serde(default)]
    pub antialias: bool,
    /// Surface colours are premultiplied by alpha (default: true)
    #[serde(default = "default_true")]
    pub premultiplied_alpha: bool,
    /// Keep the drawing buffer between frames (default: false)
    #[serde(default)]
    pub preserve_drawing_buffer: bool,
    #[serde(default)]
    pub power_preference: PowerPreference,
    /// Store depth as 1 = near (default: false)
    #[serde(default)]
    pub reversed_depth_buffer: bool,
    /// Requested shader float precision; lowered if the driver lacks it
    #[serde(default)]
    pub precision: Precision,
    #[serde(default)]
    pub logarithmic_depth_buffer: bool,
    #[serde(default)]
    pub render: RenderSettings,
    #[serde(default)]
    pub shadows: ShadowSettings,
}

/// Per-frame render behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderSettings {
    /// Drawing surface width in CSS pixels (default: 800)
    #[serde(default = "default_width")]
    pub width: u32,
    /// Drawing surface height in CSS pixels (default: 600)
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_one")]
    pub pixel_ratio: f32,
    /// Sort render lists before drawing (default: true)
    #[serde(default = "default_true")]
    pub sort_objects: bool,
    #[serde(default = "default_true")]
    pub auto_clear: bool,
    #[serde(default = "default_true")]
    pub auto_clear_color: bool,
    #[serde(default = "default_true")]
    pub auto_clear_depth: bool,
    #[serde(default = "default_true")]
    pub auto_clear_stencil: bool,
    #[serde(default)]
    pub tone_mapping: ToneMapping,
    #[serde(default = "default_one")]
    pub tone_mapping_exposure: f32,
    #[serde(default)]
    pub output_color_space: ColorSpace,
    /// Honour per-material clipping planes (default: false)
    #[serde(default)]
    pub local_clipping_enabled: bool,
    /// Scale of the transmission pass target relative to the surface
    #[serde(default = "default_one")]
    pub transmission_resolution_scale: f32,
}

/// Shadow-map sub-renderer settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShadowSettings {
    #[serde(default)]
    pub enabled: bool,
    /// Re-render shadow maps every frame (default: true)
    #[serde(default = "default_true")]
    pub auto_update: bool,
    #[serde(default)]
    pub shadow_type: ShadowType,
    /// One-shot refresh request when `auto_update` is off; cleared after use
    #[serde(skip)]
    pub needs_update: bool,
}

fn default_true() -> bool {
    true
}
fn default_one() -> f32 {
    1.0
}
fn default_width() -> u32 {
    800
}
fn default_height() -> u32 {
    600
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            depth: true,
            stencil: false,
            alpha: false,
            antialias: false,
            premultiplied_alpha: true,
            preserve_drawing_buffer: false,
            power_preference: PowerPreference::default(),
            reversed_depth_buffer: false,
            precision: Precision::default(),
            logarithmic_depth_buffer: false,
            render: RenderSettings::default(),
            shadows: ShadowSettings::default(),
        }
    }
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            pixel_ratio: default_one(),
            sort_objects: true,
            auto_clear: true,
            auto_clear_color: true,
            auto_clear_depth: true,
            auto_clear_stencil: true,
            tone_mapping: ToneMapping::default(),
            tone_mapping_exposure: default_one(),
            output_color_space: ColorSpace::default(),
            local_clipping_enabled: false,
            transmission_resolution_scale: default_one(),
        }
    }
}

impl Default for ShadowSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            auto_update: true,
            shadow_type: ShadowType::default(),
            needs_update: false,
        }
    }
}

impl RendererConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid TOML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Serialize back to TOML.
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RendererConfig::default();
        assert!(config.depth);
        assert!(config.premultiplied_alpha);
        assert!(!config.shadows.enabled);
        assert_eq!(config.shadows.shadow_type, ShadowType::Pcf);
        assert_eq!(config.render.width, 800);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = RendererConfig::from_toml_str(
            r#"
            antialias = true
            precision = "medium"
            power_preference = "high-performance"

            [shadows]
            enabled = true
            shadow_type = "VSM"
            "#,
        )
        .unwrap();
        assert!(config.antialias);
        assert_eq!(config.precision, Precision::Medium);
        assert_eq!(config.power_preference, PowerPreference::HighPerformance);
        assert!(config.shadows.enabled);
        assert!(config.shadows.auto_update);
        assert_eq!(config.shadows.shadow_type, ShadowType::Vsm);
        assert!(config.render.sort_objects);
    }

    #[test]
    fn test_roundtrip_preserves_settings() {
        let mut config = RendererConfig::default();
        config.render.tone_mapping = ToneMapping::AcesFilmic;
        config.render.output_color_space = ColorSpace::Linear;
        let text = config.to_toml_string().unwrap();
        assert_eq!(RendererConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_invalid_config_is_an_error() {
        assert!(matches!(
            RendererConfig::from_toml_str("depth = \"yes\""),
            Err(ConfigError::Parse(_))
        ));
    }
}
