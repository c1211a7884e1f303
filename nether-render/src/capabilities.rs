//! Capability and extension probe
//!
//! Queried once when the renderer is created (and again after a context
//! restore). Everything downstream reads this snapshot instead of asking the
//! driver.

use hashbrown::HashSet;

use crate::config::RendererConfig;
use crate::device::{
    GpuDevice, InternalFormat, PixelFormat, PixelType, Precision, ShaderStage,
};
use crate::error::RenderError;

/// Optional driver extensions by GL name.
#[derive(Debug, Clone, Default)]
pub struct Extensions {
    names: HashSet<String>,
}

impl Extensions {
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn has(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn anisotropic_filtering(&self) -> bool {
        self.has("EXT_texture_filter_anisotropic")
    }

    pub fn float_color_buffer(&self) -> bool {
        self.has("EXT_color_buffer_float")
    }

    pub fn half_float_color_buffer(&self) -> bool {
        self.has("EXT_color_buffer_half_float") || self.float_color_buffer()
    }

    pub fn float_linear_filtering(&self) -> bool {
        self.has("OES_texture_float_linear")
    }

    pub fn parallel_shader_compile(&self) -> bool {
        self.has("KHR_parallel_shader_compile")
    }

    pub fn multi_draw(&self) -> bool {
        self.has("WEBGL_multi_draw")
    }

    /// Whether a compressed format can be uploaded.
    pub fn supports_compressed(&self, format: InternalFormat) -> bool {
        match format {
            InternalFormat::CompressedRgbaS3tcDxt5 => self.has("WEBGL_compressed_texture_s3tc"),
            InternalFormat::CompressedRgbaAstc4x4 => self.has("WEBGL_compressed_texture_astc"),
            InternalFormat::CompressedRgbaBptc => self.has("EXT_texture_compression_bptc"),
            InternalFormat::CompressedRgbEtc2 => self.has("WEBGL_compressed_texture_etc"),
            _ => true,
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Read-only snapshot of driver limits.
#[derive(Debug, Clone)]
pub struct Capabilities {
    /// Effective shader precision after fallback
    pub precision: Precision,
    pub logarithmic_depth_buffer: bool,
    pub reversed_depth_buffer: bool,
    pub max_textures: u32,
    pub max_vertex_textures: u32,
    pub max_texture_size: u32,
    pub max_cubemap_size: u32,
    pub max_attributes: u32,
    pub max_vertex_uniforms: u32,
    pub max_varyings: u32,
    pub max_fragment_uniforms: u32,
    pub max_samples: u32,
    /// 0 when anisotropic filtering is unavailable
    pub max_anisotropy: f32,
    pub vertex_textures: bool,
    read_format: (PixelFormat, PixelType),
    pub extensions: Extensions,
}

impl Capabilities {
    /// Probe a live device.
    ///
    /// # Errors
    ///
    /// Fails with [`RenderError::ContextCreation`] if the context is already
    /// lost or reports no texture units.
    pub fn probe<D: GpuDevice>(device: &D, config: &RendererConfig) -> Result<Self, RenderError> {
        if device.is_context_lost() {
            return Err(RenderError::ContextCreation("device context is lost".into()));
        }
        let parameters = device.parameters();
        if parameters.max_texture_units == 0 {
            return Err(RenderError::ContextCreation(format!(
                "device '{}' reports no texture units",
                parameters.renderer
            )));
        }

        let extensions = Extensions::from_names(device.extensions());
        let precision = max_precision(device, config.precision);
        if precision != config.precision {
            tracing::warn!(
                "{:?} precision not supported, using {:?} instead",
                config.precision,
                precision
            );
        }

        let max_anisotropy = if extensions.anisotropic_filtering() {
            parameters.max_anisotropy
        } else {
            0.0
        };

        tracing::info!(
            "Device: {} ({}), {} texture units, max texture {}px, {} extensions",
            parameters.renderer,
            parameters.version,
            parameters.max_texture_units,
            parameters.max_texture_size,
            extensions.len()
        );

        Ok(Self {
            precision,
            logarithmic_depth_buffer: config.logarithmic_depth_buffer,
            reversed_depth_buffer: config.reversed_depth_buffer,
            max_textures: parameters.max_texture_units,
            max_vertex_textures: parameters.max_vertex_texture_units,
            max_texture_size: parameters.max_texture_size,
            max_cubemap_size: parameters.max_cube_map_size,
            max_attributes: parameters.max_vertex_attribs,
            max_vertex_uniforms: parameters.max_vertex_uniform_vectors,
            max_varyings: parameters.max_varying_vectors,
            max_fragment_uniforms: parameters.max_fragment_uniform_vectors,
            max_samples: parameters.max_samples,
            max_anisotropy,
            vertex_textures: parameters.max_vertex_texture_units > 0,
            read_format: device.implementation_read_format(),
            extensions,
        })
    }

    /// Whether pixels of `format` can be read back from a target whose
    /// colour attachment uses `target_format`.
    pub fn texture_format_readable(&self, target_format: PixelFormat, format: PixelFormat) -> bool {
        format == PixelFormat::Rgba || (format == target_format && format == self.read_format.0)
    }

    /// Whether pixels of `data_type` can be read back from a target whose
    /// colour attachment stores `target_type`.
    pub fn texture_type_readable(&self, target_type: PixelType, data_type: PixelType) -> bool {
        if data_type == PixelType::UnsignedByte && target_type == PixelType::UnsignedByte {
            return true;
        }
        if data_type == self.read_format.1 && data_type == target_type {
            return true;
        }
        match data_type {
            PixelType::Float => target_type.is_float() && self.extensions.float_color_buffer(),
            PixelType::HalfFloat => {
                target_type == PixelType::HalfFloat && self.extensions.half_float_color_buffer()
            }
            _ => false,
        }
    }

    /// Texel type to use for floating point colour targets.
    pub fn float_target_type(&self) -> PixelType {
        if self.extensions.half_float_color_buffer() {
            PixelType::HalfFloat
        } else {
            PixelType::UnsignedByte
        }
    }

    /// Largest bone count a uniform array can hold on this device.
    pub fn max_bones(&self) -> u32 {
        // 20 vectors are reserved for the fixed matrices and lights,
        // each bone matrix takes four.
        (self.max_vertex_uniforms.saturating_sub(20) / 4).max(1)
    }
}

fn max_precision<D: GpuDevice>(device: &D, requested: Precision) -> Precision {
    let mut precision = requested;
    loop {
        if device.shader_precision_supported(ShaderStage::Vertex, precision)
            && device.shader_precision_supported(ShaderStage::Fragment, precision)
        {
            return precision;
        }
        match precision.lower() {
            Some(lower) => precision = lower,
            None => return precision,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::RecordingDevice;

    #[test]
    fn test_precision_falls_back() {
        let device = RecordingDevice::new().with_max_precision(Precision::Medium);
        let caps = Capabilities::probe(&device, &RendererConfig::default()).unwrap();
        assert_eq!(caps.precision, Precision::Medium);
    }

    #[test]
    fn test_anisotropy_requires_extension() {
        let device = RecordingDevice::new().with_extensions(Vec::<String>::new());
        let caps = Capabilities::probe(&device, &RendererConfig::default()).unwrap();
        assert_eq!(caps.max_anisotropy, 0.0);
        assert!(!caps.extensions.parallel_shader_compile());
    }

    #[test]
    fn test_readable_formats() {
        let device = RecordingDevice::new();
        let caps = Capabilities::probe(&device, &RendererConfig::default()).unwrap();
        assert!(caps.texture_format_readable(PixelFormat::Rgba, PixelFormat::Rgba));
        assert!(!caps.texture_format_readable(PixelFormat::Rgba, PixelFormat::Red));
        assert!(caps.texture_type_readable(PixelType::UnsignedByte, PixelType::UnsignedByte));
        assert!(caps.texture_type_readable(PixelType::HalfFloat, PixelType::Float));
        assert!(!caps.texture_type_readable(PixelType::UnsignedByte, PixelType::Float));
    }

    #[test]
    fn test_lost_context_fails_probe() {
        let mut device = RecordingDevice::new();
        device.lose_context();
        assert!(matches!(
            Capabilities::probe(&device, &RendererConfig::default()),
            Err(RenderError::ContextCreation(_))
        ));
    }
}
