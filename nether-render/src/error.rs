//! Renderer error types
//!
//! Only caller errors and session-level failures are surfaced here. Shader
//! compile failures are resource-level: they are attached to the material
//! (see [`crate::program::ProgramDiagnosticsReport`]) and never escape
//! [`crate::Renderer::render`].

use std::path::PathBuf;

use thiserror::Error;

use crate::device::{PixelFormat, PixelType, Rect};

#[derive(Debug, Error)]
pub enum RenderError {
    /// No usable device context; the renderer cannot be created.
    #[error("failed to create rendering context: {0}")]
    ContextCreation(String),

    /// The device context is lost; the frame was abandoned.
    #[error("rendering context lost")]
    ContextLost,

    /// The render target description cannot be realised.
    #[error("invalid render target: {0}")]
    InvalidRenderTarget(String),

    /// The requested readback format/type is not readable from the target.
    #[error("pixels of format {format:?} / type {data_type:?} cannot be read from this target")]
    UnreadablePixels {
        format: PixelFormat,
        data_type: PixelType,
    },

    /// The readback rectangle lies outside the target.
    #[error("readback rectangle {rect:?} exceeds target size {width}x{height}")]
    ReadbackOutOfBounds { rect: Rect, width: u32, height: u32 },

    /// The output buffer cannot hold the requested pixels.
    #[error("readback buffer holds {got} bytes, {needed} required")]
    ReadbackBufferTooSmall { needed: usize, got: usize },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Failure to load a [`crate::RendererConfig`]
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

pub type Result<T, E = RenderError> = std::result::Result<T, E>;
