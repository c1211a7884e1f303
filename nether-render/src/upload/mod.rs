//! Versioned uploads of textures, render targets and vertex buffers
//!
//! Scene resources carry a version that is bumped on every tracked
//! mutation. The managers here remember the version they last uploaded and
//! only touch the GPU when it moved; attributes with pending update ranges
//! are patched with sub-uploads instead of being reallocated.

mod attributes;
mod textures;

#[cfg(test)]
mod tests;

pub use attributes::{AttributeManager, WireframeIndex};
pub use textures::{TextureManager, TargetTextures};

use crate::device::{InternalFormat, PixelType};

/// Depth / depth-stencil renderbuffer format for a target.
pub(crate) fn depth_buffer_format(stencil: bool) -> InternalFormat {
    if stencil {
        InternalFormat::Depth24Stencil8
    } else {
        InternalFormat::Depth24
    }
}

/// Client data type a depth texture format is allocated with.
pub(crate) fn depth_pixel_type(format: InternalFormat) -> PixelType {
    match format {
        InternalFormat::Depth16 => PixelType::UnsignedShort,
        InternalFormat::Depth32F => PixelType::Float,
        InternalFormat::Depth24Stencil8 => PixelType::UnsignedInt248,
        _ => PixelType::UnsignedInt,
    }
}
