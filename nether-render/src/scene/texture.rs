//! Textures and offscreen render targets

use glam::{Mat3, Vec2};

use super::{RenderTargetId, TextureId, next_resource_id};
use crate::config::ColorSpace;
use crate::device::{
    Filter, InternalFormat, PixelFormat, PixelType, Rect, TexRegion, Wrapping,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureKind {
    #[default]
    Texture2D,
    /// Six faces in +X, -X, +Y, -Y, +Z, -Z order
    Cube,
    Array,
    Volume,
}

/// Pixel data for one level (or one cube face).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Image {
    pub width: u32,
    pub height: u32,
    /// Layers for arrays, slices for volumes, 1 otherwise
    pub depth: u32,
    /// `None` allocates storage without uploading
    pub data: Option<Vec<u8>>,
}

impl Image {
    pub fn new(width: u32, height: u32, data: Option<Vec<u8>>) -> Self {
        Self {
            width,
            height,
            depth: 1,
            data,
        }
    }

    /// Solid RGBA8 image.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let data = rgba
            .iter()
            .copied()
            .cycle()
            .take((width * height * 4) as usize)
            .collect();
        Self::new(width, height, Some(data))
    }
}

/// A sampled image with change tracking.
///
/// Mutate through [`crate::Scene::texture_mut`] or call
/// [`Texture::needs_update`] so the upload layer notices the change.
#[derive(Debug, Clone, PartialEq)]
pub struct Texture {
    id: TextureId,
    version: u64,
    pub name: String,
    pub kind: TextureKind,
    /// One image, or six for cube maps
    pub images: Vec<Image>,
    /// Explicit mip levels below level 0 (compressed data, for example)
    pub mipmaps: Vec<Image>,
    pub internal_format: InternalFormat,
    pub format: PixelFormat,
    pub data_type: PixelType,
    pub wrap_s: Wrapping,
    pub wrap_t: Wrapping,
    pub wrap_r: Wrapping,
    pub min_filter: Filter,
    pub mag_filter: Filter,
    pub anisotropy: f32,
    pub generate_mipmaps: bool,
    pub flip_y: bool,
    pub premultiply_alpha: bool,
    pub color_space: ColorSpace,
    pub offset: Vec2,
    pub repeat: Vec2,
    pub center: Vec2,
    pub rotation: f32,
    /// Regions changed since the last upload; empty means a full upload
    dirty_regions: Vec<TexRegion>,
}

impl Texture {
    pub fn new(image: Image) -> Self {
        Self {
            id: TextureId(next_resource_id()),
            version: 1,
            name: String::new(),
            kind: TextureKind::Texture2D,
            images: vec![image],
            mipmaps: Vec::new(),
            internal_format: InternalFormat::Rgba8,
            format: PixelFormat::Rgba,
            data_type: PixelType::UnsignedByte,
            wrap_s: Wrapping::ClampToEdge,
            wrap_t: Wrapping::ClampToEdge,
            wrap_r: Wrapping::ClampToEdge,
            min_filter: Filter::LinearMipmapLinear,
            mag_filter: Filter::Linear,
            anisotropy: 1.0,
            generate_mipmaps: true,
            flip_y: true,
            premultiply_alpha: false,
            color_space: ColorSpace::Linear,
            offset: Vec2::ZERO,
            repeat: Vec2::ONE,
            center: Vec2::ZERO,
            rotation: 0.0,
            dirty_regions: Vec::new(),
        }
    }

    pub fn cube(faces: [Image; 6]) -> Self {
        Self {
            kind: TextureKind::Cube,
            images: faces.into(),
            flip_y: false,
            ..Self::new(Image::default())
        }
    }

    pub fn id(&self) -> TextureId {
        self.id
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Request a full re-upload.
    pub fn needs_update(&mut self) {
        self.version += 1;
        self.dirty_regions.clear();
    }

    /// Request a partial re-upload of `region` of level 0.
    pub fn update_region(&mut self, region: TexRegion) {
        self.version += 1;
        self.dirty_regions.push(region);
    }

    pub fn dirty_regions(&self) -> &[TexRegion] {
        &self.dirty_regions
    }

    pub(crate) fn clear_dirty_regions(&mut self) {
        self.dirty_regions.clear();
    }

    pub fn width(&self) -> u32 {
        self.images.first().map_or(0, |i| i.width)
    }

    pub fn height(&self) -> u32 {
        self.images.first().map_or(0, |i| i.height)
    }

    /// UV transform from offset, repeat, rotation and centre.
    pub fn uv_transform(&self) -> Mat3 {
        let (s, c) = self.rotation.sin_cos();
        let (sx, sy) = (self.repeat.x, self.repeat.y);
        let (cx, cy) = (self.center.x, self.center.y);
        let (tx, ty) = (self.offset.x, self.offset.y);
        Mat3::from_cols_array(&[
            sx * c,
            -sy * s,
            0.0,
            sx * s,
            sy * c,
            0.0,
            -sx * (c * cx + s * cy) + cx + tx,
            -sy * (-s * cx + c * cy) + cy + ty,
            1.0,
        ])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RenderTargetKind {
    #[default]
    Texture2D,
    Cube,
    Array {
        layers: u32,
    },
    Volume {
        depth: u32,
    },
}

/// Depth attachment sampled as a texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DepthTexture {
    pub format: InternalFormat,
}

/// Offscreen framebuffer description.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderTarget {
    id: RenderTargetId,
    texture: TextureId,
    depth_texture_id: TextureId,
    version: u64,
    pub name: String,
    width: u32,
    height: u32,
    pub kind: RenderTargetKind,
    pub internal_format: InternalFormat,
    pub format: PixelFormat,
    pub data_type: PixelType,
    pub min_filter: Filter,
    pub mag_filter: Filter,
    pub wrap: Wrapping,
    pub generate_mipmaps: bool,
    pub depth_buffer: bool,
    pub stencil_buffer: bool,
    pub depth_texture: Option<DepthTexture>,
    /// MSAA sample count, 0 disables multisampling
    pub samples: u32,
    pub viewport: Rect,
    pub scissor: Rect,
    pub scissor_test: bool,
    pub color_space: ColorSpace,
}

impl RenderTarget {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            id: RenderTargetId(next_resource_id()),
            texture: TextureId(next_resource_id()),
            depth_texture_id: TextureId(next_resource_id()),
            version: 1,
            name: String::new(),
            width,
            height,
            kind: RenderTargetKind::Texture2D,
            internal_format: InternalFormat::Rgba8,
            format: PixelFormat::Rgba,
            data_type: PixelType::UnsignedByte,
            min_filter: Filter::Linear,
            mag_filter: Filter::Linear,
            wrap: Wrapping::ClampToEdge,
            generate_mipmaps: false,
            depth_buffer: true,
            stencil_buffer: false,
            depth_texture: None,
            samples: 0,
            viewport: Rect::new(0, 0, width, height),
            scissor: Rect::new(0, 0, width, height),
            scissor_test: false,
            color_space: ColorSpace::Linear,
        }
    }

    pub fn cube(size: u32) -> Self {
        Self {
            kind: RenderTargetKind::Cube,
            ..Self::new(size, size)
        }
    }

    pub fn id(&self) -> RenderTargetId {
        self.id
    }

    /// Id under which the colour attachment can be sampled.
    pub fn texture(&self) -> TextureId {
        self.texture
    }

    /// Id under which the depth texture (if any) can be sampled.
    pub fn depth_texture_id(&self) -> TextureId {
        self.depth_texture_id
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Resize; GPU storage is reallocated on next use.
    pub fn set_size(&mut self, width: u32, height: u32) {
        if self.width != width || self.height != height {
            self.width = width;
            self.height = height;
            self.version += 1;
        }
        self.viewport = Rect::new(0, 0, width, height);
        self.scissor = Rect::new(0, 0, width, height);
    }

    /// Mark the description changed (format, filters, attachments).
    pub fn needs_update(&mut self) {
        self.version += 1;
    }

    pub fn layers(&self) -> u32 {
        match self.kind {
            RenderTargetKind::Texture2D => 1,
            RenderTargetKind::Cube => 6,
            RenderTargetKind::Array { layers } => layers,
            RenderTargetKind::Volume { depth } => depth,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uv_transform_identity() {
        let texture = Texture::new(Image::solid(1, 1, [255; 4]));
        assert!(texture.uv_transform().abs_diff_eq(Mat3::IDENTITY, 1e-6));
    }

    #[test]
    fn test_uv_transform_offset_repeat() {
        let mut texture = Texture::new(Image::solid(1, 1, [255; 4]));
        texture.repeat = Vec2::new(2.0, 2.0);
        texture.offset = Vec2::new(0.5, 0.0);
        let uv = texture.uv_transform() * glam::Vec3::new(1.0, 1.0, 1.0);
        assert!((uv.x - 2.5).abs() < 1e-6);
        assert!((uv.y - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_resize_bumps_version() {
        let mut target = RenderTarget::new(64, 64);
        let version = target.version();
        target.set_size(64, 64);
        assert_eq!(target.version(), version);
        target.set_size(128, 64);
        assert_eq!(target.version(), version + 1);
        assert_eq!(target.viewport, Rect::new(0, 0, 128, 64));
    }

    #[test]
    fn test_region_updates_are_tracked() {
        let mut texture = Texture::new(Image::solid(4, 4, [0; 4]));
        texture.update_region(TexRegion {
            width: 2,
            height: 2,
            depth: 1,
            ..Default::default()
        });
        assert_eq!(texture.dirty_regions().len(), 1);
        texture.needs_update();
        assert!(texture.dirty_regions().is_empty());
    }
}
