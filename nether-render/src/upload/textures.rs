//! Texture and render target storage

use hashbrown::HashMap;
use smallvec::SmallVec;

use super::{depth_buffer_format, depth_pixel_type};
use crate::capabilities::Capabilities;
use crate::config::ColorSpace;
use crate::device::{
    Attachment, ClearMask, GpuDevice, GpuFramebuffer, GpuRenderbuffer, GpuTexture, ImageTarget,
    InternalFormat, PixelFormat, PixelType, SamplerParams, TexImageDesc, TexRegion, TextureTarget,
};
use crate::error::RenderError;
use crate::scene::{
    Image, RenderTarget, RenderTargetId, RenderTargetKind, Texture, TextureId, TextureKind,
};
use crate::state::GpuState;
use crate::warn_once::WarnOnce;

#[derive(Debug, Clone)]
struct TextureProperties {
    gpu: GpuTexture,
    target: TextureTarget,
    version: u64,
    width: u32,
    height: u32,
    internal_format: InternalFormat,
}

#[derive(Debug, Clone)]
struct Multisample {
    framebuffer: GpuFramebuffer,
    color: GpuRenderbuffer,
    depth: Option<GpuRenderbuffer>,
}

#[derive(Debug, Clone)]
struct RenderTargetProperties {
    version: u64,
    /// One per cube face, one otherwise
    framebuffers: SmallVec<[GpuFramebuffer; 6]>,
    /// Mip level currently attached to each framebuffer
    attached_levels: SmallVec<[u32; 6]>,
    color: GpuTexture,
    color_target: TextureTarget,
    color_id: TextureId,
    depth_texture: Option<(TextureId, GpuTexture)>,
    depth_renderbuffer: Option<GpuRenderbuffer>,
    multisample: Option<Multisample>,
    width: u32,
    height: u32,
}

/// GPU objects backing a render target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetTextures {
    pub color: GpuTexture,
    pub depth: Option<GpuTexture>,
}

/// Owns every GPU texture and framebuffer created for scene resources.
#[derive(Debug, Default)]
pub struct TextureManager {
    textures: HashMap<TextureId, TextureProperties>,
    targets: HashMap<RenderTargetId, RenderTargetProperties>,
    /// Render target attachments addressable as sampled textures
    target_textures: HashMap<TextureId, (TextureTarget, GpuTexture)>,
    warn: WarnOnce,
}

impl TextureManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Live GPU texture for a scene texture or render target attachment.
    pub fn gpu_texture(&self, id: TextureId) -> Option<(TextureTarget, GpuTexture)> {
        self.textures
            .get(&id)
            .map(|p| (p.target, p.gpu))
            .or_else(|| self.target_textures.get(&id).copied())
    }

    pub fn is_uploaded(&self, texture: &Texture) -> bool {
        self.textures
            .get(&texture.id())
            .is_some_and(|p| p.version == texture.version())
    }

    /// Number of live textures, render target attachments included.
    pub fn count(&self) -> usize {
        self.textures.len() + self.target_textures.len()
    }

    /// Upload `texture` if its version moved since the last upload.
    ///
    /// Returns true if any GPU call was issued.
    pub fn upload_texture<D: GpuDevice>(
        &mut self,
        state: &mut GpuState<D>,
        caps: &Capabilities,
        texture: &mut Texture,
    ) -> bool {
        if self.is_uploaded(texture) {
            return false;
        }
        let id = texture.id();

        if texture.internal_format.is_compressed()
            && !caps.extensions.supports_compressed(texture.internal_format)
        {
            self.warn.warn("compressed-format", || {
                format!(
                    "compressed format {:?} of texture '{}' is not supported by this device",
                    texture.internal_format, texture.name
                )
            });
            self.mark_uploaded_without_storage(state, texture);
            return false;
        }

        let limit = match texture.kind {
            TextureKind::Cube => caps.max_cubemap_size,
            _ => caps.max_texture_size,
        };
        if texture.width() > limit || texture.height() > limit {
            self.warn.warn("texture-too-large", || {
                format!(
                    "texture '{}' is {}x{}, larger than the device maximum of {}px; it is left empty",
                    texture.name,
                    texture.width(),
                    texture.height(),
                    limit
                )
            });
            self.mark_uploaded_without_storage(state, texture);
            return false;
        }

        let target = texture_target(texture.kind);
        let internal_format = sized_format(texture);
        let existing = self.textures.get(&id).cloned();
        let partial = existing.as_ref().is_some_and(|p| {
            p.width == texture.width()
                && p.height == texture.height()
                && p.internal_format == internal_format
        }) && !texture.dirty_regions().is_empty();

        let gpu = match &existing {
            Some(p) => p.gpu,
            None => state.device_mut().create_texture(),
        };
        state.bind_texture(target, Some(gpu), Some(0));

        if partial {
            let bytes_per_texel = texture.format.components() * texture.data_type.bytes();
            let image_target = image_target(texture.kind, 0);
            for region in texture.dirty_regions() {
                let Some(bytes) = texture
                    .images
                    .first()
                    .and_then(|image| region_bytes(image, *region, bytes_per_texel))
                else {
                    continue;
                };
                state.device_mut().tex_sub_image(
                    image_target,
                    0,
                    *region,
                    texture.format,
                    texture.data_type,
                    &bytes,
                );
            }
        } else {
            for (face, image) in texture.images.iter().enumerate() {
                let desc = TexImageDesc {
                    width: image.width,
                    height: image.height,
                    depth: image.depth.max(1),
                    internal_format,
                    format: texture.format,
                    data_type: texture.data_type,
                };
                state.device_mut().tex_image(
                    image_target(texture.kind, face),
                    0,
                    &desc,
                    image.data.as_deref(),
                );
            }
            for (level, image) in texture.mipmaps.iter().enumerate() {
                let desc = TexImageDesc {
                    width: image.width,
                    height: image.height,
                    depth: image.depth.max(1),
                    internal_format,
                    format: texture.format,
                    data_type: texture.data_type,
                };
                state.device_mut().tex_image(
                    image_target(texture.kind, 0),
                    level as u32 + 1,
                    &desc,
                    image.data.as_deref(),
                );
            }
        }

        let params = SamplerParams {
            wrap_s: texture.wrap_s,
            wrap_t: texture.wrap_t,
            wrap_r: texture.wrap_r,
            min_filter: texture.min_filter,
            mag_filter: texture.mag_filter,
            anisotropy: self.clamp_anisotropy(caps, texture.anisotropy),
            compare: None,
        };
        state.device_mut().tex_parameters(target, &params);

        if texture.generate_mipmaps
            && texture.mipmaps.is_empty()
            && texture.min_filter.uses_mipmaps()
            && !internal_format.is_compressed()
        {
            state.device_mut().generate_mipmap(target);
        }

        tracing::debug!(
            "Uploaded texture '{}' ({}x{}, {:?}, {})",
            texture.name,
            texture.width(),
            texture.height(),
            internal_format,
            if partial { "partial" } else { "full" }
        );

        self.textures.insert(
            id,
            TextureProperties {
                gpu,
                target,
                version: texture.version(),
                width: texture.width(),
                height: texture.height(),
                internal_format,
            },
        );
        texture.clear_dirty_regions();
        true
    }

    /// Record the version so an unusable texture is not retried every frame.
    fn mark_uploaded_without_storage<D: GpuDevice>(
        &mut self,
        state: &mut GpuState<D>,
        texture: &mut Texture,
    ) {
        let gpu = match self.textures.get(&texture.id()) {
            Some(p) => p.gpu,
            None => state.device_mut().create_texture(),
        };
        self.textures.insert(
            texture.id(),
            TextureProperties {
                gpu,
                target: texture_target(texture.kind),
                version: texture.version(),
                width: 0,
                height: 0,
                internal_format: texture.internal_format,
            },
        );
        texture.clear_dirty_regions();
    }

    fn clamp_anisotropy(&mut self, caps: &Capabilities, requested: f32) -> f32 {
        if requested <= 1.0 || caps.max_anisotropy <= 0.0 {
            return 1.0;
        }
        if requested > caps.max_anisotropy {
            let max = caps.max_anisotropy;
            self.warn.warn("anisotropy", || {
                format!(
                    "anisotropy {} exceeds the device maximum of {}, clamping",
                    requested, max
                )
            });
            return max;
        }
        requested
    }

    pub fn dispose_texture<D: GpuDevice>(&mut self, state: &mut GpuState<D>, id: TextureId) {
        if let Some(props) = self.textures.remove(&id) {
            state.delete_texture(props.gpu);
        }
    }

    // ------------------------------------------------------------------
    // Render targets
    // ------------------------------------------------------------------

    /// Allocate (or reallocate after a change) the GPU storage of `target`.
    ///
    /// # Errors
    ///
    /// [`RenderError::InvalidRenderTarget`] for zero-sized targets, targets
    /// above the device texture limit, depth textures on cube targets, depth
    /// textures without a depth buffer and float attachments the device
    /// cannot render to.
    pub fn setup_render_target<D: GpuDevice>(
        &mut self,
        state: &mut GpuState<D>,
        caps: &Capabilities,
        target: &RenderTarget,
    ) -> Result<TargetTextures, RenderError> {
        if let Some(props) = self.targets.get(&target.id())
            && props.version == target.version()
        {
            return Ok(TargetTextures {
                color: props.color,
                depth: props.depth_texture.map(|(_, gpu)| gpu),
            });
        }
        validate_render_target(caps, target)?;
        self.dispose_render_target(state, target.id());

        let previous_framebuffer = state.current_framebuffer();
        let color_target = render_target_texture_target(target.kind);
        let device_samples = target.samples.min(caps.max_samples);

        // Colour attachment
        let color = state.device_mut().create_texture();
        state.bind_texture(color_target, Some(color), Some(0));
        let desc = TexImageDesc {
            width: target.width(),
            height: target.height(),
            depth: match target.kind {
                RenderTargetKind::Array { layers } => layers.max(1),
                RenderTargetKind::Volume { depth } => depth.max(1),
                _ => 1,
            },
            internal_format: color_format(target),
            format: target.format,
            data_type: target.data_type,
        };
        let faces = if target.kind == RenderTargetKind::Cube { 6 } else { 1 };
        for face in 0..faces {
            state.device_mut().tex_image(
                render_target_image(target.kind, face),
                0,
                &desc,
                None,
            );
        }
        state.device_mut().tex_parameters(
            color_target,
            &SamplerParams {
                wrap_s: target.wrap,
                wrap_t: target.wrap,
                wrap_r: target.wrap,
                min_filter: target.min_filter,
                mag_filter: target.mag_filter,
                anisotropy: 1.0,
                compare: None,
            },
        );
        if target.generate_mipmaps && target.min_filter.uses_mipmaps() {
            state.device_mut().generate_mipmap(color_target);
        }

        // Depth texture (2D targets only, validated above)
        let depth_texture = match target.depth_texture {
            Some(depth) => {
                let gpu = state.device_mut().create_texture();
                state.bind_texture(TextureTarget::Texture2D, Some(gpu), Some(0));
                let format = if depth.format.is_depth() {
                    depth.format
                } else {
                    depth_buffer_format(target.stencil_buffer)
                };
                let pixel_format = if format == InternalFormat::Depth24Stencil8 {
                    PixelFormat::DepthStencil
                } else {
                    PixelFormat::Depth
                };
                state.device_mut().tex_image(
                    ImageTarget::Texture2D,
                    0,
                    &TexImageDesc {
                        width: target.width(),
                        height: target.height(),
                        depth: 1,
                        internal_format: format,
                        format: pixel_format,
                        data_type: depth_pixel_type(format),
                    },
                    None,
                );
                state.device_mut().tex_parameters(
                    TextureTarget::Texture2D,
                    &SamplerParams {
                        min_filter: crate::device::Filter::Nearest,
                        mag_filter: crate::device::Filter::Nearest,
                        ..SamplerParams::default()
                    },
                );
                Some((target.depth_texture_id(), gpu, format))
            }
            None => None,
        };

        // Framebuffers
        let mut framebuffers = SmallVec::new();
        let mut depth_renderbuffer = None;
        for face in 0..faces {
            let framebuffer = state.device_mut().create_framebuffer();
            state.bind_framebuffer(Some(framebuffer));
            state.device_mut().framebuffer_texture(
                Attachment::Color(0),
                render_target_image(target.kind, face),
                Some(color),
                0,
                0,
            );
            if let Some((_, gpu, format)) = depth_texture {
                let attachment = if format == InternalFormat::Depth24Stencil8 {
                    Attachment::DepthStencil
                } else {
                    Attachment::Depth
                };
                state.device_mut().framebuffer_texture(
                    attachment,
                    ImageTarget::Texture2D,
                    Some(gpu),
                    0,
                    0,
                );
            } else if target.depth_buffer {
                let renderbuffer = match depth_renderbuffer {
                    Some(existing) => existing,
                    None => {
                        let renderbuffer = state.device_mut().create_renderbuffer();
                        state.device_mut().renderbuffer_storage(
                            renderbuffer,
                            depth_buffer_format(target.stencil_buffer),
                            target.width(),
                            target.height(),
                            0,
                        );
                        depth_renderbuffer = Some(renderbuffer);
                        renderbuffer
                    }
                };
                let attachment = if target.stencil_buffer {
                    Attachment::DepthStencil
                } else {
                    Attachment::Depth
                };
                state
                    .device_mut()
                    .framebuffer_renderbuffer(attachment, renderbuffer);
            }
            framebuffers.push(framebuffer);
        }

        // Multisampled render storage resolved into the texture
        let multisample = if device_samples > 0 && target.kind == RenderTargetKind::Texture2D {
            let framebuffer = state.device_mut().create_framebuffer();
            state.bind_framebuffer(Some(framebuffer));
            let color_rb = state.device_mut().create_renderbuffer();
            state.device_mut().renderbuffer_storage(
                color_rb,
                desc.internal_format,
                target.width(),
                target.height(),
                device_samples,
            );
            state
                .device_mut()
                .framebuffer_renderbuffer(Attachment::Color(0), color_rb);
            let depth_rb = if target.depth_buffer {
                let rb = state.device_mut().create_renderbuffer();
                state.device_mut().renderbuffer_storage(
                    rb,
                    depth_buffer_format(target.stencil_buffer),
                    target.width(),
                    target.height(),
                    device_samples,
                );
                let attachment = if target.stencil_buffer {
                    Attachment::DepthStencil
                } else {
                    Attachment::Depth
                };
                state.device_mut().framebuffer_renderbuffer(attachment, rb);
                Some(rb)
            } else {
                None
            };
            Some(Multisample {
                framebuffer,
                color: color_rb,
                depth: depth_rb,
            })
        } else {
            None
        };

        state.bind_framebuffer(previous_framebuffer);

        tracing::debug!(
            "Allocated render target '{}' ({}x{}, {:?}, {} samples)",
            target.name,
            target.width(),
            target.height(),
            target.kind,
            device_samples
        );

        let attached_levels = framebuffers.iter().map(|_| 0).collect();
        self.target_textures
            .insert(target.texture(), (color_target, color));
        if let Some((id, gpu, _)) = depth_texture {
            self.target_textures
                .insert(id, (TextureTarget::Texture2D, gpu));
        }
        self.targets.insert(
            target.id(),
            RenderTargetProperties {
                version: target.version(),
                framebuffers,
                attached_levels,
                color,
                color_target,
                color_id: target.texture(),
                depth_texture: depth_texture.map(|(id, gpu, _)| (id, gpu)),
                depth_renderbuffer,
                multisample,
                width: target.width(),
                height: target.height(),
            },
        );

        Ok(TargetTextures {
            color,
            depth: depth_texture.map(|(_, gpu, _)| gpu),
        })
    }

    /// Bind the framebuffer for drawing into `face` / `level` of `target`.
    ///
    /// Multisampled targets bind their render storage; level 0 of face 0 is
    /// used for everything else unless requested otherwise.
    pub fn bind_render_target<D: GpuDevice>(
        &mut self,
        state: &mut GpuState<D>,
        target: &RenderTarget,
        face: u32,
        level: u32,
    ) -> bool {
        let Some(props) = self.targets.get_mut(&target.id()) else {
            return false;
        };
        if let Some(ms) = &props.multisample
            && level == 0
        {
            state.bind_framebuffer(Some(ms.framebuffer));
            return true;
        }
        let index = (face as usize).min(props.framebuffers.len().saturating_sub(1));
        let framebuffer = props.framebuffers[index];
        state.bind_framebuffer(Some(framebuffer));
        if props.attached_levels[index] != level {
            state.device_mut().framebuffer_texture(
                Attachment::Color(0),
                render_target_image(target.kind, index as u32),
                Some(props.color),
                level,
                0,
            );
            props.attached_levels[index] = level;
        }
        true
    }

    /// Regenerate the mip chain of a target's colour texture after drawing.
    pub fn update_render_target_mipmap<D: GpuDevice>(
        &mut self,
        state: &mut GpuState<D>,
        target: &RenderTarget,
    ) {
        if !target.generate_mipmaps || !target.min_filter.uses_mipmaps() {
            return;
        }
        if let Some(props) = self.targets.get(&target.id()) {
            state.bind_texture(props.color_target, Some(props.color), Some(0));
            state.device_mut().generate_mipmap(props.color_target);
            state.unbind_texture();
        }
    }

    /// Resolve multisampled render storage into the colour texture.
    pub fn update_multisample_render_target<D: GpuDevice>(
        &mut self,
        state: &mut GpuState<D>,
        target: &RenderTarget,
    ) {
        let Some(props) = self.targets.get(&target.id()) else {
            return;
        };
        let Some(ms) = &props.multisample else {
            return;
        };
        let resolve = props.framebuffers[0];
        let mut mask = ClearMask::COLOR;
        if target.depth_buffer && props.depth_texture.is_some() {
            mask |= ClearMask::DEPTH;
        }
        state.device_mut().blit_framebuffer(
            Some(ms.framebuffer),
            Some(resolve),
            props.width,
            props.height,
            mask,
        );
        // The blit leaves the resolve framebuffer bound for drawing
        state.bind_framebuffer(Some(ms.framebuffer));
    }

    /// Framebuffer holding the resolved pixels of `face` of `target` (for
    /// readback). Only cube targets have more than one face.
    pub fn resolved_framebuffer(
        &self,
        target: RenderTargetId,
        face: u32,
    ) -> Option<GpuFramebuffer> {
        self.targets
            .get(&target)
            .and_then(|p| p.framebuffers.get(face as usize).copied())
    }

    pub fn dispose_render_target<D: GpuDevice>(
        &mut self,
        state: &mut GpuState<D>,
        id: RenderTargetId,
    ) {
        let Some(props) = self.targets.remove(&id) else {
            return;
        };
        for framebuffer in props.framebuffers {
            state.delete_framebuffer(framebuffer);
        }
        state.delete_texture(props.color);
        self.target_textures.remove(&props.color_id);
        if let Some((texture_id, gpu)) = props.depth_texture {
            state.delete_texture(gpu);
            self.target_textures.remove(&texture_id);
        }
        if let Some(renderbuffer) = props.depth_renderbuffer {
            state.device_mut().delete_renderbuffer(renderbuffer);
        }
        if let Some(ms) = props.multisample {
            state.delete_framebuffer(ms.framebuffer);
            state.device_mut().delete_renderbuffer(ms.color);
            if let Some(depth) = ms.depth {
                state.device_mut().delete_renderbuffer(depth);
            }
        }
    }

    /// Forget every GPU object without deleting it (the context that owned
    /// them is gone).
    pub fn reset(&mut self) {
        self.textures.clear();
        self.targets.clear();
        self.target_textures.clear();
        self.warn.clear();
    }
}

fn validate_render_target(caps: &Capabilities, target: &RenderTarget) -> Result<(), RenderError> {
    let name = if target.name.is_empty() {
        "<unnamed>"
    } else {
        target.name.as_str()
    };
    if target.width() == 0 || target.height() == 0 {
        return Err(RenderError::InvalidRenderTarget(format!(
            "render target {} has zero size",
            name
        )));
    }
    let limit = if target.kind == RenderTargetKind::Cube {
        caps.max_cubemap_size
    } else {
        caps.max_texture_size
    };
    if target.width() > limit || target.height() > limit {
        return Err(RenderError::InvalidRenderTarget(format!(
            "render target {} is {}x{}, above the device limit of {}px",
            name,
            target.width(),
            target.height(),
            limit
        )));
    }
    if target.depth_texture.is_some() {
        if target.kind != RenderTargetKind::Texture2D {
            return Err(RenderError::InvalidRenderTarget(format!(
                "render target {}: depth textures are only supported on 2D targets",
                name
            )));
        }
        if !target.depth_buffer {
            return Err(RenderError::InvalidRenderTarget(format!(
                "render target {}: a depth texture requires depth_buffer",
                name
            )));
        }
    }
    match target.data_type {
        PixelType::Float if !caps.extensions.float_color_buffer() => {
            Err(RenderError::InvalidRenderTarget(format!(
                "render target {}: float colour attachments are not renderable on this device",
                name
            )))
        }
        PixelType::HalfFloat if !caps.extensions.half_float_color_buffer() => {
            Err(RenderError::InvalidRenderTarget(format!(
                "render target {}: half-float colour attachments are not renderable on this device",
                name
            )))
        }
        _ => Ok(()),
    }
}

fn texture_target(kind: TextureKind) -> TextureTarget {
    match kind {
        TextureKind::Texture2D => TextureTarget::Texture2D,
        TextureKind::Cube => TextureTarget::CubeMap,
        TextureKind::Array => TextureTarget::Texture2DArray,
        TextureKind::Volume => TextureTarget::Texture3D,
    }
}

fn image_target(kind: TextureKind, face: usize) -> ImageTarget {
    match kind {
        TextureKind::Texture2D => ImageTarget::Texture2D,
        TextureKind::Cube => ImageTarget::CubeFace(face.min(5) as u8),
        TextureKind::Array => ImageTarget::Texture2DArray,
        TextureKind::Volume => ImageTarget::Texture3D,
    }
}

fn render_target_texture_target(kind: RenderTargetKind) -> TextureTarget {
    match kind {
        RenderTargetKind::Texture2D => TextureTarget::Texture2D,
        RenderTargetKind::Cube => TextureTarget::CubeMap,
        RenderTargetKind::Array { .. } => TextureTarget::Texture2DArray,
        RenderTargetKind::Volume { .. } => TextureTarget::Texture3D,
    }
}

fn render_target_image(kind: RenderTargetKind, face: u32) -> ImageTarget {
    match kind {
        RenderTargetKind::Texture2D => ImageTarget::Texture2D,
        RenderTargetKind::Cube => ImageTarget::CubeFace(face.min(5) as u8),
        RenderTargetKind::Array { .. } => ImageTarget::Texture2DArray,
        RenderTargetKind::Volume { .. } => ImageTarget::Texture3D,
    }
}

/// Storage format, promoted to sRGB for 8-bit colour data in sRGB space.
fn sized_format(texture: &Texture) -> InternalFormat {
    if texture.color_space == ColorSpace::Srgb
        && texture.internal_format == InternalFormat::Rgba8
        && texture.data_type == PixelType::UnsignedByte
    {
        InternalFormat::Srgb8Alpha8
    } else {
        texture.internal_format
    }
}

fn color_format(target: &RenderTarget) -> InternalFormat {
    if target.color_space == ColorSpace::Srgb && target.internal_format == InternalFormat::Rgba8 {
        InternalFormat::Srgb8Alpha8
    } else {
        target.internal_format
    }
}

/// Copy the rows of `region` out of a tightly packed image.
fn region_bytes(image: &Image, region: TexRegion, bytes_per_texel: usize) -> Option<Vec<u8>> {
    let data = image.data.as_deref()?;
    if region.x + region.width > image.width || region.y + region.height > image.height {
        return None;
    }
    let row_bytes = image.width as usize * bytes_per_texel;
    let start = region.x as usize * bytes_per_texel;
    let len = region.width as usize * bytes_per_texel;
    let mut bytes = Vec::with_capacity(len * region.height as usize);
    for row in region.y..region.y + region.height {
        let offset = row as usize * row_bytes + start;
        bytes.extend_from_slice(data.get(offset..offset + len)?);
    }
    Some(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_bytes_extracts_rows() {
        // 4x2 RGBA image with the pixel index in every channel
        let data = (0..8u8).flat_map(|i| [i; 4]).collect();
        let image = Image::new(4, 2, Some(data));
        let region = TexRegion {
            x: 1,
            y: 0,
            width: 2,
            height: 2,
            depth: 1,
            ..Default::default()
        };
        let bytes = region_bytes(&image, region, 4);
        assert_eq!(
            bytes,
            Some(vec![1, 1, 1, 1, 2, 2, 2, 2, 5, 5, 5, 5, 6, 6, 6, 6])
        );
    }

    #[test]
    fn test_region_outside_image_is_rejected() {
        let image = Image::solid(2, 2, [0; 4]);
        let region = TexRegion {
            x: 1,
            width: 2,
            height: 1,
            ..Default::default()
        };
        assert_eq!(region_bytes(&image, region, 4), None);
    }

    #[test]
    fn test_srgb_promotion() {
        let mut texture = Texture::new(Image::solid(1, 1, [0; 4]));
        assert_eq!(sized_format(&texture), InternalFormat::Rgba8);
        texture.color_space = ColorSpace::Srgb;
        assert_eq!(sized_format(&texture), InternalFormat::Srgb8Alpha8);
    }
}
