//! Pixel readback from render targets

use std::future::poll_fn;
use std::task::Poll;

use super::Renderer;
use crate::device::{GpuDevice, GpuFramebuffer, PixelFormat, PixelType, Rect};
use crate::error::RenderError;
use crate::scene::RenderTarget;

impl<D: GpuDevice> Renderer<D> {
    /// Read `rect` of `target`'s colour attachment into `out`.
    ///
    /// `face` picks the cube face of cube targets and must be 0 for every
    /// other kind; array and 3D targets read their first layer.
    ///
    /// `out` must hold `width * height * components * bytes` bytes for the
    /// requested format and type; rows are tightly packed, bottom row first.
    ///
    /// # Errors
    ///
    /// - [`RenderError::UnreadablePixels`] if the format/type pair cannot be
    ///   read from this target on this device
    /// - [`RenderError::ReadbackOutOfBounds`] if `rect` leaves the target
    /// - [`RenderError::ReadbackBufferTooSmall`] if `out` is too short
    /// - [`RenderError::InvalidRenderTarget`] if the target was never drawn to
    ///   or has no such face
    pub fn read_render_target_pixels(
        &mut self,
        target: &RenderTarget,
        face: u32,
        rect: Rect,
        format: PixelFormat,
        data_type: PixelType,
        out: &mut [u8],
    ) -> Result<(), RenderError> {
        let framebuffer =
            self.validate_readback(target, face, rect, format, data_type, out.len())?;
        self.read_from(framebuffer, rect, format, data_type, out);
        Ok(())
    }

    /// Like [`Renderer::read_render_target_pixels`], waiting on a fence so
    /// the read does not stall on pending GPU work.
    ///
    /// Arguments are validated before anything is queued.
    pub async fn read_render_target_pixels_async(
        &mut self,
        target: &RenderTarget,
        face: u32,
        rect: Rect,
        format: PixelFormat,
        data_type: PixelType,
        out: &mut [u8],
    ) -> Result<(), RenderError> {
        let framebuffer =
            self.validate_readback(target, face, rect, format, data_type, out.len())?;
        let fence = self.core.state.device_mut().fence_sync();
        poll_fn(|cx| {
            if self.core.state.device_mut().fence_signaled(fence) {
                Poll::Ready(())
            } else {
                cx.waker().wake_by_ref();
                Poll::Pending
            }
        })
        .await;
        self.core.state.device_mut().delete_fence(fence);
        self.read_from(framebuffer, rect, format, data_type, out);
        Ok(())
    }

    fn validate_readback(
        &self,
        target: &RenderTarget,
        face: u32,
        rect: Rect,
        format: PixelFormat,
        data_type: PixelType,
        len: usize,
    ) -> Result<GpuFramebuffer, RenderError> {
        let caps = &self.core.caps;
        if !caps.texture_format_readable(target.format, format)
            || !caps.texture_type_readable(target.data_type, data_type)
        {
            return Err(RenderError::UnreadablePixels { format, data_type });
        }

        let (width, height) = (target.width(), target.height());
        let inside = rect.x >= 0
            && rect.y >= 0
            && rect.x as u64 + u64::from(rect.width) <= u64::from(width)
            && rect.y as u64 + u64::from(rect.height) <= u64::from(height);
        if !inside {
            return Err(RenderError::ReadbackOutOfBounds {
                rect,
                width,
                height,
            });
        }

        let needed = rect.width as usize
            * rect.height as usize
            * format.components()
            * data_type.bytes();
        if len < needed {
            return Err(RenderError::ReadbackBufferTooSmall { needed, got: len });
        }

        self.core
            .textures
            .resolved_framebuffer(target.id(), face)
            .ok_or_else(|| {
                RenderError::InvalidRenderTarget(format!(
                    "render target {:?} has no framebuffer for face {} to read from",
                    target.id(),
                    face
                ))
            })
    }

    fn read_from(
        &mut self,
        framebuffer: GpuFramebuffer,
        rect: Rect,
        format: PixelFormat,
        data_type: PixelType,
        out: &mut [u8],
    ) {
        let state = &mut self.core.state;
        let previous = state.current_framebuffer();
        state.bind_framebuffer(Some(framebuffer));
        state
            .device_mut()
            .read_pixels(rect, format, data_type, out);
        state.bind_framebuffer(previous);
    }
}
