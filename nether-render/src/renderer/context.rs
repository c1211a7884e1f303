//! Context loss and restore

use super::Renderer;
use crate::device::GpuDevice;
use crate::error::RenderError;

impl<D: GpuDevice> Renderer<D> {
    /// Check the device before a frame; rebuilds the caches once a lost
    /// context has come back.
    pub(super) fn check_context(&mut self) -> Result<(), RenderError> {
        if self.core.state.device().is_context_lost() {
            if !self.context_lost {
                self.handle_context_lost();
            }
            return Err(RenderError::ContextLost);
        }
        if self.context_lost {
            self.handle_context_restored()?;
        }
        Ok(())
    }

    /// Stop using the device. Every GPU handle the caches hold is dead from
    /// here on; `render` returns [`RenderError::ContextLost`] until the
    /// context is restored.
    pub fn handle_context_lost(&mut self) {
        if !self.context_lost {
            tracing::warn!("GPU context lost");
        }
        self.context_lost = true;
    }

    /// Forget every cached GPU object and re-probe the device.
    ///
    /// Scene resources are re-uploaded lazily on the next frame.
    ///
    /// # Errors
    ///
    /// [`RenderError::ContextCreation`] if the restored context is unusable.
    pub fn handle_context_restored(&mut self) -> Result<(), RenderError> {
        self.core.restore()?;
        self.shadow_map.reset();
        self.render_list.dispose();
        self.context_lost = false;
        tracing::info!("GPU context restored");
        Ok(())
    }

    /// Simulate a context loss through the driver, when it supports one.
    ///
    /// Returns false if the device cannot lose its context on request.
    pub fn force_context_loss(&mut self) -> bool {
        if !self.core.state.device_mut().lose_context() {
            return false;
        }
        self.handle_context_lost();
        true
    }

    /// Undo [`Renderer::force_context_loss`].
    ///
    /// # Errors
    ///
    /// See [`Renderer::handle_context_restored`].
    pub fn force_context_restore(&mut self) -> Result<bool, RenderError> {
        if !self.core.state.device_mut().restore_context() {
            return Ok(false);
        }
        self.handle_context_restored()?;
        Ok(true)
    }
}
