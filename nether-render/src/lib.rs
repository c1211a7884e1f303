//! Retained-mode scene renderer over a stateful GPU command API
//!
//! `nether-render` turns a [`Scene`] and a [`Camera`] into a stream of draw
//! calls on a [`GpuDevice`], keeping redundant state changes and shader
//! recompiles to a minimum.
//!
//! Pipeline, leaves first:
//! - [`capabilities`]: one-shot probe of driver limits and extensions
//! - [`state`]: diffing cache of fixed-function and binding state
//! - [`upload`]: versioned texture, render target and vertex buffer uploads
//! - [`lights`]: flat light uniform block with a two-level version
//! - [`program`]: shader permutation cache keyed by a parameter descriptor
//! - [`uniforms`]: per-program uniform diffing and texture unit allocation
//! - [`render_list`]: opaque / transmissive / transparent buckets
//! - [`shadow`]: shadow-map sub-renderer
//! - [`renderer`]: the frame orchestrator
//!
//! The renderer is single-threaded by construction: programs are shared
//! through `Rc` handles, so neither [`Renderer`] nor its caches are `Send`.

pub mod capabilities;
pub mod clipping;
pub mod config;
pub mod device;
pub mod error;
pub mod lights;
pub mod program;
pub mod render_list;
pub mod renderer;
pub mod scene;
pub mod shadow;
pub mod state;
pub mod uniforms;
pub mod upload;

mod warn_once;

pub use capabilities::Capabilities;
pub use config::{ColorSpace, RendererConfig, ShadowType, ToneMapping};
pub use device::{GpuDevice, RecordingDevice};
pub use error::{ConfigError, RenderError};
pub use renderer::{RenderInfo, Renderer};
pub use scene::{Camera, Material, NodeId, RenderTarget, Scene};
