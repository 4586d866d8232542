//! # Render — Immediate-Mode 2D Drawing
//!
//! Drawing is a sequence of calls against the *current context*: set some
//! state, draw some images, present. There is no scene graph and no retained
//! sprite list inside the renderer; whatever the game draws this frame is what
//! appears.
//!
//! ## Architecture
//!
//! ```text
//!   set_offset / set_scale / set_blend ...      draw_image / draw_rect / draw_text
//!            │                                               │
//!            ▼                                               ▼
//!   ┌────────────────┐   read at call time    ┌──────────────────────────┐
//!   │ current Context│ ─────────────────────► │ quad math (CPU)          │
//!   └────────────────┘                        │ pivot → rotate → scale → │
//!                                             │ translate                │
//!                                             └────────────┬─────────────┘
//!                                                          ▼
//!                                             ┌──────────────────────────┐
//!                                             │ DrawList: quads merged   │
//!                                             │ by texture/blend/shader/ │
//!                                             │ scissor, in call order   │
//!                                             └────────────┬─────────────┘
//!                                        flush (destination change, flip)
//!                                                          ▼
//!                                             ┌──────────────────────────┐
//!                                             │ one render pass on the   │
//!                                             │ window or target texture │
//!                                             └──────────────────────────┘
//! ```
//!
//! ## Design Decisions
//!
//! **CPU-side quad transform.** Each draw's four corners are transformed on
//! the CPU with the context's offset, rotation, scale and origin. The shader
//! only applies a pixel-space orthographic projection, so draws with different
//! transforms still share a draw call.
//!
//! **Call order is draw order.** Quads are never sorted by the renderer.
//! Layering is the caller's job (see [`SpriteManager`](crate::sprite::SpriteManager)).
//!
//! **Handles, not references.** Images, shaders and contexts are owned by the
//! [`Renderer`] and addressed by small `Copy` handles. Many sprites can share
//! one image; unloading is explicit.
//!
//! ## Comparison
//!
//! - **Love2D**: Same immediate-mode model with a global transform stack and
//!   automatic batching of consecutive same-texture draws.
//! - **Macroquad**: Immediate-mode, builds vertex buffers each frame, batches
//!   by texture. No per-draw pivot; transforms go through a camera.

use std::fmt;

pub(crate) mod batch;
pub mod context;
pub mod font;
pub(crate) mod gpu;
pub mod image;
pub(crate) mod pipeline;
pub(crate) mod quad;
pub mod renderer;
pub mod shader;
pub(crate) mod texture;
pub(crate) mod vertex;

pub use context::{BlendMode, Context, Rgb, Viewport};
pub use font::Font;
pub use image::{Filter, Image, ImageError, ImageHandle, PaintSession};
pub use pipeline::DEFAULT_SHADER;
pub use renderer::{ContextId, Renderer};
pub use shader::{ShaderId, ShaderProgram};

/// Errors that can occur while creating contexts or loading resources.
#[derive(Debug)]
pub enum RenderError {
    /// The window surface could not be created or presented.
    Surface(String),
    /// No GPU adapter compatible with the surface.
    Adapter(String),
    /// The GPU device could not be opened.
    Device(String),
    /// A shader program failed to load or compile.
    Shader(String),
    /// A font or its metrics could not be loaded.
    Font(String),
    UnknownContext(ContextId),
    UnknownImage(ImageHandle),
    /// The image was loaded from a file and cannot be drawn into.
    NotTarget(ImageHandle),
    /// The operation needs a current context.
    NoContext,
    Image(ImageError),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::Surface(e) => write!(f, "surface error: {e}"),
            RenderError::Adapter(e) => write!(f, "no suitable GPU adapter: {e}"),
            RenderError::Device(e) => write!(f, "failed to create GPU device: {e}"),
            RenderError::Shader(e) => write!(f, "shader error: {e}"),
            RenderError::Font(e) => write!(f, "font error: {e}"),
            RenderError::UnknownContext(id) => write!(f, "unknown context {}", id.0),
            RenderError::UnknownImage(h) => write!(f, "unknown image {}", h.0),
            RenderError::NotTarget(h) => write!(f, "image {} is not a render target", h.0),
            RenderError::NoContext => write!(f, "no current context"),
            RenderError::Image(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::Image(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ImageError> for RenderError {
    fn from(e: ImageError) -> Self {
        RenderError::Image(e)
    }
}
