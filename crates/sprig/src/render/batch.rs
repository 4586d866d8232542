//! # Batch — Recording Immediate-Mode Draws
//!
//! Draw calls return immediately; each one appends a quad to the
//! [`DrawList`] for the current destination. The list is replayed on the GPU
//! when the destination changes (a different context is made current, a render
//! target is set or released) or when the frame is presented.
//!
//! ```text
//! draw_image ──┐
//! draw_rect  ──┼──► vertices/indices ──► commands: [Clear, Draw, Draw, Clear, Draw…]
//! draw_text  ──┘                                    │
//! cls ─────────────────────────────────────────────┘
//! ```
//!
//! Consecutive quads that share texture, blend mode, shader and scissor are
//! merged into one [`DrawCall`], so a layer of sprites from one sheet costs a
//! single `draw_indexed`. A state change starts a new call; a clear starts a
//! new render pass. Order is always preserved: the list is a replay log, not a
//! sorted scene.

use super::context::{BlendMode, Viewport};
use super::quad::{QUAD_INDICES, Quad};
use super::shader::ShaderId;
use super::texture::TextureId;
use super::vertex::QuadVertex;

/// Where recorded draws end up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Destination {
    /// The back buffer of a context, by slot index.
    Surface(usize),
    /// An image used as a render target.
    Texture(TextureId),
}

/// Pipeline state shared by a run of quads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DrawState {
    pub texture: TextureId,
    pub blend: BlendMode,
    pub shader: Option<ShaderId>,
    pub scissor: Option<Viewport>,
}

/// One `draw_indexed` over a contiguous index range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct DrawCall {
    pub state: DrawState,
    pub index_start: u32,
    pub index_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Command {
    Clear(wgpu::Color),
    Draw(DrawCall),
}

/// Recorded geometry and commands for one destination.
#[derive(Debug, Default)]
pub(crate) struct DrawList {
    pub vertices: Vec<QuadVertex>,
    pub indices: Vec<u32>,
    pub commands: Vec<Command>,
}

impl DrawList {
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn clear(&mut self) {
        self.vertices.clear();
        self.indices.clear();
        self.commands.clear();
    }

    /// Record a clear. Anything drawn before it in this list is dead, so it is
    /// dropped rather than replayed.
    pub fn push_clear(&mut self, color: wgpu::Color) {
        self.clear();
        self.commands.push(Command::Clear(color));
    }

    pub fn push_quad(&mut self, quad: &Quad, color: [f32; 4], state: DrawState) {
        let base = self.vertices.len() as u32;
        self.vertices.extend_from_slice(&quad.vertices(color));
        let index_start = self.indices.len() as u32;
        self.indices.extend(QUAD_INDICES.iter().map(|i| base + i));

        if let Some(Command::Draw(last)) = self.commands.last_mut() {
            if last.state == state && last.index_start + last.index_count == index_start {
                last.index_count += QUAD_INDICES.len() as u32;
                return;
            }
        }
        self.commands.push(Command::Draw(DrawCall {
            state,
            index_start,
            index_count: QUAD_INDICES.len() as u32,
        }));
    }

    pub fn draw_calls(&self) -> impl Iterator<Item = &DrawCall> {
        self.commands.iter().filter_map(|c| match c {
            Command::Draw(call) => Some(call),
            Command::Clear(_) => None,
        })
    }

    /// Does any recorded draw use this shader?
    pub fn uses_shader(&self, shader: ShaderId) -> bool {
        self.draw_calls().any(|c| c.state.shader == Some(shader))
    }

    /// Does any recorded draw sample this texture?
    pub fn uses_texture(&self, texture: TextureId) -> bool {
        self.draw_calls().any(|c| c.state.texture == texture)
    }
}
