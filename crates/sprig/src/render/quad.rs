//! Quad geometry for the draw primitives.
//!
//! Pure functions from the current [`Context`] transform to four corners in
//! target pixels. Kept separate from the renderer so the exact corner math can
//! be checked without a GPU.
//!
//! ```text
//!  image quad                         rect quad
//!  ──────────                         ─────────
//!  (0,0)-(s,0)-(s,t)-(0,t)            size = (w,h) × scale
//!  + frame_size × offset   (pivot)    (0,0)-(w',0)-(w',h')-(0,h')
//!  rotate                             + size × offset      (pivot)
//!  × scale                            rotate
//!  + (x,y) + origin                   + (x,y) + origin
//! ```
//!
//! Images pivot on the *frame* size, not on the region being drawn, so a
//! glyph or partial region keeps the same anchor as a whole frame would.

use super::context::Context;
use super::vertex::QuadVertex;
use crate::math::{SourceRect, Vec2, rotate};

/// Index pattern for one quad, as two triangles sharing corner 0.
pub(crate) const QUAD_INDICES: [u32; 6] = [0, 1, 2, 0, 2, 3];

/// Four transformed corners plus their texture coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Quad {
    /// Top-left, top-right, bottom-right, bottom-left before transformation.
    pub corners: [Vec2; 4],
    pub uv_min: Vec2,
    pub uv_max: Vec2,
}

impl Quad {
    pub fn vertices(&self, color: [f32; 4]) -> [QuadVertex; 4] {
        let uvs = [
            [self.uv_min.x, self.uv_min.y],
            [self.uv_max.x, self.uv_min.y],
            [self.uv_max.x, self.uv_max.y],
            [self.uv_min.x, self.uv_max.y],
        ];
        std::array::from_fn(|i| QuadVertex {
            position: self.corners[i].to_array(),
            uv: uvs[i],
            color,
        })
    }
}

fn corners(size: Vec2) -> [Vec2; 4] {
    [
        Vec2::ZERO,
        Vec2::new(size.x, 0.0),
        size,
        Vec2::new(0.0, size.y),
    ]
}

/// Quad for a region `src` of an image whose frames are `frame_size` and whose
/// padded texture is `texture_size`, placed at `(x, y)`.
pub(crate) fn image_quad(
    ctx: &Context,
    frame_size: (u32, u32),
    texture_size: (u32, u32),
    x: f32,
    y: f32,
    src: SourceRect,
) -> Quad {
    let pivot = Vec2::new(frame_size.0 as f32, frame_size.1 as f32) * ctx.offset();
    let at = Vec2::new(x, y) + ctx.origin();
    let rotation = ctx.rotation();
    let scale = ctx.scale();

    let corners = corners(Vec2::new(src.s as f32, src.t as f32))
        .map(|c| rotate(c + pivot, rotation) * scale + at);
    let (uv_min, uv_max) = src.to_uv(texture_size.0, texture_size.1);

    Quad {
        corners,
        uv_min,
        uv_max,
    }
}

/// Untextured rectangle. Scale applies to the size before the pivot, so the
/// offset is a fraction of the scaled rectangle.
pub(crate) fn rect_quad(ctx: &Context, x: f32, y: f32, width: f32, height: f32) -> Quad {
    let size = Vec2::new(width, height) * ctx.scale();
    let pivot = size * ctx.offset();
    let at = Vec2::new(x, y) + ctx.origin();
    let rotation = ctx.rotation();

    Quad {
        corners: corners(size).map(|c| rotate(c + pivot, rotation) + at),
        uv_min: Vec2::ZERO,
        uv_max: Vec2::ONE,
    }
}

/// Source rectangle of cell `index` in a row-major grid of `cell`-sized tiles,
/// `per_row` tiles across.
pub(crate) fn grid_cell(index: u32, per_row: u32, cell: (u32, u32)) -> (u32, u32) {
    let per_row = per_row.max(1);
    let col = index % per_row;
    let row = index / per_row;
    (col * cell.0, row * cell.1)
}
