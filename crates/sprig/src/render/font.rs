//! # Font — Bitmap Glyph Sheets
//!
//! A [`Font`] is a glyph sheet image cut into a fixed grid of 32×32 cells plus
//! a 256-entry table of per-character pixel widths. Character code `c` lives
//! in cell `c` of the row-major grid; only the first `width[c]` columns of the
//! cell are drawn, and the pen advances by the same amount.
//!
//! ```text
//!  sheet (512×512, 16 cells per row)        metrics blob (512 bytes)
//!  ┌──┬──┬──┬──┬── ─ ─┐                     ┌────┬────┬────┬────┬─ ─ ─┐
//!  │ 0│ 1│ 2│ 3│  …   │                     │ w0 │ ·· │ w1 │ ·· │  …   │
//!  ├──┼──┼──┼──┼── ─ ─┤                     └────┴────┴────┴────┴─ ─ ─┘
//!  │16│17│ …│  │      │                     width[c] = byte[2c]; odd bytes unused
//!  └──┴──┴──┴──┴── ─ ─┘
//! ```
//!
//! Characters outside the table draw nothing and advance zero. A space is
//! never drawn, but still advances by its width.
//!
//! With the `ttf` feature, [`Font::bake_ttf`] rasterizes a TrueType/OpenType
//! font with [fontdue](https://docs.rs/fontdue) into the same sheet and width
//! table, so both kinds of font draw through one path. Glyphs are white with
//! coverage in alpha, so the draw color tints them.

use crate::math::SourceRect;

use super::RenderError;
use super::image::{Image, ImageHandle};
use super::quad::grid_cell;

/// Number of entries in the width table.
pub const GLYPH_COUNT: usize = 256;

/// Size of a metrics blob.
pub const METRICS_LEN: usize = GLYPH_COUNT * 2;

/// Side of one glyph cell in pixels.
pub const CELL_SIZE: u32 = 32;

/// A glyph sheet plus per-character widths.
#[derive(Debug, Clone, PartialEq)]
pub struct Font {
    image: ImageHandle,
    widths: [u8; GLYPH_COUNT],
    cell: (u32, u32),
    per_row: u32,
}

impl Font {
    /// Assemble a font from an already loaded sheet and its width table.
    pub fn from_parts(image: ImageHandle, sheet: &Image, widths: [u8; GLYPH_COUNT]) -> Self {
        Self {
            image,
            widths,
            cell: (sheet.frame_width(), sheet.frame_height()),
            per_row: sheet.frames_per_row(),
        }
    }

    /// Decode a metrics blob. Only the first [`METRICS_LEN`] bytes are read.
    pub fn parse_metrics(bytes: &[u8]) -> Result<[u8; GLYPH_COUNT], RenderError> {
        if bytes.len() < METRICS_LEN {
            return Err(RenderError::Font(format!(
                "metrics blob is {} bytes, expected {METRICS_LEN}",
                bytes.len()
            )));
        }
        Ok(std::array::from_fn(|c| bytes[c * 2]))
    }

    /// The glyph sheet.
    pub fn image(&self) -> ImageHandle {
        self.image
    }

    /// Line height in pixels.
    pub fn height(&self) -> u32 {
        self.cell.1
    }

    pub fn widths(&self) -> &[u8; GLYPH_COUNT] {
        &self.widths
    }

    /// Advance of `c` in pixels, zero outside the table.
    pub fn char_width(&self, c: char) -> u32 {
        match self.widths.get(c as usize) {
            Some(w) => u32::from(*w),
            None => {
                log::debug!("Glyph U+{:04X} outside font table", c as u32);
                0
            }
        }
    }

    pub fn text_width(&self, text: &str) -> u32 {
        text.chars().map(|c| self.char_width(c)).sum()
    }

    /// Sheet region drawn for `c`, or `None` for spaces and characters
    /// outside the table.
    pub fn glyph_source(&self, c: char) -> Option<SourceRect> {
        let code = c as usize;
        if c == ' ' || code >= GLYPH_COUNT {
            return None;
        }
        let (u, v) = grid_cell(code as u32, self.per_row, self.cell);
        Some(SourceRect::new(u, v, u32::from(self.widths[code]), self.cell.1))
    }

    /// Pen position and sheet region of each visible glyph, relative to the
    /// start of the line.
    pub fn layout(&self, text: &str) -> Vec<(f32, SourceRect)> {
        let mut pen = 0.0;
        let mut glyphs = Vec::with_capacity(text.len());
        for c in text.chars() {
            if let Some(src) = self.glyph_source(c) {
                glyphs.push((pen, src));
            }
            pen += self.char_width(c) as f32;
        }
        glyphs
    }
}

#[cfg(feature = "ttf")]
impl Font {
    /// Rasterize a TrueType/OpenType font at `px` pixels (at most 32) into a
    /// new glyph sheet owned by `renderer`.
    pub fn bake_ttf(renderer: &mut super::Renderer, bytes: &[u8], px: f32) -> Result<Font, RenderError> {
        let baked = rasterize(bytes, px)?;
        let handle = renderer.create_image_from_pixels(
            "baked font",
            baked.size,
            baked.size,
            baked.pixels,
            Some((CELL_SIZE, CELL_SIZE)),
        )?;
        let sheet = renderer.image(handle).ok_or(RenderError::UnknownImage(handle))?;
        Ok(Font::from_parts(handle, sheet, baked.widths))
    }
}

/// A rasterized sheet ready to become an image.
#[cfg(feature = "ttf")]
pub(crate) struct BakedFont {
    pub size: u32,
    pub pixels: Vec<u8>,
    pub widths: [u8; GLYPH_COUNT],
}

/// Rasterize codes 32–255 at `px` pixels into a 16×16 grid of 32×32 cells.
#[cfg(feature = "ttf")]
pub(crate) fn rasterize(bytes: &[u8], px: f32) -> Result<BakedFont, RenderError> {
    const PER_ROW: u32 = 16;
    let size = PER_ROW * CELL_SIZE;
    let px = px.clamp(1.0, CELL_SIZE as f32);

    let font = fontdue::Font::from_bytes(
        bytes,
        fontdue::FontSettings {
            scale: px,
            ..Default::default()
        },
    )
    .map_err(|e| RenderError::Font(e.to_owned()))?;

    let ascent = font
        .horizontal_line_metrics(px)
        .map(|m| m.ascent)
        .unwrap_or(px);

    let mut pixels = vec![0u8; (size * size * 4) as usize];
    let mut widths = [0u8; GLYPH_COUNT];

    for code in 32u32..GLYPH_COUNT as u32 {
        let Some(ch) = char::from_u32(code) else {
            continue;
        };
        let (metrics, bitmap) = font.rasterize(ch, px);
        widths[code as usize] = metrics.advance_width.round().clamp(0.0, CELL_SIZE as f32) as u8;

        let (cell_x, cell_y) = grid_cell(code, PER_ROW, (CELL_SIZE, CELL_SIZE));
        // fontdue: ymin is the distance from the baseline to the glyph bottom.
        let top = (ascent - (metrics.ymin as f32 + metrics.height as f32)).round() as i32;
        let left = metrics.xmin.max(0);

        for gy in 0..metrics.height {
            for gx in 0..metrics.width {
                let x = left + gx as i32;
                let y = top + gy as i32;
                if !(0..CELL_SIZE as i32).contains(&x) || !(0..CELL_SIZE as i32).contains(&y) {
                    continue;
                }
                let dst = (((cell_y + y as u32) * size + cell_x + x as u32) * 4) as usize;
                pixels[dst..dst + 3].copy_from_slice(&[255, 255, 255]);
                pixels[dst + 3] = bitmap[gy * metrics.width + gx];
            }
        }
    }

    Ok(BakedFont {
        size,
        pixels,
        widths,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::image::prepare;
    use crate::render::texture::TextureId;

    fn sheet() -> Image {
        let decoded = prepare(512, 512, vec![0; 512 * 512 * 4], None).unwrap();
        Image::from_decoded(&decoded, Some((32, 32)), TextureId(1)).unwrap()
    }

    fn font() -> Font {
        let mut widths = [0u8; GLYPH_COUNT];
        widths[b' ' as usize] = 8;
        widths[b'A' as usize] = 20;
        widths[b'B' as usize] = 18;
        Font::from_parts(ImageHandle(0), &sheet(), widths)
    }

    #[test]
    fn metrics_take_even_bytes() {
        let mut blob = vec![0u8; METRICS_LEN];
        blob[b'A' as usize * 2] = 20;
        blob[b'A' as usize * 2 + 1] = 99;
        let widths = Font::parse_metrics(&blob).unwrap();
        assert_eq!(widths[b'A' as usize], 20);
        assert_eq!(widths[b'A' as usize + 1], 0);
    }

    #[test]
    fn short_metrics_blob_is_an_error() {
        assert!(Font::parse_metrics(&[0; 100]).is_err());
    }

    #[test]
    fn text_width_sums_widths() {
        let f = font();
        assert_eq!(f.text_width("AB"), 38);
        assert_eq!(f.text_width("A B"), 46);
        assert_eq!(f.text_width(""), 0);
    }

    #[test]
    fn glyph_cell_follows_code() {
        let f = font();
        // 'A' = 65 → row 4, col 1 with 16 cells per row.
        assert_eq!(f.glyph_source('A'), Some(SourceRect::new(32, 128, 20, 32)));
        assert_eq!(f.height(), 32);
    }

    #[test]
    fn spaces_advance_but_do_not_draw() {
        let f = font();
        let glyphs = f.layout("A B");
        assert_eq!(glyphs.len(), 2);
        assert_eq!(glyphs[0].0, 0.0);
        assert_eq!(glyphs[1].0, 28.0);
    }

    #[test]
    fn characters_outside_table_are_skipped() {
        let f = font();
        assert_eq!(f.char_width('€'), 0);
        assert_eq!(f.glyph_source('€'), None);
        assert_eq!(f.layout("A€B").len(), 2);
        assert_eq!(f.text_width("A€B"), 38);
    }

    #[cfg(feature = "ttf")]
    #[test]
    fn garbage_ttf_is_an_error() {
        assert!(matches!(rasterize(b"not a font", 16.0), Err(RenderError::Font(_))));
    }
}
