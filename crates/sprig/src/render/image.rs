//! # Image — Textures With a Frame Grid
//!
//! An [`Image`] is a texture plus the metadata needed to draw pieces of it:
//!
//! ```text
//!  texture_width (pow2) ───────────────────────►
//!  ┌──────┬──────┬──────┬──────┬────────┐  ▲
//!  │  0   │  1   │  2   │  3   │        │  │
//!  ├──────┼──────┼──────┼──────┤ padding│  │ texture_height (pow2)
//!  │  4   │  5   │  6   │  7   │        │  │
//!  ├──────┴──────┴──────┴──────┘        │  │
//!  │            padding                 │  │
//!  └────────────────────────────────────┘  ▼
//!  width × height = the decoded source; frames are frame_width × frame_height
//!  tiles laid out row-major across the source.
//! ```
//!
//! ## Design Decisions
//!
//! **Power-of-two textures.** Decoded pixels are copied into the top-left of
//! a texture whose sides are the next power of two. UVs are computed against
//! the padded size, so a frame samples exactly its own texels.
//!
//! **Mask color.** Any texel whose RGB equals the loading context's mask color
//! gets alpha 0: chroma-key transparency for art without an alpha channel.
//!
//! **Paint sessions.** [`PaintSession`] borrows the renderer, pulls the current
//! texels down on creation, and pushes them back when dropped. There is no way
//! to forget the upload, and no CPU copy outlives the session.
//!
//! ## Comparison
//!
//! - **Love2D**: `ImageData` is a separate CPU object you `replacePixels` into
//!   an `Image`. Same round trip, but the two halves can drift apart.
//! - **Macroquad**: `Texture2D::update(&Image)` from a CPU image; no readback.

use std::fmt;

use super::context::Rgb;
use super::texture::TextureId;
use crate::fs::FsError;
use crate::math::{SourceRect, next_pow2};

use super::quad::grid_cell;
use super::renderer::Renderer;

/// Handle to an image owned by a [`Renderer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageHandle(pub(crate) usize);

/// Texture sampling filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    Linear,
    /// Crisp texels; used for frame sheets so neighbouring frames don't bleed.
    Nearest,
}

// ── Errors ──────────────────────────────────────────────────────────────

/// Errors that can occur while loading an image.
#[derive(Debug)]
pub enum ImageError {
    /// The file could not be read.
    Fs(FsError),
    /// The bytes are not a supported image.
    Decode(image::ImageError),
    /// A frame dimension was zero.
    BadFrameSize { frame_width: u32, frame_height: u32 },
    /// Raw pixels don't match the stated size.
    PixelCount { expected: usize, actual: usize },
    /// The padded texture would exceed the largest texture the renderer
    /// can create.
    TooLarge { width: u32, height: u32, max: u32 },
}

impl fmt::Display for ImageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageError::Fs(e) => write!(f, "image read failed: {e}"),
            ImageError::Decode(e) => write!(f, "image decode failed: {e}"),
            ImageError::BadFrameSize {
                frame_width,
                frame_height,
            } => write!(f, "invalid frame size {frame_width}x{frame_height}"),
            ImageError::PixelCount { expected, actual } => {
                write!(f, "expected {expected} bytes of RGBA pixels, got {actual}")
            }
            ImageError::TooLarge { width, height, max } => {
                write!(f, "image {width}x{height} does not fit a {max}x{max} texture")
            }
        }
    }
}

impl std::error::Error for ImageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ImageError::Fs(e) => Some(e),
            ImageError::Decode(e) => Some(e),
            ImageError::BadFrameSize { .. } | ImageError::PixelCount { .. } | ImageError::TooLarge { .. } => None,
        }
    }
}

impl From<FsError> for ImageError {
    fn from(e: FsError) -> Self {
        ImageError::Fs(e)
    }
}

impl From<image::ImageError> for ImageError {
    fn from(e: image::ImageError) -> Self {
        ImageError::Decode(e)
    }
}

// ── Image ───────────────────────────────────────────────────────────────

/// Image metadata. Pixels live in the renderer's texture store.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    width: u32,
    height: u32,
    frame_width: u32,
    frame_height: u32,
    texture_width: u32,
    texture_height: u32,
    frame_count: u32,
    filter: Filter,
    render_target: bool,
    pub(crate) texture: TextureId,
}

impl Image {
    /// Source width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn frame_width(&self) -> u32 {
        self.frame_width
    }

    pub fn frame_height(&self) -> u32 {
        self.frame_height
    }

    /// Padded (power-of-two) texture width.
    pub fn texture_width(&self) -> u32 {
        self.texture_width
    }

    pub fn texture_height(&self) -> u32 {
        self.texture_height
    }

    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    pub fn filter(&self) -> Filter {
        self.filter
    }

    /// Created blank for drawing into with [`Renderer::set_target`].
    pub fn is_render_target(&self) -> bool {
        self.render_target
    }

    /// Fraction of the texture width covered by the source.
    pub fn width_ratio(&self) -> f32 {
        self.width as f32 / self.texture_width as f32
    }

    pub fn height_ratio(&self) -> f32 {
        self.height as f32 / self.texture_height as f32
    }

    pub fn frames_per_row(&self) -> u32 {
        (self.width / self.frame_width).max(1)
    }

    /// Pixel rect of frame `frame` in the row-major grid.
    ///
    /// Indices past the last frame wrap around.
    pub fn frame_source(&self, frame: u32) -> SourceRect {
        let frame = if self.frame_count > 0 {
            if frame >= self.frame_count {
                log::debug!("Frame {frame} out of range ({} frames), wrapping", self.frame_count);
            }
            frame % self.frame_count
        } else {
            0
        };
        let (u, v) = grid_cell(frame, self.frames_per_row(), (self.frame_width, self.frame_height));
        SourceRect::new(u, v, self.frame_width, self.frame_height)
    }

    /// The whole source image.
    pub fn full_source(&self) -> SourceRect {
        SourceRect::new(0, 0, self.width, self.height)
    }

    pub(crate) fn from_decoded(decoded: &Decoded, frame: Option<(u32, u32)>, texture: TextureId) -> Result<Self, ImageError> {
        let (frame_width, frame_height) = frame.unwrap_or((decoded.width, decoded.height));
        if frame_width == 0 || frame_height == 0 {
            return Err(ImageError::BadFrameSize {
                frame_width,
                frame_height,
            });
        }
        Ok(Self {
            width: decoded.width,
            height: decoded.height,
            frame_width,
            frame_height,
            texture_width: decoded.texture_width,
            texture_height: decoded.texture_height,
            frame_count: (decoded.width / frame_width) * (decoded.height / frame_height),
            filter: if frame.is_some() { Filter::Nearest } else { Filter::Linear },
            render_target: false,
            texture,
        })
    }

    pub(crate) fn blank(width: u32, height: u32, texture: TextureId) -> Self {
        Self {
            width,
            height,
            frame_width: width.max(1),
            frame_height: height.max(1),
            texture_width: next_pow2(width),
            texture_height: next_pow2(height),
            frame_count: 1,
            filter: Filter::Linear,
            render_target: true,
            texture,
        }
    }
}

// ── Decoding ────────────────────────────────────────────────────────────

/// Decoded, padded and masked pixels ready for upload.
#[derive(Debug, Clone)]
pub(crate) struct Decoded {
    pub width: u32,
    pub height: u32,
    pub texture_width: u32,
    pub texture_height: u32,
    /// `texture_width × texture_height` RGBA8 texels.
    pub pixels: Vec<u8>,
}

/// Reject sizes whose padded texture is wider or taller than `max`.
pub(crate) fn check_size(width: u32, height: u32, max: u32) -> Result<(), ImageError> {
    if next_pow2(width) > max || next_pow2(height) > max {
        return Err(ImageError::TooLarge { width, height, max });
    }
    Ok(())
}

/// Bytes of `width × height` RGBA8 texels.
pub(crate) fn texel_bytes(width: u32, height: u32) -> Result<usize, ImageError> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|n| n.checked_mul(4))
        .ok_or(ImageError::TooLarge {
            width,
            height,
            max: u32::MAX,
        })
}

/// Decode PNG/JPEG bytes, pad to powers of two, and key out `mask`. Images
/// whose padded size exceeds `max` are rejected.
pub(crate) fn decode(bytes: &[u8], mask: Rgb, max: u32) -> Result<Decoded, ImageError> {
    let rgba = image::load_from_memory(bytes)?.to_rgba8();
    let (width, height) = rgba.dimensions();
    check_size(width, height, max)?;
    prepare(width, height, rgba.into_raw(), Some(mask))
}

/// Pad tightly packed RGBA8 pixels to powers of two, keying out `mask` if
/// given.
pub(crate) fn prepare(width: u32, height: u32, source: Vec<u8>, mask: Option<Rgb>) -> Result<Decoded, ImageError> {
    if width == 0 || height == 0 {
        return Err(ImageError::BadFrameSize {
            frame_width: width,
            frame_height: height,
        });
    }
    let texture_width = next_pow2(width);
    let texture_height = next_pow2(height);
    let size = texel_bytes(texture_width, texture_height)?;

    let mut pixels = if texture_width == width && texture_height == height {
        source
    } else {
        let mut padded = vec![0u8; size];
        let src_row = width as usize * 4;
        let dst_row = texture_width as usize * 4;
        for (y, row) in source.chunks_exact(src_row).enumerate() {
            padded[y * dst_row..y * dst_row + src_row].copy_from_slice(row);
        }
        padded
    };

    if let Some(mask) = mask {
        for texel in pixels.chunks_exact_mut(4) {
            if texel[..3] == mask {
                texel[3] = 0;
            }
        }
    }

    Ok(Decoded {
        width,
        height,
        texture_width,
        texture_height,
        pixels,
    })
}

// ── Painting ────────────────────────────────────────────────────────────

/// Scoped CPU access to an image's texels.
///
/// Created by [`Renderer::begin_paint`]. Writes go to a CPU buffer; the buffer
/// is uploaded when the session ends, whether by [`end`](Self::end) or by
/// being dropped.
pub struct PaintSession<'r> {
    renderer: &'r mut Renderer,
    image: ImageHandle,
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl<'r> PaintSession<'r> {
    pub(crate) fn new(renderer: &'r mut Renderer, image: ImageHandle, width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            renderer,
            image,
            width,
            height,
            pixels,
        }
    }

    pub fn image(&self) -> ImageHandle {
        self.image
    }

    /// Texel buffer, `texture_width × texture_height` RGBA8.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x as u32 >= self.width || y as u32 >= self.height {
            return None;
        }
        Some((x as usize + y as usize * self.width as usize) * 4)
    }

    pub fn pixel(&self, x: i32, y: i32) -> Option<[u8; 4]> {
        let i = self.index(x, y)?;
        let mut out = [0; 4];
        out.copy_from_slice(&self.pixels[i..i + 4]);
        Some(out)
    }

    /// Overwrite all four channels. Out-of-bounds writes are ignored and
    /// return `false`.
    pub fn paint_pixel(&mut self, x: i32, y: i32, rgba: [u8; 4]) -> bool {
        let Some(i) = self.index(x, y) else {
            return false;
        };
        self.pixels[i..i + 4].copy_from_slice(&rgba);
        true
    }

    /// Overwrite RGB and add to alpha, saturating at 255.
    pub fn add_pixel(&mut self, x: i32, y: i32, rgba: [u8; 4]) -> bool {
        let Some(i) = self.index(x, y) else {
            return false;
        };
        self.pixels[i..i + 3].copy_from_slice(&rgba[..3]);
        self.pixels[i + 3] = self.pixels[i + 3].saturating_add(rgba[3]);
        true
    }

    /// Finish painting and upload. Same as dropping the session.
    pub fn end(self) {}
}

impl Drop for PaintSession<'_> {
    fn drop(&mut self) {
        let pixels = std::mem::take(&mut self.pixels);
        self.renderer.end_paint(self.image, &pixels);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png(width: u32, height: u32, f: impl Fn(u32, u32) -> [u8; 4]) -> Vec<u8> {
        let img = image::RgbaImage::from_fn(width, height, |x, y| image::Rgba(f(x, y)));
        let mut out = std::io::Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn texture_dims_are_next_pow2() {
        for (w, h) in [(1, 1), (3, 5), (17, 64), (100, 33)] {
            let decoded = decode(&png(w, h, |_, _| [9, 9, 9, 255]), [0, 0, 0], 8192).unwrap();
            assert_eq!(decoded.texture_width, next_pow2(w));
            assert_eq!(decoded.texture_height, next_pow2(h));
            assert_eq!(decoded.pixels.len(), (decoded.texture_width * decoded.texture_height * 4) as usize);
        }
    }

    #[test]
    fn mask_color_becomes_transparent() {
        let bytes = png(4, 4, |x, _| if x % 2 == 0 { [255, 0, 255, 255] } else { [10, 20, 30, 200] });
        let decoded = decode(&bytes, [255, 0, 255], 8192).unwrap();
        for y in 0..4usize {
            for x in 0..4usize {
                let i = (y * 4 + x) * 4;
                let expected = if x % 2 == 0 { 0 } else { 200 };
                assert_eq!(decoded.pixels[i + 3], expected, "texel ({x},{y})");
            }
        }
    }

    #[test]
    fn padding_keeps_rows_aligned() {
        let decoded = prepare(3, 2, (0..24).collect(), Some([255, 255, 255])).unwrap();
        assert_eq!((decoded.texture_width, decoded.texture_height), (4, 2));
        // Row 1 starts at texel 4 of the padded buffer.
        assert_eq!(&decoded.pixels[16..20], &[12, 13, 14, 15]);
        // Padding texel is transparent black.
        assert_eq!(&decoded.pixels[12..16], &[0, 0, 0, 0]);
    }

    #[test]
    fn frame_grid_metrics() {
        let decoded = prepare(64, 32, vec![0; 64 * 32 * 4], Some([1, 2, 3])).unwrap();
        let image = Image::from_decoded(&decoded, Some((16, 16)), TextureId(1)).unwrap();
        assert_eq!(image.frame_count(), 8);
        assert_eq!(image.frames_per_row(), 4);
        assert_eq!(image.filter(), Filter::Nearest);
    }

    #[test]
    fn frame_zero_and_row_boundary() {
        let decoded = prepare(64, 32, vec![0; 64 * 32 * 4], Some([1, 2, 3])).unwrap();
        let image = Image::from_decoded(&decoded, Some((16, 16)), TextureId(1)).unwrap();
        assert_eq!(image.frame_source(0), SourceRect::new(0, 0, 16, 16));
        assert_eq!(image.frame_source(3), SourceRect::new(48, 0, 16, 16));
        assert_eq!(image.frame_source(4), SourceRect::new(0, 16, 16, 16));
        assert_eq!(image.frame_source(7), SourceRect::new(48, 16, 16, 16));
    }

    #[test]
    fn frame_index_wraps() {
        let decoded = prepare(32, 16, vec![0; 32 * 16 * 4], Some([1, 2, 3])).unwrap();
        let image = Image::from_decoded(&decoded, Some((16, 16)), TextureId(1)).unwrap();
        assert_eq!(image.frame_source(2), image.frame_source(0));
        assert_eq!(image.frame_source(5), image.frame_source(1));
    }

    #[test]
    fn unframed_image_is_single_frame() {
        let decoded = prepare(30, 20, vec![0; 30 * 20 * 4], Some([1, 2, 3])).unwrap();
        let image = Image::from_decoded(&decoded, None, TextureId(1)).unwrap();
        assert_eq!(image.frame_count(), 1);
        assert_eq!((image.frame_width(), image.frame_height()), (30, 20));
        assert_eq!(image.filter(), Filter::Linear);
        assert!((image.width_ratio() - 30.0 / 32.0).abs() < f32::EPSILON);
    }

    #[test]
    fn zero_frame_size_is_rejected() {
        let decoded = prepare(8, 8, vec![0; 8 * 8 * 4], Some([1, 2, 3])).unwrap();
        assert!(matches!(
            Image::from_decoded(&decoded, Some((0, 8)), TextureId(1)),
            Err(ImageError::BadFrameSize { .. })
        ));
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        assert!(matches!(decode(b"not an image", [0, 0, 0], 8192), Err(ImageError::Decode(_))));
    }

    #[test]
    fn padded_size_must_fit_the_limit() {
        assert!(check_size(1024, 1024, 1024).is_ok());
        assert!(check_size(600, 100, 1024).is_ok());
        assert!(matches!(
            check_size(1025, 1, 1024),
            Err(ImageError::TooLarge {
                width: 1025,
                height: 1,
                max: 1024
            })
        ));
        assert!(check_size(1, 20000, 8192).is_err());
    }

    #[test]
    fn decode_rejects_images_over_the_limit() {
        let bytes = png(40, 8, |_, _| [0, 0, 0, 255]);
        assert!(matches!(decode(&bytes, [0, 0, 0], 32), Err(ImageError::TooLarge { .. })));
    }

    #[test]
    fn huge_sizes_error_instead_of_overflowing() {
        assert!(matches!(
            prepare(u32::MAX, u32::MAX, Vec::new(), None),
            Err(ImageError::TooLarge { .. })
        ));
        assert!(matches!(prepare(0, 4, Vec::new(), None), Err(ImageError::BadFrameSize { .. })));
    }
}
