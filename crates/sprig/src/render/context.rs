//! Per-surface render state.
//!
//! A [`Context`] is a plain snapshot of everything that affects how the next
//! draw call looks: surface size, viewport, colors, the 2D transform applied
//! to each quad, and the blend mode. The [`Renderer`](super::Renderer) owns
//! one per window (or headless surface) and reads the current one whenever it
//! builds geometry.

use serde::{Deserialize, Serialize};

use crate::math::Vec2;

/// An 8-bit RGB triple.
pub type Rgb = [u8; 3];

/// How incoming fragments combine with what is already in the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BlendMode {
    /// `src × src.a + dst × (1 − src.a)`.
    #[default]
    Alpha,
    /// Blending disabled; source replaces destination.
    Solid,
    /// Additive: `src × src.a + dst`.
    Light,
    /// Multiplicative darken: `src × dst`.
    Dark,
    /// Same as [`Solid`](Self::Solid).
    None,
}

impl BlendMode {
    /// The wgpu blend state for this mode, `None` meaning blending disabled.
    ///
    /// The same factors apply to the color and alpha channels.
    pub(crate) fn blend_state(self) -> Option<wgpu::BlendState> {
        let component = |src_factor, dst_factor| wgpu::BlendComponent {
            src_factor,
            dst_factor,
            operation: wgpu::BlendOperation::Add,
        };
        let both = |c: wgpu::BlendComponent| wgpu::BlendState { color: c, alpha: c };

        match self {
            BlendMode::Alpha => Some(both(component(
                wgpu::BlendFactor::SrcAlpha,
                wgpu::BlendFactor::OneMinusSrcAlpha,
            ))),
            BlendMode::Light => Some(both(component(
                wgpu::BlendFactor::SrcAlpha,
                wgpu::BlendFactor::One,
            ))),
            BlendMode::Dark => Some(both(component(
                wgpu::BlendFactor::Dst,
                wgpu::BlendFactor::Zero,
            ))),
            BlendMode::Solid | BlendMode::None => None,
        }
    }
}

/// A rectangle of the surface in pixels, origin top-left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub const fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }

    /// Clamp to a `width × height` surface, returning `(x, y, w, h)`.
    ///
    /// A viewport entirely outside the surface clamps to an empty rect.
    pub(crate) fn clamp_to(self, width: u32, height: u32) -> (u32, u32, u32, u32) {
        let x0 = self.x.clamp(0, width as i32) as u32;
        let y0 = self.y.clamp(0, height as i32) as u32;
        let x1 = (self.x as i64 + self.width as i64).clamp(0, width as i64) as u32;
        let y1 = (self.y as i64 + self.height as i64).clamp(0, height as i64) as u32;
        (x0, y0, x1.saturating_sub(x0), y1.saturating_sub(y0))
    }
}

/// Render state for one surface.
#[derive(Debug, Clone, PartialEq)]
pub struct Context {
    width: u32,
    height: u32,
    viewport: Viewport,
    draw_color: Rgb,
    /// Stored as 0–255, exposed as 0.0–1.0.
    alpha: u8,
    clear_color: Rgb,
    mask_color: Rgb,
    offset: Vec2,
    origin: Vec2,
    scale: Vec2,
    rotation: f32,
    blend: BlendMode,
}

impl Context {
    pub const DEFAULT_CLEAR_COLOR: Rgb = [100, 100, 200];
    pub const DEFAULT_DRAW_COLOR: Rgb = [255, 255, 255];

    /// A context with the default render state: alpha blending, white draw
    /// color at full alpha, no offset or rotation, unit scale.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            viewport: Viewport::full(width, height),
            draw_color: Self::DEFAULT_DRAW_COLOR,
            alpha: 255,
            clear_color: Self::DEFAULT_CLEAR_COLOR,
            mask_color: [0, 0, 0],
            offset: Vec2::ZERO,
            origin: Vec2::ZERO,
            scale: Vec2::ONE,
            rotation: 0.0,
            blend: BlendMode::Alpha,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Change the surface size. The viewport resets to the full surface.
    pub(crate) fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.viewport = Viewport::full(width, height);
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    /// The scissor rect to apply, or `None` when the viewport covers the whole
    /// surface and clipping can be skipped.
    pub fn scissor(&self) -> Option<Viewport> {
        (self.viewport != Viewport::full(self.width, self.height)).then_some(self.viewport)
    }

    pub fn draw_color(&self) -> Rgb {
        self.draw_color
    }

    pub fn set_draw_color(&mut self, r: u8, g: u8, b: u8) {
        self.draw_color = [r, g, b];
    }

    /// Draw alpha in 0.0–1.0.
    pub fn alpha(&self) -> f32 {
        self.alpha as f32 / 255.0
    }

    /// Set draw alpha from 0.0–1.0. Stored truncated to 8 bits.
    pub fn set_alpha(&mut self, alpha: f32) {
        self.alpha = (alpha * 255.0) as u8;
    }

    pub fn clear_color(&self) -> Rgb {
        self.clear_color
    }

    pub fn set_clear_color(&mut self, r: u8, g: u8, b: u8) {
        self.clear_color = [r, g, b];
    }

    /// Chroma key applied to images loaded while this context is current.
    pub fn mask_color(&self) -> Rgb {
        self.mask_color
    }

    pub fn set_mask_color(&mut self, r: u8, g: u8, b: u8) {
        self.mask_color = [r, g, b];
    }

    /// Pivot as a fraction of the drawn size, applied before rotation.
    /// `(-0.5, -0.5)` draws centered on the position.
    pub fn offset(&self) -> Vec2 {
        self.offset
    }

    pub fn set_offset(&mut self, x: f32, y: f32) {
        self.offset = Vec2::new(x, y);
    }

    /// Translation added to every draw position.
    pub fn origin(&self) -> Vec2 {
        self.origin
    }

    pub fn set_origin(&mut self, x: f32, y: f32) {
        self.origin = Vec2::new(x, y);
    }

    pub fn scale(&self) -> Vec2 {
        self.scale
    }

    pub fn set_scale(&mut self, x: f32, y: f32) {
        self.scale = Vec2::new(x, y);
    }

    /// Rotation in radians.
    pub fn rotation(&self) -> f32 {
        self.rotation
    }

    pub fn set_rotation(&mut self, radians: f32) {
        self.rotation = radians;
    }

    pub fn blend(&self) -> BlendMode {
        self.blend
    }

    pub fn set_blend(&mut self, mode: BlendMode) {
        self.blend = mode;
    }

    /// Copy draw color, alpha, offset, scale and rotation from `saved`.
    pub(crate) fn restore_draw_state(&mut self, saved: &Context) {
        self.draw_color = saved.draw_color;
        self.alpha = saved.alpha;
        self.offset = saved.offset;
        self.scale = saved.scale;
        self.rotation = saved.rotation;
    }

    /// Draw color and alpha as a normalized vertex tint.
    pub(crate) fn tint(&self) -> [f32; 4] {
        let [r, g, b] = self.draw_color;
        [
            r as f32 / 255.0,
            g as f32 / 255.0,
            b as f32 / 255.0,
            self.alpha as f32 / 255.0,
        ]
    }

    /// Clear color as a wgpu color.
    pub(crate) fn clear_wgpu(&self) -> wgpu::Color {
        let [r, g, b] = self.clear_color;
        wgpu::Color {
            r: r as f64 / 255.0,
            g: g as f64 / 255.0,
            b: b as f64 / 255.0,
            a: 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let ctx = Context::new(640, 480);
        assert_eq!(ctx.blend(), BlendMode::Alpha);
        assert_eq!(ctx.clear_color(), [100, 100, 200]);
        assert_eq!(ctx.draw_color(), [255, 255, 255]);
        assert_eq!(ctx.alpha(), 1.0);
        assert_eq!(ctx.offset(), Vec2::ZERO);
        assert_eq!(ctx.scale(), Vec2::ONE);
        assert_eq!(ctx.viewport(), Viewport::full(640, 480));
    }

    #[test]
    fn alpha_round_trips_through_bytes() {
        let mut ctx = Context::new(1, 1);
        ctx.set_alpha(0.5);
        assert_eq!(ctx.alpha, 127);
        assert!((ctx.alpha() - 127.0 / 255.0).abs() < f32::EPSILON);
        ctx.set_alpha(2.0);
        assert_eq!(ctx.alpha(), 1.0);
        ctx.set_alpha(-1.0);
        assert_eq!(ctx.alpha(), 0.0);
    }

    #[test]
    fn scissor_only_for_partial_viewport() {
        let mut ctx = Context::new(320, 240);
        assert!(ctx.scissor().is_none());
        let partial = Viewport {
            x: 10,
            y: 20,
            width: 100,
            height: 240,
        };
        ctx.set_viewport(partial);
        assert_eq!(ctx.scissor(), Some(partial));
        ctx.set_viewport(Viewport::full(320, 240));
        assert!(ctx.scissor().is_none());
    }

    #[test]
    fn resize_resets_viewport() {
        let mut ctx = Context::new(320, 240);
        ctx.set_viewport(Viewport::full(10, 10));
        ctx.resize(64, 32);
        assert_eq!(ctx.size(), (64, 32));
        assert!(ctx.scissor().is_none());
    }

    #[test]
    fn viewport_clamps_to_surface() {
        let vp = Viewport {
            x: -10,
            y: 5,
            width: 50,
            height: 500,
        };
        assert_eq!(vp.clamp_to(100, 100), (0, 5, 40, 95));
    }

    #[test]
    fn blend_modes_map_to_factors() {
        assert!(BlendMode::Solid.blend_state().is_none());
        assert!(BlendMode::None.blend_state().is_none());
        let light = BlendMode::Light.blend_state().unwrap();
        assert_eq!(light.color.dst_factor, wgpu::BlendFactor::One);
        let dark = BlendMode::Dark.blend_state().unwrap();
        assert_eq!(dark.color.src_factor, wgpu::BlendFactor::Dst);
        assert_eq!(dark.color.dst_factor, wgpu::BlendFactor::Zero);
    }
}
