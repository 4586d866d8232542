//! A drawable entity: an image reference plus a transform and an animation.

use std::time::Duration;

use crate::math::Vec2;
use crate::render::{ImageHandle, Renderer, Rgb};

use super::Animation;

#[derive(Debug, Clone)]
pub struct Sprite {
    image: ImageHandle,
    /// Frame size of `image`, copied at creation for collision tests.
    frame_size: (u32, u32),
    position: Vec2,
    velocity: Vec2,
    color: Rgb,
    alpha: f32,
    rotation: f32,
    scale: Vec2,
    offset: Vec2,
    z: i32,
    animation: Animation,
}

impl Sprite {
    /// A sprite of `image`, whose frames are `frame_size`, at `(x, y)`.
    pub fn new(image: ImageHandle, frame_size: (u32, u32), x: f32, y: f32) -> Self {
        Self {
            image,
            frame_size,
            position: Vec2::new(x, y),
            velocity: Vec2::ZERO,
            color: [255, 255, 255],
            alpha: 1.0,
            rotation: 0.0,
            scale: Vec2::ONE,
            offset: Vec2::ZERO,
            z: 0,
            animation: Animation::default(),
        }
    }

    /// A sprite of an image loaded into `renderer`. `None` if the handle is
    /// unknown.
    pub fn from_image(renderer: &Renderer, image: ImageHandle, x: f32, y: f32) -> Option<Self> {
        let img = renderer.image(image)?;
        Some(Self::new(image, (img.frame_width(), img.frame_height()), x, y))
    }

    pub fn with_z(mut self, z: i32) -> Self {
        self.z = z;
        self
    }

    pub fn with_animation(mut self, animation: Animation) -> Self {
        self.animation = animation;
        self
    }

    pub fn image(&self) -> ImageHandle {
        self.image
    }

    pub fn x(&self) -> f32 {
        self.position.x
    }

    pub fn y(&self) -> f32 {
        self.position.y
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn set_position(&mut self, x: f32, y: f32) {
        self.position = Vec2::new(x, y);
    }

    /// Pixels per second.
    pub fn velocity(&self) -> Vec2 {
        self.velocity
    }

    pub fn set_velocity(&mut self, x: f32, y: f32) {
        self.velocity = Vec2::new(x, y);
    }

    /// Frame width of the image.
    pub fn width(&self) -> u32 {
        self.frame_size.0
    }

    pub fn height(&self) -> u32 {
        self.frame_size.1
    }

    /// Draw order within a layer, applied by
    /// [`SpriteManager::sort_layer`](super::SpriteManager::sort_layer).
    pub fn z(&self) -> i32 {
        self.z
    }

    pub fn set_z(&mut self, z: i32) {
        self.z = z;
    }

    pub fn color(&self) -> Rgb {
        self.color
    }

    pub fn set_color(&mut self, r: u8, g: u8, b: u8) {
        self.color = [r, g, b];
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn set_alpha(&mut self, alpha: f32) {
        self.alpha = alpha;
    }

    /// Radians.
    pub fn rotation(&self) -> f32 {
        self.rotation
    }

    pub fn set_rotation(&mut self, radians: f32) {
        self.rotation = radians;
    }

    pub fn rotate(&mut self, radians: f32) {
        self.rotation += radians;
    }

    pub fn scale(&self) -> Vec2 {
        self.scale
    }

    pub fn set_scale(&mut self, x: f32, y: f32) {
        self.scale = Vec2::new(x, y);
    }

    pub fn offset(&self) -> Vec2 {
        self.offset
    }

    /// Pivot as a fraction of the frame size; `(-0.5, -0.5)` centers the
    /// sprite on its position.
    pub fn set_offset(&mut self, x: f32, y: f32) {
        self.offset = Vec2::new(x, y);
    }

    pub fn animation(&self) -> &Animation {
        &self.animation
    }

    pub fn animation_mut(&mut self) -> &mut Animation {
        &mut self.animation
    }

    pub fn frame(&self) -> u32 {
        self.animation.frame()
    }

    /// Draw the current frame with this sprite's transform. The renderer's
    /// draw color, alpha, rotation, scale and offset are left as they were.
    pub fn render(&self, renderer: &mut Renderer) {
        let Some(saved) = renderer.context().cloned() else {
            return;
        };

        renderer.set_rotation(self.rotation);
        renderer.set_scale(self.scale.x, self.scale.y);
        renderer.set_offset(self.offset.x, self.offset.y);
        let [r, g, b] = self.color;
        renderer.set_draw_color(r, g, b);
        renderer.set_draw_alpha(self.alpha);

        renderer.draw_image_frame(self.image, self.position.x, self.position.y, self.animation.frame());

        if let Some(ctx) = renderer.context_mut() {
            ctx.restore_draw_state(&saved);
        }
    }

    /// Axis-aligned overlap of the two frame rectangles. Touching edges do
    /// not count.
    pub fn collide(&self, other: &Sprite) -> bool {
        let (w, h) = (self.width() as f32, self.height() as f32);
        let (ow, oh) = (other.width() as f32, other.height() as f32);
        other.x() < self.x() + w
            && other.x() + ow > self.x()
            && other.y() + oh > self.y()
            && other.y() < self.y() + h
    }

    /// Move by velocity × `delta` seconds and advance the animation.
    /// Non-finite deltas are ignored.
    pub fn update(&mut self, delta: f32) {
        if !delta.is_finite() {
            log::warn!("Sprite::update: ignoring delta {delta}");
            return;
        }
        self.position += self.velocity * delta;
        let dt = Duration::try_from_secs_f32(delta.max(0.0)).unwrap_or(Duration::MAX);
        self.animation.advance(dt);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::BlendMode;

    fn at(x: f32, y: f32) -> Sprite {
        Sprite::new(ImageHandle(0), (32, 32), x, y)
    }

    #[test]
    fn overlapping_sprites_collide() {
        assert!(at(0.0, 0.0).collide(&at(16.0, 16.0)));
        assert!(at(16.0, 16.0).collide(&at(0.0, 0.0)));
    }

    #[test]
    fn touching_edges_do_not_collide() {
        assert!(!at(0.0, 0.0).collide(&at(32.0, 32.0)));
        assert!(!at(0.0, 0.0).collide(&at(32.0, 0.0)));
        assert!(!at(0.0, 0.0).collide(&at(0.0, -32.0)));
    }

    #[test]
    fn update_integrates_velocity_and_animates() {
        let mut s = at(10.0, 10.0).with_animation(Animation::new(0, 3, 100));
        s.set_velocity(20.0, -10.0);
        s.update(0.5);
        assert_eq!(s.position(), Vec2::new(20.0, 5.0));
        assert_eq!(s.frame(), 1);
    }

    #[test]
    fn extreme_deltas_do_not_panic() {
        let mut s = at(10.0, 10.0).with_animation(Animation::new(0, 3, 100));
        s.set_velocity(1.0, 1.0);
        s.update(f32::INFINITY);
        s.update(f32::NAN);
        assert_eq!(s.position(), Vec2::new(10.0, 10.0));
        assert_eq!(s.frame(), 0);

        s.update(1e30);
        assert_eq!(s.frame(), 1);
        s.update(1e30);
        assert_eq!(s.frame(), 2);
    }

    #[test]
    fn render_leaves_renderer_state_untouched() {
        let mut r = Renderer::new();
        r.add_headless_context(320, 240);
        let img = r.create_image(32, 32).unwrap();
        r.set_draw_color(1, 2, 3);
        r.set_draw_alpha(0.5);
        r.set_offset(0.25, 0.25);
        r.set_scale(3.0, 3.0);
        r.set_rotation(1.0);
        r.set_blend(BlendMode::Light);
        let before = r.context().cloned().unwrap();

        let mut sprite = Sprite::from_image(&r, img, 100.0, 50.0).unwrap();
        sprite.set_color(255, 0, 0);
        sprite.set_offset(-0.5, -0.5);
        sprite.render(&mut r);

        assert_eq!(r.context().cloned().unwrap(), before);
        let v = &r.pending().vertices[0];
        assert_eq!(v.color, [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(v.position, [84.0, 34.0]);
    }

    #[test]
    fn rotate_accumulates() {
        let mut s = at(0.0, 0.0);
        s.rotate(0.5);
        s.rotate(0.25);
        assert_eq!(s.rotation(), 0.75);
    }
}
