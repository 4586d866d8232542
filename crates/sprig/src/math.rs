//! Math types and glam re-exports.
//!
//! We re-export [glam](https://docs.rs/glam) types so users don't need to
//! depend on it directly. `Vec2`/`Vec3` already provide length, dot, cross and
//! normalization; the free functions here cover the handful of operations the
//! renderer and sprites need that glam spells differently (or not at all).

pub use glam::{Mat4, UVec2, Vec2, Vec3, Vec4};

/// Values with a magnitude below this are treated as zero by [`is_zero`].
pub const ZERO_EPSILON: f32 = 0.0001;

/// Rotate a point about the origin by `radians`.
///
/// `x' = cos·x − sin·y`, `y' = sin·x + cos·y`. With y pointing down (screen
/// space) a positive angle turns clockwise.
pub fn rotate(v: Vec2, radians: f32) -> Vec2 {
    let (sin, cos) = radians.sin_cos();
    Vec2::new(cos * v.x - sin * v.y, sin * v.x + cos * v.y)
}

/// Heading of a vector, measured as `π − atan2(y, x)`.
pub fn angle(v: Vec2) -> f32 {
    std::f32::consts::PI - v.y.atan2(v.x)
}

/// Angle of the line from `to` back to `from`, i.e. `atan2(from − to)`.
///
/// Handy for turning a sprite to face a target.
pub fn angle_to(from: Vec2, to: Vec2) -> f32 {
    (from.y - to.y).atan2(from.x - to.x)
}

/// Euclidean distance between two points.
pub fn distance(a: Vec2, b: Vec2) -> f32 {
    a.distance(b)
}

/// `true` if every component is within [`ZERO_EPSILON`] of zero.
pub fn is_zero(v: Vec2) -> bool {
    v.x.abs() < ZERO_EPSILON && v.y.abs() < ZERO_EPSILON
}

/// Smallest power of two that is `>= n`. Returns 1 for 0 and saturates at
/// 2^31 for larger `n`.
pub fn next_pow2(n: u32) -> u32 {
    n.max(1).checked_next_power_of_two().unwrap_or(1 << 31)
}

/// A rectangle in pixel space, used to pick a sub-region of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceRect {
    pub u: u32,
    pub v: u32,
    pub s: u32,
    pub t: u32,
}

impl SourceRect {
    pub const fn new(u: u32, v: u32, s: u32, t: u32) -> Self {
        Self { u, v, s, t }
    }

    /// Normalize against the texture's dimensions, returning `(min, max)` UVs.
    pub fn to_uv(self, tex_w: u32, tex_h: u32) -> (Vec2, Vec2) {
        let tw = tex_w.max(1) as f32;
        let th = tex_h.max(1) as f32;
        (
            Vec2::new(self.u as f32 / tw, self.v as f32 / th),
            Vec2::new((self.u + self.s) as f32 / tw, (self.v + self.t) as f32 / th),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Vec2, b: Vec2) -> bool {
        (a - b).length() < 1e-5
    }

    #[test]
    fn rotate_quarter_turn() {
        let r = rotate(Vec2::new(1.0, 0.0), std::f32::consts::FRAC_PI_2);
        assert!(close(r, Vec2::new(0.0, 1.0)));
    }

    #[test]
    fn rotate_zero_is_identity() {
        let v = Vec2::new(3.5, -2.0);
        assert_eq!(rotate(v, 0.0), v);
    }

    #[test]
    fn next_pow2_values() {
        assert_eq!(next_pow2(0), 1);
        assert_eq!(next_pow2(1), 1);
        assert_eq!(next_pow2(3), 4);
        assert_eq!(next_pow2(64), 64);
        assert_eq!(next_pow2(100), 128);
        assert_eq!(next_pow2(513), 1024);
    }

    #[test]
    fn next_pow2_saturates() {
        assert_eq!(next_pow2(1 << 31), 1 << 31);
        assert_eq!(next_pow2((1 << 31) + 1), 1 << 31);
        assert_eq!(next_pow2(u32::MAX), 1 << 31);
    }

    #[test]
    fn next_pow2_is_smallest_covering_power() {
        for n in 1..2000u32 {
            let p = next_pow2(n);
            assert!(p.is_power_of_two());
            assert!(p >= n);
            assert!(p / 2 < n);
        }
    }

    #[test]
    fn angle_to_points_back_at_source() {
        let a = angle_to(Vec2::new(10.0, 0.0), Vec2::ZERO);
        assert!(a.abs() < 1e-6);
        let b = angle_to(Vec2::ZERO, Vec2::new(10.0, 0.0));
        assert!((b - std::f32::consts::PI).abs() < 1e-6);
    }

    #[test]
    fn is_zero_uses_epsilon() {
        assert!(is_zero(Vec2::new(0.00005, -0.00005)));
        assert!(!is_zero(Vec2::new(0.001, 0.0)));
    }

    #[test]
    fn source_rect_uv() {
        let (min, max) = SourceRect::new(32, 0, 32, 16).to_uv(128, 64);
        assert_eq!(min, Vec2::new(0.25, 0.0));
        assert_eq!(max, Vec2::new(0.5, 0.25));
    }
}
