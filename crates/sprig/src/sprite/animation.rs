//! Frame tickers for sprite sheets.
//!
//! An [`Animation`] walks a frame index from `start` to `end` in steps of
//! `skip`, one step per `tick`, wrapping back to `start` after `end`. It knows
//! nothing about images; the frame index is handed to
//! [`Renderer::draw_image_frame`](crate::render::Renderer::draw_image_frame).
//!
//! Two ways to drive it:
//!
//! - [`advance`](Animation::advance) with the frame's delta time. This is what
//!   [`Sprite::update`](super::Sprite::update) does, and is deterministic.
//! - [`update`](Animation::update), which polls an internal wall-clock
//!   stopwatch.
//!
//! Either way at most one step is taken per call, and the tick clock resets
//! when it fires, so a long stall advances a single frame rather than
//! catching up.

use std::time::Duration;

use crate::time::Stopwatch;

#[derive(Debug, Clone)]
pub struct Animation {
    start: u32,
    end: u32,
    frame: u32,
    skip: u32,
    tick: Duration,
    accumulated: Duration,
    clock: Stopwatch,
}

impl Default for Animation {
    /// A single still frame, 0.
    fn default() -> Self {
        Self::new(0, 0, 0)
    }
}

impl Animation {
    /// Loop frames `start..=end`, one step every `tick_ms` milliseconds.
    pub fn new(start: u32, end: u32, tick_ms: u64) -> Self {
        Self {
            start,
            end: end.max(start),
            frame: start,
            skip: 1,
            tick: Duration::from_millis(tick_ms),
            accumulated: Duration::ZERO,
            clock: Stopwatch::start(),
        }
    }

    /// Advance `skip` frames per tick instead of one.
    pub fn with_skip(mut self, skip: u32) -> Self {
        self.skip = skip.max(1);
        self
    }

    pub fn frame(&self) -> u32 {
        self.frame
    }

    pub fn start(&self) -> u32 {
        self.start
    }

    pub fn end(&self) -> u32 {
        self.end
    }

    pub fn skip(&self) -> u32 {
        self.skip
    }

    pub fn tick(&self) -> Duration {
        self.tick
    }

    /// Jump to `frame`, clamped to the animation's range.
    pub fn set_frame(&mut self, frame: u32) {
        self.frame = frame.clamp(self.start, self.end);
    }

    /// Back to the first frame with a fresh tick clock.
    pub fn reset(&mut self) {
        self.frame = self.start;
        self.accumulated = Duration::ZERO;
        self.clock.restart();
    }

    fn step(&mut self) {
        self.frame += self.skip;
        if self.frame > self.end {
            self.frame = self.start;
        }
    }

    /// Add `dt` to the tick clock and step if a tick has passed. Returns
    /// whether the frame changed.
    pub fn advance(&mut self, dt: Duration) -> bool {
        self.accumulated = self.accumulated.saturating_add(dt);
        if self.accumulated < self.tick {
            return false;
        }
        self.accumulated = Duration::ZERO;
        self.step();
        true
    }

    /// Step if a tick has passed on the wall clock since the last step.
    pub fn update(&mut self) -> bool {
        if self.clock.elapsed() < self.tick {
            return false;
        }
        self.clock.restart();
        self.step();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn huge_steps_saturate() {
        let mut anim = Animation::new(0, 3, 100);
        assert!(anim.advance(Duration::MAX));
        assert!(anim.advance(Duration::MAX));
        assert_eq!(anim.frame(), 2);
    }

    #[test]
    fn polling_every_50ms_for_250ms() {
        let mut anim = Animation::new(0, 3, 100);
        for _ in 0..5 {
            anim.advance(Duration::from_millis(50));
        }
        assert_eq!(anim.frame(), 2);
    }

    #[test]
    fn wraps_to_start_after_end() {
        let mut anim = Animation::new(2, 4, 10);
        let frames: Vec<u32> = (0..4)
            .map(|_| {
                anim.advance(Duration::from_millis(10));
                anim.frame()
            })
            .collect();
        assert_eq!(frames, vec![3, 4, 2, 3]);
    }

    #[test]
    fn skip_overshooting_end_wraps() {
        let mut anim = Animation::new(0, 4, 10).with_skip(3);
        anim.advance(Duration::from_millis(10));
        assert_eq!(anim.frame(), 3);
        anim.advance(Duration::from_millis(10));
        assert_eq!(anim.frame(), 0);
    }

    #[test]
    fn long_stall_steps_once() {
        let mut anim = Animation::new(0, 9, 10);
        assert!(anim.advance(Duration::from_secs(1)));
        assert_eq!(anim.frame(), 1);
    }

    #[test]
    fn frame_stays_in_range() {
        let mut anim = Animation::new(5, 8, 1);
        anim.set_frame(100);
        assert_eq!(anim.frame(), 8);
        anim.set_frame(0);
        assert_eq!(anim.frame(), 5);
        anim.reset();
        assert_eq!(anim.frame(), 5);
    }

    #[test]
    fn default_is_still() {
        let mut anim = Animation::default();
        for _ in 0..3 {
            anim.advance(Duration::from_millis(16));
            anim.update();
        }
        assert_eq!(anim.frame(), 0);
    }

    #[test]
    fn wall_clock_update_fires_after_tick() {
        let mut anim = Animation::new(0, 3, 0);
        assert!(anim.update());
        assert_eq!(anim.frame(), 1);
    }
}
