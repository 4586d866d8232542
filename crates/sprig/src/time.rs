//! Frame timing and delta time.
//!
//! [`Time`] is owned by the [`Engine`](crate::game::Engine) and updated once at
//! the start of each frame. Screens read it to get frame delta time and total
//! elapsed time. [`Stopwatch`] is a millisecond timer for anything that ticks
//! on wall-clock time rather than frame time.

use std::time::{Duration, Instant};

/// Frame timing state.
#[derive(Debug, Clone, Copy)]
pub struct Time {
    /// When the game started.
    startup: Instant,
    /// When the current frame started.
    frame_start: Instant,
    /// Duration of the previous frame.
    delta: Duration,
    /// Total time since startup.
    elapsed: Duration,
    /// Frame counter.
    frame_count: u64,
    /// Frames counted since `fps_window_start`.
    fps_frames: u32,
    fps_window_start: Instant,
    fps: f32,
    paused: bool,
}

impl Time {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            startup: now,
            frame_start: now,
            delta: Duration::ZERO,
            elapsed: Duration::ZERO,
            frame_count: 0,
            fps_frames: 0,
            fps_window_start: now,
            fps: 0.0,
            paused: false,
        }
    }

    /// Call at the start of each frame to update timing.
    pub fn update(&mut self) {
        self.advance_to(Instant::now());
    }

    pub(crate) fn advance_to(&mut self, now: Instant) {
        self.delta = now.saturating_duration_since(self.frame_start);
        self.frame_start = now;
        self.elapsed = now.saturating_duration_since(self.startup);
        self.frame_count += 1;

        self.fps_frames += 1;
        let window = now.saturating_duration_since(self.fps_window_start);
        if window >= Duration::from_secs(1) {
            self.fps = self.fps_frames as f32 / window.as_secs_f32();
            self.fps_frames = 0;
            self.fps_window_start = now;
        }
    }

    /// Duration of the previous frame. Zero while paused.
    pub fn delta(&self) -> Duration {
        if self.paused { Duration::ZERO } else { self.delta }
    }

    /// Delta time in seconds (f32), the most common way to use it.
    pub fn delta_secs(&self) -> f32 {
        self.delta().as_secs_f32()
    }

    /// Total elapsed time since startup.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Total elapsed time in seconds (f32).
    pub fn elapsed_secs(&self) -> f32 {
        self.elapsed.as_secs_f32()
    }

    /// Number of frames so far.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Frames per second, averaged over the last full second.
    pub fn fps(&self) -> f32 {
        self.fps
    }

    pub fn paused(&self) -> bool {
        self.paused
    }

    /// While paused, [`delta`](Self::delta) reports zero so updates freeze.
    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }
}

impl Default for Time {
    fn default() -> Self {
        Self::new()
    }
}

/// Millisecond wall-clock timer.
#[derive(Debug, Clone, Copy)]
pub struct Stopwatch {
    start: Instant,
}

impl Stopwatch {
    /// Create a stopwatch that starts counting immediately.
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Time since the last (re)start.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Milliseconds since the last (re)start.
    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed().as_millis() as u64
    }

    /// Reset to zero, returning the time that had elapsed.
    pub fn restart(&mut self) -> Duration {
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(self.start);
        self.start = now;
        elapsed
    }
}

impl Default for Stopwatch {
    fn default() -> Self {
        Self::start()
    }
}
