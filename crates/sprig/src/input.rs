//! Keyboard and mouse input state.
//!
//! [`Input`] tracks which keys/buttons are currently pressed, just pressed this
//! frame, or just released this frame. [`Keyboard`] layers the four key states
//! games usually ask about on top of it, plus a queue of typed characters.
//! [`Mouse`] keeps the cursor in window and screen coordinates.
//!
//! Updated by the window event handler; [`capture`](Keyboard::capture) is
//! called once per frame after the game has read the state.

use std::collections::{HashSet, VecDeque};
use std::hash::Hash;

use crate::math::Vec2;

/// Typed characters kept before the oldest are dropped.
pub const TYPED_CAPACITY: usize = 256;

pub use winit::event::MouseButton;
pub use winit::keyboard::KeyCode;

/// Tracks the state of a set of inputs (keys or mouse buttons).
///
/// - `pressed`: currently held down
/// - `just_pressed`: pressed this frame (not held last frame)
/// - `just_released`: released this frame
#[derive(Debug, Clone)]
pub struct Input<T: Eq + Hash + Copy> {
    pressed: HashSet<T>,
    just_pressed: HashSet<T>,
    just_released: HashSet<T>,
}

impl<T: Eq + Hash + Copy> Input<T> {
    pub fn new() -> Self {
        Self {
            pressed: HashSet::new(),
            just_pressed: HashSet::new(),
            just_released: HashSet::new(),
        }
    }

    /// Returns `true` if the input is currently held down.
    pub fn pressed(&self, input: T) -> bool {
        self.pressed.contains(&input)
    }

    /// Returns `true` if the input was pressed this frame.
    pub fn just_pressed(&self, input: T) -> bool {
        self.just_pressed.contains(&input)
    }

    /// Returns `true` if the input was released this frame.
    pub fn just_released(&self, input: T) -> bool {
        self.just_released.contains(&input)
    }

    /// Call when an input is pressed (from event handler).
    pub fn press(&mut self, input: T) {
        if self.pressed.insert(input) {
            self.just_pressed.insert(input);
        }
    }

    /// Call when an input is released (from event handler).
    pub fn release(&mut self, input: T) {
        if self.pressed.remove(&input) {
            self.just_released.insert(input);
        }
    }

    /// Clear per-frame state. Called at the end of each frame.
    pub fn clear_just(&mut self) {
        self.just_pressed.clear();
        self.just_released.clear();
    }
}

impl<T: Eq + Hash + Copy> Default for Input<T> {
    fn default() -> Self {
        Self::new()
    }
}

// ── Keyboard ────────────────────────────────────────────────────────────

/// The four states a key can be in during a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    /// Not held.
    Up,
    /// Went down this frame.
    Hit,
    /// Held for more than one frame.
    Down,
    /// Came up this frame.
    Released,
}

/// Per-frame keyboard state and typed-text queue.
#[derive(Debug, Clone, Default)]
pub struct Keyboard {
    keys: Input<KeyCode>,
    typed: VecDeque<char>,
}

impl Keyboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, key: KeyCode) -> KeyState {
        if self.keys.just_pressed(key) {
            KeyState::Hit
        } else if self.keys.just_released(key) {
            KeyState::Released
        } else if self.keys.pressed(key) {
            KeyState::Down
        } else {
            KeyState::Up
        }
    }

    /// Pressed this frame.
    pub fn key_hit(&self, key: KeyCode) -> bool {
        self.keys.just_pressed(key)
    }

    /// Held (including the frame it was hit).
    pub fn key_down(&self, key: KeyCode) -> bool {
        self.keys.pressed(key)
    }

    /// Not held.
    pub fn key_up(&self, key: KeyCode) -> bool {
        !self.keys.pressed(key)
    }

    /// Released this frame.
    pub fn key_released(&self, key: KeyCode) -> bool {
        self.keys.just_released(key)
    }

    pub fn press(&mut self, key: KeyCode) {
        self.keys.press(key);
    }

    pub fn release(&mut self, key: KeyCode) {
        self.keys.release(key);
    }

    /// Queue a typed character (from text input events). Once
    /// [`TYPED_CAPACITY`] characters are waiting, the oldest is dropped.
    pub fn push_char(&mut self, c: char) {
        if self.typed.len() >= TYPED_CAPACITY {
            self.typed.pop_front();
        }
        self.typed.push_back(c);
    }

    /// Pop the oldest typed character.
    pub fn get_char(&mut self) -> Option<char> {
        self.typed.pop_front()
    }

    pub fn has_input(&self) -> bool {
        !self.typed.is_empty()
    }

    /// Discard any queued characters.
    pub fn flush(&mut self) {
        self.typed.clear();
    }

    /// Advance to the next frame: hits become downs, releases become ups.
    pub fn capture(&mut self) {
        self.keys.clear_just();
    }
}

// ── Mouse ───────────────────────────────────────────────────────────────

/// Mouse cursor, buttons and wheel.
#[derive(Debug, Clone, Default)]
pub struct Mouse {
    buttons: Input<MouseButton>,
    /// Cursor in window-local pixels.
    position: Vec2,
    /// Window origin on the desktop, used to derive screen coordinates.
    window_origin: Vec2,
    wheel: f32,
}

impl Mouse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cursor position relative to the window's client area.
    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn x(&self) -> f32 {
        self.position.x
    }

    pub fn y(&self) -> f32 {
        self.position.y
    }

    /// Cursor position in desktop coordinates.
    pub fn screen_position(&self) -> Vec2 {
        self.window_origin + self.position
    }

    pub fn button_hit(&self, button: MouseButton) -> bool {
        self.buttons.just_pressed(button)
    }

    pub fn button_down(&self, button: MouseButton) -> bool {
        self.buttons.pressed(button)
    }

    pub fn button_released(&self, button: MouseButton) -> bool {
        self.buttons.just_released(button)
    }

    /// Wheel movement accumulated this frame, in lines.
    pub fn wheel(&self) -> f32 {
        self.wheel
    }

    pub fn set_position(&mut self, x: f32, y: f32) {
        self.position = Vec2::new(x, y);
    }

    pub fn set_window_origin(&mut self, x: f32, y: f32) {
        self.window_origin = Vec2::new(x, y);
    }

    pub fn press(&mut self, button: MouseButton) {
        self.buttons.press(button);
    }

    pub fn release(&mut self, button: MouseButton) {
        self.buttons.release(button);
    }

    pub fn scroll(&mut self, lines: f32) {
        self.wheel += lines;
    }

    pub fn capture(&mut self) {
        self.buttons.clear_just();
        self.wheel = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_walks_through_four_states() {
        let mut kb = Keyboard::new();
        assert_eq!(kb.state(KeyCode::Space), KeyState::Up);

        kb.press(KeyCode::Space);
        assert_eq!(kb.state(KeyCode::Space), KeyState::Hit);
        assert!(kb.key_down(KeyCode::Space));

        kb.capture();
        assert_eq!(kb.state(KeyCode::Space), KeyState::Down);
        assert!(!kb.key_hit(KeyCode::Space));

        kb.release(KeyCode::Space);
        assert_eq!(kb.state(KeyCode::Space), KeyState::Released);
        assert!(kb.key_up(KeyCode::Space));

        kb.capture();
        assert_eq!(kb.state(KeyCode::Space), KeyState::Up);
    }

    #[test]
    fn repeat_press_is_not_a_new_hit() {
        let mut kb = Keyboard::new();
        kb.press(KeyCode::KeyA);
        kb.capture();
        kb.press(KeyCode::KeyA);
        assert!(!kb.key_hit(KeyCode::KeyA));
    }

    #[test]
    fn typed_chars_queue_in_order() {
        let mut kb = Keyboard::new();
        kb.push_char('h');
        kb.push_char('i');
        assert!(kb.has_input());
        assert_eq!(kb.get_char(), Some('h'));
        kb.flush();
        assert_eq!(kb.get_char(), None);
    }

    #[test]
    fn undrained_chars_keep_the_newest() {
        let mut kb = Keyboard::new();
        let typed: Vec<char> = ('a'..='z').cycle().take(TYPED_CAPACITY + 10).collect();
        for &c in &typed {
            kb.push_char(c);
        }
        let mut drained = Vec::new();
        while let Some(c) = kb.get_char() {
            drained.push(c);
        }
        assert_eq!(drained.len(), TYPED_CAPACITY);
        assert_eq!(drained, typed[10..]);
    }

    #[test]
    fn mouse_screen_position_adds_window_origin() {
        let mut mouse = Mouse::new();
        mouse.set_window_origin(100.0, 50.0);
        mouse.set_position(10.0, 20.0);
        assert_eq!(mouse.screen_position(), Vec2::new(110.0, 70.0));
    }

    #[test]
    fn wheel_resets_on_capture() {
        let mut mouse = Mouse::new();
        mouse.scroll(1.0);
        mouse.scroll(2.0);
        assert_eq!(mouse.wheel(), 3.0);
        mouse.capture();
        assert_eq!(mouse.wheel(), 0.0);
    }
}
