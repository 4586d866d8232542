//! Screens, the engine bundle and the game builder.
//!
//! A game is a set of named [`Screen`]s (title, level, game over, ...). One is
//! current at a time; [`Engine::change_screen`] asks for another, and the
//! switch happens at the end of the frame: the old screen's `trans_out` and
//! `unload` run, then the new screen's `load` and `trans_in`.
//!
//! # Example
//!
//! ```ignore
//! use sprig::prelude::*;
//!
//! struct Title;
//!
//! impl Screen for Title {
//!     fn update(&mut self, engine: &mut Engine, _delta: f32) {
//!         if engine.keyboard.key_hit(KeyCode::Enter) {
//!             engine.change_screen("level");
//!         }
//!     }
//! }
//!
//! fn main() -> Result<(), GameError> {
//!     Game::new("Demo")
//!         .size(640, 480)
//!         .search_path("assets")
//!         .screen("title", Title)
//!         .screen("level", Level::default())
//!         .start("title")
//!         .run()
//! }
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::fs::FileManager;
use crate::input::{Keyboard, Mouse};
use crate::render::{ContextId, Renderer, Rgb};
use crate::time::Time;

// ── Errors ──────────────────────────────────────────────────────────────

/// Errors that stop a game from starting.
#[derive(Debug)]
pub enum GameError {
    /// The windowing event loop could not be created or failed while running.
    EventLoop(String),
    /// The game configuration could not be read or parsed.
    Config(String),
}

impl fmt::Display for GameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameError::EventLoop(e) => write!(f, "event loop error: {e}"),
            GameError::Config(e) => write!(f, "config error: {e}"),
        }
    }
}

impl std::error::Error for GameError {}

// ── Config ──────────────────────────────────────────────────────────────

/// Window and engine settings. Missing fields in a JSON file take their
/// defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub vsync: bool,
    pub clear_color: Rgb,
    /// Chroma key for images loaded by screens.
    pub mask_color: Rgb,
    pub search_paths: Vec<PathBuf>,
    pub start_screen: Option<String>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            title: "sprig".into(),
            width: 640,
            height: 480,
            vsync: true,
            clear_color: [100, 100, 200],
            mask_color: [0, 0, 0],
            search_paths: Vec::new(),
            start_screen: None,
        }
    }
}

impl GameConfig {
    pub fn from_json_str(json: &str) -> Result<Self, GameError> {
        serde_json::from_str(json).map_err(|e| GameError::Config(e.to_string()))
    }

    /// Read a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, GameError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| GameError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&json)
    }
}

// ── Engine ──────────────────────────────────────────────────────────────

/// Everything a screen works with.
pub struct Engine {
    pub renderer: Renderer,
    pub files: FileManager,
    pub keyboard: Keyboard,
    pub mouse: Mouse,
    pub time: Time,
    #[cfg(feature = "audio")]
    pub audio: Option<crate::audio::AudioPlayer>,
    /// The window's context, once the window exists.
    pub(crate) window_context: Option<ContextId>,
    next_screen: Option<String>,
    quit: bool,
}

impl Engine {
    pub fn new(files: FileManager) -> Self {
        Self {
            renderer: Renderer::new(),
            files,
            keyboard: Keyboard::new(),
            mouse: Mouse::new(),
            time: Time::new(),
            #[cfg(feature = "audio")]
            audio: None,
            window_context: None,
            next_screen: None,
            quit: false,
        }
    }

    /// An engine drawing into a windowless context, for tools and tests.
    pub fn headless(width: u32, height: u32) -> Self {
        let mut engine = Self::new(FileManager::new());
        engine.window_context = Some(engine.renderer.add_headless_context(width, height));
        engine
    }

    /// The context of the game window.
    pub fn window_context(&self) -> Option<ContextId> {
        self.window_context
    }

    /// Switch to the named screen at the end of this frame.
    pub fn change_screen(&mut self, name: &str) {
        self.next_screen = Some(name.to_owned());
    }

    pub(crate) fn take_next_screen(&mut self) -> Option<String> {
        self.next_screen.take()
    }

    /// Freeze updates: screens get a zero delta until [`resume`](Self::resume).
    pub fn pause(&mut self) {
        self.time.set_paused(true);
    }

    pub fn resume(&mut self) {
        self.time.set_paused(false);
    }

    pub fn paused(&self) -> bool {
        self.time.paused()
    }

    /// Close the window after this frame.
    pub fn quit(&mut self) {
        self.quit = true;
    }

    pub fn quitting(&self) -> bool {
        self.quit
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("window_context", &self.window_context)
            .field("next_screen", &self.next_screen)
            .field("quit", &self.quit)
            .finish_non_exhaustive()
    }
}

// ── Screens ─────────────────────────────────────────────────────────────

/// One state of the game. Every method has an empty default.
pub trait Screen {
    /// Load images, fonts and sounds. Called when the screen becomes current.
    fn load(&mut self, _engine: &mut Engine) {}

    /// Release what `load` created.
    fn unload(&mut self, _engine: &mut Engine) {}

    /// `delta` is in seconds, zero while the engine is paused.
    fn update(&mut self, _engine: &mut Engine, _delta: f32) {}

    /// Draw. The window has already been cleared.
    fn render(&mut self, _engine: &mut Engine) {}

    /// Called after `load`, e.g. to start a [`Fade`] in.
    fn trans_in(&mut self, _engine: &mut Engine) {}

    /// Called before `unload`.
    fn trans_out(&mut self, _engine: &mut Engine) {}
}

/// Named screens, one of them current.
#[derive(Default)]
pub struct ScreenManager {
    screens: Vec<(String, Box<dyn Screen>)>,
    current: Option<usize>,
}

impl ScreenManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a screen. A screen with the same name is replaced.
    pub fn add_screen(&mut self, name: &str, screen: Box<dyn Screen>) {
        match self.screens.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => {
                log::warn!("Replacing screen {name:?}");
                slot.1 = screen;
            }
            None => self.screens.push((name.to_owned(), screen)),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.screens.iter().any(|(n, _)| n == name)
    }

    pub fn screen_names(&self) -> impl Iterator<Item = &str> {
        self.screens.iter().map(|(n, _)| n.as_str())
    }

    pub fn current_name(&self) -> Option<&str> {
        self.current
            .and_then(|i| self.screens.get(i))
            .map(|(n, _)| n.as_str())
    }

    /// Leave the current screen and enter `name`. An unknown name leaves the
    /// current screen running.
    pub fn change_screen(&mut self, name: &str, engine: &mut Engine) -> bool {
        let Some(next) = self.screens.iter().position(|(n, _)| n == name) else {
            log::warn!("Unknown screen {name:?}");
            return false;
        };
        self.leave(engine);
        log::info!("Entering screen {name:?}");
        let screen = &mut self.screens[next].1;
        screen.load(engine);
        screen.trans_in(engine);
        self.current = Some(next);
        true
    }

    fn leave(&mut self, engine: &mut Engine) {
        if let Some((_, screen)) = self.current.take().and_then(|i| self.screens.get_mut(i)) {
            screen.trans_out(engine);
            screen.unload(engine);
        }
    }

    fn current_mut(&mut self) -> Option<&mut Box<dyn Screen>> {
        self.current
            .and_then(|i| self.screens.get_mut(i))
            .map(|(_, s)| s)
    }

    pub fn update(&mut self, engine: &mut Engine, delta: f32) {
        if let Some(screen) = self.current_mut() {
            screen.update(engine, delta);
        }
    }

    pub fn render(&mut self, engine: &mut Engine) {
        if let Some(screen) = self.current_mut() {
            screen.render(engine);
        }
    }

    /// Apply a screen change requested through the engine.
    pub fn apply_pending(&mut self, engine: &mut Engine) {
        if let Some(name) = engine.take_next_screen() {
            self.change_screen(&name, engine);
        }
    }

    /// Run one frame: update, apply a requested screen change, clear, render
    /// and present.
    pub fn frame(&mut self, engine: &mut Engine, delta: f32) {
        self.update(engine, delta);
        self.apply_pending(engine);
        engine.renderer.cls();
        self.render(engine);
        if let Err(e) = engine.renderer.flip() {
            log::warn!("Present failed: {e}");
        }
    }

    /// Leave the current screen without entering another.
    pub fn shutdown(&mut self, engine: &mut Engine) {
        self.leave(engine);
    }
}

impl fmt::Debug for ScreenManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScreenManager")
            .field("screens", &self.screen_names().collect::<Vec<_>>())
            .field("current", &self.current_name())
            .finish()
    }
}

// ── Fade ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FadeDirection {
    FromBlack,
    ToBlack,
}

/// Brightness ramp between black and full color over a duration. Advance it
/// in `update` and call [`apply`](Fade::apply) before drawing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fade {
    direction: FadeDirection,
    duration: f32,
    elapsed: f32,
}

impl Fade {
    pub fn from_black(duration: Duration) -> Self {
        Self::new(FadeDirection::FromBlack, duration)
    }

    pub fn to_black(duration: Duration) -> Self {
        Self::new(FadeDirection::ToBlack, duration)
    }

    fn new(direction: FadeDirection, duration: Duration) -> Self {
        Self {
            direction,
            duration: duration.as_secs_f32(),
            elapsed: 0.0,
        }
    }

    /// Advance by `delta` seconds. Returns `true` once finished.
    pub fn update(&mut self, delta: f32) -> bool {
        self.elapsed = (self.elapsed + delta.max(0.0)).min(self.duration);
        self.finished()
    }

    pub fn finished(&self) -> bool {
        self.elapsed >= self.duration
    }

    /// Brightness from 0.0 (black) to 1.0.
    pub fn level(&self) -> f32 {
        let t = if self.duration > 0.0 {
            self.elapsed / self.duration
        } else {
            1.0
        };
        match self.direction {
            FadeDirection::FromBlack => t,
            FadeDirection::ToBlack => 1.0 - t,
        }
    }

    /// Set the draw color to the current brightness.
    pub fn apply(&self, renderer: &mut Renderer) {
        let v = (self.level() * 255.0) as u8;
        renderer.set_draw_color(v, v, v);
    }
}

// ── Game ────────────────────────────────────────────────────────────────

/// The game builder. Configure the window and screens, then call
/// [`run`](Game::run).
pub struct Game {
    config: GameConfig,
    screens: ScreenManager,
}

impl Game {
    pub fn new(title: &str) -> Self {
        Self {
            config: GameConfig {
                title: title.to_owned(),
                ..GameConfig::default()
            },
            screens: ScreenManager::new(),
        }
    }

    /// Start from a loaded configuration.
    pub fn from_config(config: GameConfig) -> Self {
        Self {
            config,
            screens: ScreenManager::new(),
        }
    }

    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.config.width = width;
        self.config.height = height;
        self
    }

    pub fn vsync(mut self, vsync: bool) -> Self {
        self.config.vsync = vsync;
        self
    }

    pub fn clear_color(mut self, r: u8, g: u8, b: u8) -> Self {
        self.config.clear_color = [r, g, b];
        self
    }

    pub fn mask_color(mut self, r: u8, g: u8, b: u8) -> Self {
        self.config.mask_color = [r, g, b];
        self
    }

    pub fn search_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.search_paths.push(path.into());
        self
    }

    pub fn screen(mut self, name: &str, screen: impl Screen + 'static) -> Self {
        self.screens.add_screen(name, Box::new(screen));
        self
    }

    /// The screen entered once the window is open.
    pub fn start(mut self, name: &str) -> Self {
        self.config.start_screen = Some(name.to_owned());
        self
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Open the window and run until it closes.
    pub fn run(self) -> Result<(), GameError> {
        let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
            .try_init();

        if let Some(start) = &self.config.start_screen {
            if !self.screens.contains(start) {
                return Err(GameError::Config(format!("unknown start screen {start:?}")));
            }
        }

        let files = FileManager::with_search_paths(self.config.search_paths.iter().cloned());
        let mut engine = Engine::new(files);
        #[cfg(feature = "audio")]
        {
            engine.audio = match crate::audio::AudioPlayer::new() {
                Ok(player) => Some(player),
                Err(e) => {
                    log::warn!("Audio disabled: {e}");
                    None
                }
            };
        }

        let event_loop = winit::event_loop::EventLoop::new()
            .map_err(|e| GameError::EventLoop(e.to_string()))?;
        let mut app = crate::window::WinitApp::new(engine, self.screens, self.config);
        event_loop
            .run_app(&mut app)
            .map_err(|e| GameError::EventLoop(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<String>>>;

    struct Recorder {
        name: &'static str,
        log: Log,
    }

    impl Recorder {
        fn boxed(name: &'static str, log: &Log) -> Box<dyn Screen> {
            Box::new(Self {
                name,
                log: log.clone(),
            })
        }

        fn push(&self, what: &str) {
            self.log.borrow_mut().push(format!("{}.{what}", self.name));
        }
    }

    impl Screen for Recorder {
        fn load(&mut self, _: &mut Engine) {
            self.push("load");
        }
        fn unload(&mut self, _: &mut Engine) {
            self.push("unload");
        }
        fn update(&mut self, engine: &mut Engine, delta: f32) {
            self.push(&format!("update({delta})"));
            if self.name == "a" {
                engine.change_screen("b");
            }
        }
        fn render(&mut self, engine: &mut Engine) {
            self.push("render");
            engine.renderer.draw_rect(0.0, 0.0, 1.0, 1.0);
        }
        fn trans_in(&mut self, _: &mut Engine) {
            self.push("trans_in");
        }
        fn trans_out(&mut self, _: &mut Engine) {
            self.push("trans_out");
        }
    }

    fn manager(log: &Log) -> ScreenManager {
        let mut screens = ScreenManager::new();
        screens.add_screen("a", Recorder::boxed("a", log));
        screens.add_screen("b", Recorder::boxed("b", log));
        screens
    }

    #[test]
    fn change_screen_runs_the_transition_sequence() {
        let log = Log::default();
        let mut screens = manager(&log);
        let mut engine = Engine::headless(64, 64);

        assert!(screens.change_screen("a", &mut engine));
        assert!(screens.change_screen("b", &mut engine));
        assert_eq!(
            *log.borrow(),
            vec!["a.load", "a.trans_in", "a.trans_out", "a.unload", "b.load", "b.trans_in"]
        );
        assert_eq!(screens.current_name(), Some("b"));
    }

    #[test]
    fn unknown_screen_keeps_the_current_one() {
        let log = Log::default();
        let mut screens = manager(&log);
        let mut engine = Engine::headless(64, 64);
        screens.change_screen("a", &mut engine);
        log.borrow_mut().clear();

        assert!(!screens.change_screen("zzz", &mut engine));
        assert_eq!(screens.current_name(), Some("a"));
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn requested_change_happens_after_update() {
        let log = Log::default();
        let mut screens = manager(&log);
        let mut engine = Engine::headless(64, 64);
        screens.change_screen("a", &mut engine);
        log.borrow_mut().clear();

        screens.frame(&mut engine, 0.5);
        assert_eq!(
            *log.borrow(),
            vec!["a.update(0.5)", "a.trans_out", "a.unload", "b.load", "b.trans_in", "b.render"]
        );
    }

    #[test]
    fn frame_clears_then_renders() {
        let log = Log::default();
        let mut screens = ScreenManager::new();
        screens.add_screen("b", Recorder::boxed("b", &log));
        let mut engine = Engine::headless(64, 64);
        screens.change_screen("b", &mut engine);
        engine.renderer.cls();
        engine.renderer.draw_rect(0.0, 0.0, 1.0, 1.0);
        screens.update(&mut engine, 0.0);
        screens.render(&mut engine);
        assert_eq!(engine.renderer.pending().vertices.len(), 8);

        screens.frame(&mut engine, 0.0);
        assert!(engine.renderer.pending().is_empty());
    }

    #[test]
    fn shutdown_leaves_the_current_screen() {
        let log = Log::default();
        let mut screens = manager(&log);
        let mut engine = Engine::headless(64, 64);
        screens.change_screen("b", &mut engine);
        screens.shutdown(&mut engine);
        assert_eq!(screens.current_name(), None);
        assert_eq!(log.borrow().last().map(String::as_str), Some("b.unload"));
    }

    #[test]
    fn pause_zeroes_delta() {
        let mut engine = Engine::headless(8, 8);
        engine.pause();
        engine.time.update();
        assert!(engine.paused());
        assert_eq!(engine.time.delta_secs(), 0.0);
        engine.resume();
        assert!(!engine.paused());
    }

    #[test]
    fn fade_ramps_brightness() {
        let mut fade = Fade::from_black(Duration::from_secs(2));
        assert_eq!(fade.level(), 0.0);
        assert!(!fade.update(1.0));
        assert_eq!(fade.level(), 0.5);
        assert!(fade.update(5.0));
        assert_eq!(fade.level(), 1.0);

        let mut out = Fade::to_black(Duration::from_secs(1));
        out.update(0.25);
        assert_eq!(out.level(), 0.75);

        let mut engine = Engine::headless(8, 8);
        out.apply(&mut engine.renderer);
        assert_eq!(engine.renderer.context().unwrap().draw_color(), [191, 191, 191]);
    }

    #[test]
    fn zero_length_fade_is_done() {
        let fade = Fade::to_black(Duration::ZERO);
        assert!(fade.finished());
        assert_eq!(fade.level(), 0.0);
    }

    #[test]
    fn config_fills_missing_fields() {
        let config = GameConfig::from_json_str(r#"{ "title": "Demo", "width": 800 }"#).unwrap();
        assert_eq!(config.title, "Demo");
        assert_eq!(config.width, 800);
        assert_eq!(config.height, 480);
        assert_eq!(config.clear_color, [100, 100, 200]);
        assert!(config.start_screen.is_none());
    }

    #[test]
    fn config_loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("game.json");
        std::fs::write(&path, r#"{ "search_paths": ["data"], "start_screen": "title" }"#).unwrap();
        let config = GameConfig::load(&path).unwrap();
        assert_eq!(config.search_paths, vec![PathBuf::from("data")]);
        assert_eq!(config.start_screen.as_deref(), Some("title"));

        assert!(matches!(GameConfig::from_json_str("{"), Err(GameError::Config(_))));
        assert!(matches!(GameConfig::load(dir.path().join("missing.json")), Err(GameError::Config(_))));
    }

    #[test]
    fn builder_records_settings() {
        let game = Game::new("Demo")
            .size(320, 200)
            .vsync(false)
            .search_path("assets")
            .start("title");
        let config = game.config();
        assert_eq!((config.width, config.height), (320, 200));
        assert!(!config.vsync);
        assert_eq!(config.search_paths, vec![PathBuf::from("assets")]);
        assert_eq!(config.start_screen.as_deref(), Some("title"));
    }
}
