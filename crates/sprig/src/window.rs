//! Window management via winit.
//!
//! Implements [`winit::application::ApplicationHandler`] to drive the event
//! loop: window creation, input forwarding, resize, and one game frame per
//! redraw.

use std::sync::Arc;

use winit::application::ApplicationHandler;
use winit::event::{ElementState, MouseScrollDelta, WindowEvent};
use winit::event_loop::ActiveEventLoop;
use winit::keyboard::PhysicalKey;
use winit::window::{Window, WindowId};

use crate::game::{Engine, GameConfig, ScreenManager};

/// Pixels of trackpad scroll counted as one wheel line.
const PIXELS_PER_LINE: f32 = 120.0;

/// The application state that winit drives.
pub(crate) struct WinitApp {
    engine: Engine,
    screens: ScreenManager,
    config: GameConfig,
    window: Option<Arc<Window>>,
    started: bool,
}

impl WinitApp {
    pub fn new(engine: Engine, screens: ScreenManager, config: GameConfig) -> Self {
        Self {
            engine,
            screens,
            config,
            window: None,
            started: false,
        }
    }

    fn open_window(&mut self, event_loop: &ActiveEventLoop) -> bool {
        let attrs = Window::default_attributes()
            .with_title(&self.config.title)
            .with_inner_size(winit::dpi::PhysicalSize::new(self.config.width, self.config.height));
        let window = match event_loop.create_window(attrs) {
            Ok(w) => Arc::new(w),
            Err(e) => {
                log::error!("Failed to create window: {e}");
                return false;
            }
        };

        let size = window.inner_size();
        let renderer = &mut self.engine.renderer;
        match renderer.add_context(window.clone(), size.width, size.height, self.config.vsync) {
            Ok(id) => {
                let [r, g, b] = self.config.clear_color;
                renderer.set_clear_color(r, g, b);
                let [r, g, b] = self.config.mask_color;
                renderer.set_mask_color(r, g, b);
                self.engine.window_context = Some(id);
            }
            Err(e) => {
                log::error!("Failed to create render context: {e}");
                return false;
            }
        }
        if let Ok(origin) = window.inner_position() {
            self.engine.mouse.set_window_origin(origin.x as f32, origin.y as f32);
        }
        self.window = Some(window);
        true
    }

    fn frame(&mut self) {
        self.engine.time.update();
        let delta = self.engine.time.delta_secs();

        if let Some(id) = self.engine.window_context {
            if let Err(e) = self.engine.renderer.make_current(id) {
                log::warn!("Window context lost: {e}");
            }
        }
        self.screens.frame(&mut self.engine, delta);

        #[cfg(feature = "audio")]
        if let Some(audio) = self.engine.audio.as_mut() {
            audio.update();
        }

        self.engine.keyboard.capture();
        self.engine.mouse.capture();
    }

    fn exit(&mut self, event_loop: &ActiveEventLoop) {
        self.screens.shutdown(&mut self.engine);
        #[cfg(feature = "audio")]
        if let Some(audio) = self.engine.audio.as_mut() {
            audio.stop_all();
        }
        event_loop.exit();
    }
}

impl ApplicationHandler for WinitApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() && !self.open_window(event_loop) {
            event_loop.exit();
            return;
        }

        if !self.started {
            self.started = true;
            if let Some(start) = self.config.start_screen.clone() {
                self.screens.change_screen(&start, &mut self.engine);
            }
        }
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Window close requested, exiting.");
                self.exit(event_loop);
            }

            WindowEvent::Resized(size) => {
                if let Some(id) = self.engine.window_context {
                    self.engine.renderer.resize_context(id, size.width, size.height);
                }
            }

            WindowEvent::Moved(position) => {
                self.engine
                    .mouse
                    .set_window_origin(position.x as f32, position.y as f32);
            }

            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(key_code) = event.physical_key {
                    match event.state {
                        ElementState::Pressed => self.engine.keyboard.press(key_code),
                        ElementState::Released => self.engine.keyboard.release(key_code),
                    }
                }
                if event.state == ElementState::Pressed {
                    if let Some(text) = &event.text {
                        for c in text.chars().filter(|c| !c.is_control() || *c == '\r' || *c == '\u{8}') {
                            self.engine.keyboard.push_char(c);
                        }
                    }
                }
            }

            WindowEvent::MouseInput { button, state, .. } => match state {
                ElementState::Pressed => self.engine.mouse.press(button),
                ElementState::Released => self.engine.mouse.release(button),
            },

            WindowEvent::CursorMoved { position, .. } => {
                self.engine
                    .mouse
                    .set_position(position.x as f32, position.y as f32);
            }

            WindowEvent::MouseWheel { delta, .. } => {
                let lines = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(p) => p.y as f32 / PIXELS_PER_LINE,
                };
                self.engine.mouse.scroll(lines);
            }

            WindowEvent::RedrawRequested => {
                self.frame();
                if self.engine.quitting() {
                    self.exit(event_loop);
                    return;
                }
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }

            _ => {}
        }
    }
}
