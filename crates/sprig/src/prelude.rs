//! Convenience re-exports: `use sprig::prelude::*` for the common items.

// Core
pub use crate::fs::{AccessMode, FileManager, FsError};
pub use crate::game::{Engine, Fade, Game, GameConfig, GameError, Screen, ScreenManager};
pub use crate::input::{KeyCode, KeyState, Keyboard, Mouse, MouseButton};
pub use crate::math::{SourceRect, Vec2, Vec3};
pub use crate::time::{Stopwatch, Time};

// Rendering
pub use crate::render::{
    BlendMode, ContextId, Filter, Font, Image, ImageHandle, PaintSession, RenderError, Renderer,
    Rgb, ShaderId, Viewport,
};
pub use crate::sprite::{Animation, BASE_LAYER, Sprite, SpriteManager};

// Audio (feature-gated)
#[cfg(feature = "audio")]
pub use crate::audio::{AudioError, AudioPlayer, Sound};

// Physics (feature-gated)
#[cfg(feature = "physics")]
pub use crate::physics::{BodyDesc, BodyHandle, PhysicsWorld};
