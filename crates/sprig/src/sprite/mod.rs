//! # Sprites — Animated Entities in Named Layers
//!
//! ```text
//!  SpriteManager
//!  ├── "base"        [Sprite z=0] [Sprite z=2] [Sprite z=1]   drawn first
//!  ├── "enemies"     [Sprite] [Sprite]
//!  └── "ui"          [Sprite]                                 drawn last
//!
//!  Sprite ──► ImageHandle (shared, owned by the Renderer)
//!         └─► Animation  (owned; frame index into the image's grid)
//! ```
//!
//! A [`Sprite`] draws itself through the [`Renderer`](crate::render::Renderer)
//! with its own color, alpha, rotation, scale and offset, then puts the
//! renderer's state back, so sprites never affect each other.
//!
//! ## Comparison
//!
//! - **Bevy**: Sprites are ECS entities sorted by a `Transform` z each frame.
//!   Here layers are explicit lists and sorting is on request.
//! - **Love2D**: No built-in sprite type; games keep their own tables and call
//!   `love.graphics.draw` per object, which is what [`SpriteManager`] wraps.

pub mod animation;
pub mod manager;
#[allow(clippy::module_inception)]
pub mod sprite;

pub use animation::Animation;
pub use manager::{BASE_LAYER, SpriteManager};
pub use sprite::Sprite;
