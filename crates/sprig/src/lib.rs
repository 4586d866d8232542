//! # Sprig — Small 2D Game Engine
//!
//! Immediate-mode sprite drawing over wgpu, sprite sheets with frame
//! animation, named sprite layers, bitmap fonts and a screen-based game loop
//! driven by winit. Sound (`audio`, kira) and rigid bodies (`physics`,
//! rapier2d) are optional features.
//!
//! Start with `use sprig::prelude::*` and build a [`Game`](game::Game).

pub mod fs;
pub mod game;
pub mod input;
pub mod math;
pub mod prelude;
pub mod render;
pub mod sprite;
pub mod time;
pub(crate) mod window;

#[cfg(feature = "audio")]
pub mod audio;

#[cfg(feature = "physics")]
pub mod physics;
