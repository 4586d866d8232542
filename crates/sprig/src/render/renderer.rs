//! # Renderer — Immediate-Mode Drawing Over wgpu
//!
//! The [`Renderer`] owns every [`Context`], image, shader program and texture,
//! and turns immediate-mode calls (`draw_image`, `draw_rect`, `cls`, `flip`)
//! into batched GPU work.
//!
//! ## Recording and Flushing
//!
//! ```text
//!  draw_* / cls ──► pending DrawList ──flush──► render pass on destination
//!                                       ▲
//!        make_current / set_target ─────┤   (destination is about to change)
//!        set_uniform_* on a used shader ┤   (later draws must see new values)
//!        flip ──────────────────────────┘   (then present the surface)
//! ```
//!
//! Every draw reads the current context *at call time*: its transform shapes
//! the quad, its draw color and alpha become the vertex tint, and its blend
//! mode, viewport and the bound shader are stored with the quad. Changing
//! state between draws never affects quads already recorded.
//!
//! The destination is the current context's window surface, or the texture
//! of the active render target. A window frame is acquired on the first flush
//! that draws to it and presented by [`Renderer::flip`].
//!
//! ## Render Targets
//!
//! `set_target(Some(image))` redirects drawing into the image's texture. The
//! current context is resized to the image's size (its previous size and
//! viewport are remembered) so the projection maps one unit to one texel.
//! `set_target(None)` flushes into the texture and restores the context. Only
//! one target is active at a time; setting another replaces it.
//!
//! ## Headless Mode
//!
//! Until a window context is added there is no GPU device. Textures keep CPU
//! shadows, flushes discard their commands, and everything else (contexts,
//! images, paint sessions, targets, quad recording) behaves normally. Tests
//! and tools use [`Renderer::add_headless_context`] to work without a window.

use std::path::Path;
use std::sync::Arc;

use wgpu::util::DeviceExt;
use winit::window::Window;

use crate::fs::FileManager;
use crate::math::SourceRect;

use super::RenderError;
use super::batch::{Command, Destination, DrawList, DrawState};
use super::context::{BlendMode, Context, Viewport};
use super::font::Font;
use super::gpu::{Gpu, SurfaceState};
use super::image::{self, Filter, Image, ImageError, ImageHandle, PaintSession};
use super::pipeline::PipelineKey;
use super::quad::{self, Quad};
use super::shader::{self, ShaderId, ShaderProgram};
use super::texture::{TextureEntry, TextureId, TextureStore};
use super::vertex::ProjectionUniform;

/// Handle to a context registered with a [`Renderer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(pub(crate) usize);

struct ContextSlot {
    context: Context,
    /// `None` for headless contexts.
    surface: Option<SurfaceState>,
}

#[derive(Debug, Clone, Copy)]
struct TargetState {
    image: ImageHandle,
    texture: TextureId,
    saved_size: (u32, u32),
    saved_viewport: Viewport,
}

/// Owns contexts and GPU resources and executes all drawing.
pub struct Renderer {
    instance: Option<wgpu::Instance>,
    gpu: Option<Gpu>,
    contexts: Vec<Option<ContextSlot>>,
    current: Option<usize>,
    textures: TextureStore,
    images: Vec<Option<Image>>,
    shaders: Vec<Option<ShaderProgram>>,
    bound_shader: Option<ShaderId>,
    target: Option<TargetState>,
    pending: DrawList,
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer {
    /// A renderer with no contexts. The GPU device is created when the first
    /// window context is added.
    pub fn new() -> Self {
        Self {
            instance: None,
            gpu: None,
            contexts: Vec::new(),
            current: None,
            textures: TextureStore::new(None),
            images: Vec::new(),
            shaders: Vec::new(),
            bound_shader: None,
            target: None,
            pending: DrawList::default(),
        }
    }

    /// Whether a GPU device exists.
    pub fn has_gpu(&self) -> bool {
        self.gpu.is_some()
    }

    // ── Contexts ────────────────────────────────────────────────────────

    /// Create a drawing surface for `window` and make it current.
    pub fn add_context(
        &mut self,
        window: Arc<Window>,
        width: u32,
        height: u32,
        vsync: bool,
    ) -> Result<ContextId, RenderError> {
        let instance = self
            .instance
            .get_or_insert_with(|| wgpu::Instance::new(&wgpu::InstanceDescriptor::default()));
        let surface = SurfaceState::create(instance, window)?;

        if self.gpu.is_none() {
            let gpu = Gpu::new(instance, &surface)?;
            self.textures.realize_all(&gpu);
            for program in self.shaders.iter_mut().flatten() {
                if let Err(e) = program.compile(&gpu) {
                    log::warn!("Shader failed to compile on device creation: {e}");
                }
            }
            self.gpu = Some(gpu);
        }
        let Some(gpu) = &self.gpu else {
            return Err(RenderError::Device("no device".into()));
        };
        let surface = SurfaceState::new(gpu, surface, width, height, vsync);

        let id = self.insert_context(ContextSlot {
            context: Context::new(width, height),
            surface: Some(surface),
        });
        log::info!("Added context {} ({width}x{height})", id.0);
        self.make_current(id)?;
        Ok(id)
    }

    /// Add a context with no window. Draws to it are recorded and discarded.
    pub fn add_headless_context(&mut self, width: u32, height: u32) -> ContextId {
        let id = self.insert_context(ContextSlot {
            context: Context::new(width, height),
            surface: None,
        });
        log::info!("Added headless context {} ({width}x{height})", id.0);
        if self.make_current(id).is_err() {
            log::warn!("Could not make headless context {} current", id.0);
        }
        id
    }

    fn insert_context(&mut self, slot: ContextSlot) -> ContextId {
        match self.contexts.iter().position(Option::is_none) {
            Some(i) => {
                self.contexts[i] = Some(slot);
                ContextId(i)
            }
            None => {
                self.contexts.push(Some(slot));
                ContextId(self.contexts.len() - 1)
            }
        }
    }

    /// Destroy a context and its surface. If it was current, no context is
    /// current afterwards.
    pub fn remove_context(&mut self, id: ContextId) -> bool {
        if self.slot(id.0).is_none() {
            log::warn!("remove_context: unknown context {}", id.0);
            return false;
        }
        if self.current == Some(id.0) {
            if let Err(e) = self.set_target(None).and_then(|()| self.flush()) {
                log::warn!("Dropping pending draws for context {}: {e}", id.0);
            }
            self.pending.clear();
            self.current = None;
        }
        self.contexts[id.0] = None;
        log::info!("Removed context {}", id.0);
        true
    }

    /// Resize a context and reconfigure its surface.
    pub fn resize_context(&mut self, id: ContextId, width: u32, height: u32) -> bool {
        let redirected = self.current == Some(id.0) && self.target.is_some();
        let Some(slot) = self.contexts.get_mut(id.0).and_then(Option::as_mut) else {
            return false;
        };
        if let (Some(surface), Some(gpu)) = (slot.surface.as_mut(), self.gpu.as_ref()) {
            surface.resize(gpu, width, height);
        }
        match (&mut self.target, redirected) {
            // The context is sized to the target; apply the new size on release.
            (Some(target), true) => {
                target.saved_size = (width, height);
                target.saved_viewport = Viewport::full(width, height);
            }
            _ => slot.context.resize(width, height),
        }
        true
    }

    /// Make `id` the context that draws and state changes apply to.
    ///
    /// Pending draws for the previous context are flushed first. An active
    /// render target is released.
    pub fn make_current(&mut self, id: ContextId) -> Result<(), RenderError> {
        if self.slot(id.0).is_none() {
            return Err(RenderError::UnknownContext(id));
        }
        if self.current == Some(id.0) {
            return Ok(());
        }
        if self.target.is_some() {
            log::warn!("Switching context with a render target set; releasing it");
            self.set_target(None)?;
        }
        self.flush()?;
        self.current = Some(id.0);
        Ok(())
    }

    /// Run `f` with `id` current, then restore the previous context. Fails
    /// only if `id` cannot be made current. If the previous context is gone
    /// by the time `f` returns, `id` stays current.
    pub fn with_context<R>(&mut self, id: ContextId, f: impl FnOnce(&mut Self) -> R) -> Result<R, RenderError> {
        let previous = self.current;
        self.make_current(id)?;
        let result = f(self);
        if let Some(previous) = previous {
            if let Err(e) = self.make_current(ContextId(previous)) {
                log::warn!("with_context: could not restore context {previous}: {e}");
            }
        }
        Ok(result)
    }

    pub fn current_context(&self) -> Option<ContextId> {
        self.current.map(ContextId)
    }

    /// State of the current context.
    pub fn context(&self) -> Option<&Context> {
        self.current.and_then(|i| self.slot(i)).map(|s| &s.context)
    }

    pub fn context_mut(&mut self) -> Option<&mut Context> {
        let i = self.current?;
        self.contexts.get_mut(i).and_then(Option::as_mut).map(|s| &mut s.context)
    }

    pub fn context_of(&self, id: ContextId) -> Option<&Context> {
        self.slot(id.0).map(|s| &s.context)
    }

    fn slot(&self, index: usize) -> Option<&ContextSlot> {
        self.contexts.get(index).and_then(Option::as_ref)
    }

    fn with_current(&mut self, f: impl FnOnce(&mut Context)) {
        match self.context_mut() {
            Some(ctx) => f(ctx),
            None => log::warn!("No current context"),
        }
    }

    // ── Draw state ──────────────────────────────────────────────────────

    pub fn set_draw_color(&mut self, r: u8, g: u8, b: u8) {
        self.with_current(|ctx| ctx.set_draw_color(r, g, b));
    }

    /// Draw alpha, 0.0–1.0.
    pub fn set_draw_alpha(&mut self, alpha: f32) {
        self.with_current(|ctx| ctx.set_alpha(alpha));
    }

    pub fn set_clear_color(&mut self, r: u8, g: u8, b: u8) {
        self.with_current(|ctx| ctx.set_clear_color(r, g, b));
    }

    /// Chroma key for images loaded from now on.
    pub fn set_mask_color(&mut self, r: u8, g: u8, b: u8) {
        self.with_current(|ctx| ctx.set_mask_color(r, g, b));
    }

    pub fn set_offset(&mut self, x: f32, y: f32) {
        self.with_current(|ctx| ctx.set_offset(x, y));
    }

    pub fn set_origin(&mut self, x: f32, y: f32) {
        self.with_current(|ctx| ctx.set_origin(x, y));
    }

    pub fn set_scale(&mut self, x: f32, y: f32) {
        self.with_current(|ctx| ctx.set_scale(x, y));
    }

    /// Rotation in radians.
    pub fn set_rotation(&mut self, radians: f32) {
        self.with_current(|ctx| ctx.set_rotation(radians));
    }

    pub fn set_blend(&mut self, mode: BlendMode) {
        self.with_current(|ctx| ctx.set_blend(mode));
    }

    /// Clip later draws to a rectangle. A viewport covering the whole
    /// context disables clipping.
    pub fn set_viewport(&mut self, x: i32, y: i32, width: u32, height: u32) {
        self.with_current(|ctx| {
            ctx.set_viewport(Viewport {
                x,
                y,
                width,
                height,
            })
        });
    }

    // ── Images ──────────────────────────────────────────────────────────

    /// Largest texture side, padding included. Headless renderers use the
    /// limit a device would be opened with.
    pub fn max_texture_size(&self) -> u32 {
        self.gpu.as_ref().map_or_else(
            || wgpu::Limits::default().max_texture_dimension_2d,
            |gpu| gpu.device.limits().max_texture_dimension_2d,
        )
    }

    /// Load a single-frame image, keying out the current mask color.
    pub fn load_image(&mut self, files: &FileManager, path: impl AsRef<Path>) -> Result<ImageHandle, RenderError> {
        self.load(files, path.as_ref(), None)
    }

    /// Load a sprite sheet of `frame_width × frame_height` frames.
    pub fn load_image_frames(
        &mut self,
        files: &FileManager,
        path: impl AsRef<Path>,
        frame_width: u32,
        frame_height: u32,
    ) -> Result<ImageHandle, RenderError> {
        self.load(files, path.as_ref(), Some((frame_width, frame_height)))
    }

    fn load(&mut self, files: &FileManager, path: &Path, frame: Option<(u32, u32)>) -> Result<ImageHandle, RenderError> {
        let bytes = files.read(path).map_err(ImageError::from)?;
        let mask = self.context().map_or([0, 0, 0], Context::mask_color);
        let decoded = image::decode(&bytes, mask, self.max_texture_size())?;
        let handle = self.insert_decoded(&path.display().to_string(), &decoded, frame)?;
        log::debug!("Loaded image {} ({}x{})", path.display(), decoded.width, decoded.height);
        Ok(handle)
    }

    /// Add an image from tightly packed `width × height` RGBA8 pixels, cut
    /// into `frame` sized frames if given. No mask is applied.
    pub fn create_image_from_pixels(
        &mut self,
        label: &str,
        width: u32,
        height: u32,
        pixels: Vec<u8>,
        frame: Option<(u32, u32)>,
    ) -> Result<ImageHandle, RenderError> {
        image::check_size(width, height, self.max_texture_size())?;
        let expected = image::texel_bytes(width, height)?;
        if pixels.len() != expected {
            return Err(ImageError::PixelCount {
                expected,
                actual: pixels.len(),
            }
            .into());
        }
        let decoded = image::prepare(width, height, pixels, None)?;
        self.insert_decoded(label, &decoded, frame)
    }

    fn insert_decoded(
        &mut self,
        label: &str,
        decoded: &image::Decoded,
        frame: Option<(u32, u32)>,
    ) -> Result<ImageHandle, RenderError> {
        let filter = if frame.is_some() { Filter::Nearest } else { Filter::Linear };
        // Validate before allocating the texture.
        Image::from_decoded(decoded, frame, TextureId::WHITE)?;
        let texture = self.textures.create(
            self.gpu.as_ref(),
            label,
            decoded.texture_width,
            decoded.texture_height,
            filter,
            false,
            &decoded.pixels,
        );
        let image = Image::from_decoded(decoded, frame, texture)?;
        Ok(self.insert_image(image))
    }

    /// Create a blank image usable as a render target.
    pub fn create_image(&mut self, width: u32, height: u32) -> Result<ImageHandle, RenderError> {
        if width == 0 || height == 0 {
            return Err(ImageError::BadFrameSize {
                frame_width: width,
                frame_height: height,
            }
            .into());
        }
        image::check_size(width, height, self.max_texture_size())?;
        let image = Image::blank(width, height, TextureId::WHITE);
        let pixels = vec![0u8; image::texel_bytes(image.texture_width(), image.texture_height())?];
        let texture = self.textures.create(
            self.gpu.as_ref(),
            "render target",
            image.texture_width(),
            image.texture_height(),
            Filter::Linear,
            true,
            &pixels,
        );
        let image = Image::blank(width, height, texture);
        log::debug!("Created {width}x{height} render target");
        Ok(self.insert_image(image))
    }

    fn insert_image(&mut self, image: Image) -> ImageHandle {
        match self.images.iter().position(Option::is_none) {
            Some(i) => {
                self.images[i] = Some(image);
                ImageHandle(i)
            }
            None => {
                self.images.push(Some(image));
                ImageHandle(self.images.len() - 1)
            }
        }
    }

    /// Release an image's texture. Pending draws that use it are flushed
    /// first; an active target on it is released.
    pub fn unload_image(&mut self, handle: ImageHandle) -> bool {
        let Some(texture) = self.image(handle).map(|img| img.texture) else {
            return false;
        };
        if self.target.is_some_and(|t| t.image == handle) {
            if let Err(e) = self.set_target(None) {
                log::warn!("Releasing target on unload: {e}");
            }
        }
        if self.pending.uses_texture(texture) {
            if let Err(e) = self.flush() {
                log::warn!("Flush before unload failed: {e}");
            }
        }
        self.textures.release(texture);
        self.images[handle.0] = None;
        true
    }

    pub fn image(&self, handle: ImageHandle) -> Option<&Image> {
        self.images.get(handle.0).and_then(Option::as_ref)
    }

    /// Start CPU access to an image's texels. The texture is updated when the
    /// returned session ends.
    pub fn begin_paint(&mut self, handle: ImageHandle) -> Result<PaintSession<'_>, RenderError> {
        let image = self.image(handle).ok_or(RenderError::UnknownImage(handle))?;
        let (texture, width, height) = (image.texture, image.texture_width(), image.texture_height());
        if self.pending.uses_texture(texture) || self.target.is_some_and(|t| t.image == handle) {
            self.flush()?;
        }
        let pixels = self
            .textures
            .read(self.gpu.as_ref(), texture)
            .ok_or(RenderError::UnknownImage(handle))?;
        Ok(PaintSession::new(self, handle, width, height, pixels))
    }

    pub(crate) fn end_paint(&mut self, handle: ImageHandle, pixels: &[u8]) {
        let Some(texture) = self.image(handle).map(|img| img.texture) else {
            return;
        };
        self.textures.upload(self.gpu.as_ref(), texture, pixels);
    }

    // ── Drawing ─────────────────────────────────────────────────────────

    /// Draw frame 0 of `image` at `(x, y)`.
    pub fn draw_image(&mut self, image: ImageHandle, x: f32, y: f32) {
        self.draw_image_frame(image, x, y, 0);
    }

    /// Draw one frame of a sprite sheet. Frame indices wrap.
    pub fn draw_image_frame(&mut self, image: ImageHandle, x: f32, y: f32, frame: u32) {
        let Some(src) = self.image(image).map(|img| img.frame_source(frame)) else {
            log::warn!("draw_image_frame: unknown image {}", image.0);
            return;
        };
        self.draw_source(image, x, y, src);
    }

    /// Draw the `(u, v)`–`(u + s, v + t)` pixel region of `image`.
    #[allow(clippy::too_many_arguments)]
    pub fn draw_image_region(&mut self, image: ImageHandle, x: f32, y: f32, u: u32, v: u32, s: u32, t: u32) {
        self.draw_source(image, x, y, SourceRect::new(u, v, s, t));
    }

    fn draw_source(&mut self, handle: ImageHandle, x: f32, y: f32, src: SourceRect) {
        let (Some(image), Some(ctx)) = (self.image(handle), self.context()) else {
            return;
        };
        let quad = quad::image_quad(
            ctx,
            (image.frame_width(), image.frame_height()),
            (image.texture_width(), image.texture_height()),
            x,
            y,
            src,
        );
        let texture = image.texture;
        self.record(texture, &quad);
    }

    /// Draw a solid rectangle in the draw color.
    pub fn draw_rect(&mut self, x: f32, y: f32, width: f32, height: f32) {
        let Some(ctx) = self.context() else {
            return;
        };
        let quad = quad::rect_quad(ctx, x, y, width, height);
        self.record(TextureId::WHITE, &quad);
    }

    /// Draw `text` with its top-left at `(x, y)`.
    ///
    /// The current offset anchors the whole line (`-0.5` centers it) rather
    /// than each glyph.
    pub fn draw_text(&mut self, font: &Font, text: &str, x: f32, y: f32) {
        let Some(offset) = self.context().map(Context::offset) else {
            return;
        };
        let x = x + font.text_width(text) as f32 * offset.x;
        let y = y + font.height() as f32 * offset.y;

        self.set_offset(0.0, 0.0);
        for (pen, src) in font.layout(text) {
            self.draw_source(font.image(), x + pen, y, src);
        }
        self.set_offset(offset.x, offset.y);
    }

    pub fn text_width(&self, font: &Font, text: &str) -> u32 {
        font.text_width(text)
    }

    fn record(&mut self, texture: TextureId, quad: &Quad) {
        let Some(ctx) = self.context() else {
            return;
        };
        let state = DrawState {
            texture,
            blend: ctx.blend(),
            shader: self.bound_shader,
            scissor: ctx.scissor(),
        };
        let color = ctx.tint();
        self.pending.push_quad(quad, color, state);
    }

    /// Clear the destination to the clear color.
    pub fn cls(&mut self) {
        if let Some(color) = self.context().map(Context::clear_wgpu) {
            self.pending.push_clear(color);
        }
    }

    /// Submit everything drawn and present the current context's window.
    pub fn flip(&mut self) -> Result<(), RenderError> {
        self.flush()?;
        if let Some(surface) = self
            .current
            .and_then(|i| self.contexts.get_mut(i))
            .and_then(Option::as_mut)
            .and_then(|s| s.surface.as_mut())
        {
            surface.present();
        }
        Ok(())
    }

    /// Redirect drawing into `image`, or back to the window with `None`.
    pub fn set_target(&mut self, image: Option<ImageHandle>) -> Result<(), RenderError> {
        let Some(handle) = image else {
            let Some(target) = self.target else {
                return Ok(());
            };
            self.flush()?;
            self.target = None;
            if let Some(ctx) = self.context_mut() {
                ctx.resize(target.saved_size.0, target.saved_size.1);
                ctx.set_viewport(target.saved_viewport);
            }
            return Ok(());
        };

        let image = self.image(handle).ok_or(RenderError::UnknownImage(handle))?;
        if !image.is_render_target() {
            return Err(RenderError::NotTarget(handle));
        }
        let (texture, size) = (image.texture, (image.width(), image.height()));
        if self.context().is_none() {
            return Err(RenderError::NoContext);
        }

        // One redirection at a time.
        self.set_target(None)?;
        self.flush()?;
        let Some(ctx) = self.context_mut() else {
            return Err(RenderError::NoContext);
        };
        let target = TargetState {
            image: handle,
            texture,
            saved_size: ctx.size(),
            saved_viewport: ctx.viewport(),
        };
        ctx.resize(size.0, size.1);
        self.target = Some(target);
        Ok(())
    }

    /// The image drawing is redirected into, if any.
    pub fn target(&self) -> Option<ImageHandle> {
        self.target.map(|t| t.image)
    }

    // ── Shaders ─────────────────────────────────────────────────────────

    /// Load a WGSL program with `vs_main`/`fs_main` entry points.
    pub fn load_shader(
        &mut self,
        files: &FileManager,
        path: impl AsRef<Path>,
        uniforms: &[&str],
    ) -> Result<ShaderId, RenderError> {
        let path = path.as_ref();
        let source = files
            .read_to_string(path)
            .map_err(|e| RenderError::Shader(e.to_string()))?;
        let id = self.insert_shader(&path.display().to_string(), source, uniforms)?;
        log::debug!("Loaded shader {}", path.display());
        Ok(id)
    }

    pub fn create_shader(&mut self, source: &str, uniforms: &[&str]) -> Result<ShaderId, RenderError> {
        self.insert_shader("custom shader", source.to_owned(), uniforms)
    }

    fn insert_shader(&mut self, label: &str, source: String, uniforms: &[&str]) -> Result<ShaderId, RenderError> {
        shader::reflect(label, &source)?;
        let mut program = ShaderProgram::new(label, source, uniforms)?;
        if let Some(gpu) = &self.gpu {
            program.compile(gpu)?;
        }
        let slot = self.shaders.iter().position(Option::is_none);
        Ok(match slot {
            Some(i) => {
                self.shaders[i] = Some(program);
                ShaderId(i)
            }
            None => {
                self.shaders.push(Some(program));
                ShaderId(self.shaders.len() - 1)
            }
        })
    }

    /// Use `program` for later draws, or the built-in shader with `None`.
    pub fn bind_shader(&mut self, program: Option<ShaderId>) -> bool {
        if let Some(id) = program {
            if self.shader(id).is_none() {
                log::warn!("bind_shader: unknown shader {}", id.0);
                return false;
            }
        }
        self.bound_shader = program;
        true
    }

    pub fn bound_shader(&self) -> Option<ShaderId> {
        self.bound_shader
    }

    pub fn unload_shader(&mut self, id: ShaderId) -> bool {
        if self.shader(id).is_none() {
            return false;
        }
        if self.pending.uses_shader(id) {
            if let Err(e) = self.flush() {
                log::warn!("Flush before shader unload failed: {e}");
            }
        }
        if self.bound_shader == Some(id) {
            self.bound_shader = None;
        }
        if let Some(gpu) = self.gpu.as_mut() {
            gpu.pipelines.evict_shader(id);
        }
        self.shaders[id.0] = None;
        true
    }

    pub fn shader(&self, id: ShaderId) -> Option<&ShaderProgram> {
        self.shaders.get(id.0).and_then(Option::as_ref)
    }

    /// Add a uniform to a program. See [`ShaderProgram::declare_uniform`].
    pub fn declare_uniform(&mut self, id: ShaderId, name: &str, components: usize) -> Option<usize> {
        self.shaders
            .get_mut(id.0)
            .and_then(Option::as_mut)?
            .declare_uniform(name, components)
    }

    /// Set 1–4 float components of a uniform. Draws already recorded keep the
    /// old value.
    pub fn set_uniform_f(&mut self, id: ShaderId, name: &str, values: &[f32]) -> bool {
        if self.pending.uses_shader(id) {
            if let Err(e) = self.flush() {
                log::warn!("Flush before uniform change failed: {e}");
            }
        }
        let Some(program) = self.shaders.get_mut(id.0).and_then(Option::as_mut) else {
            return false;
        };
        program.set(name, values)
    }

    /// Integer uniforms are stored as floats.
    pub fn set_uniform_i(&mut self, id: ShaderId, name: &str, values: &[i32]) -> bool {
        let floats: Vec<f32> = values.iter().map(|v| *v as f32).collect();
        self.set_uniform_f(id, name, &floats)
    }

    // ── Fonts ───────────────────────────────────────────────────────────

    /// Load a 32×32-cell glyph sheet and its 512-byte metrics blob.
    pub fn load_font(
        &mut self,
        files: &FileManager,
        image_path: impl AsRef<Path>,
        metrics_path: impl AsRef<Path>,
    ) -> Result<Font, RenderError> {
        let metrics = files
            .read(metrics_path.as_ref())
            .map_err(|e| RenderError::Font(e.to_string()))?;
        let widths = Font::parse_metrics(&metrics)?;
        let handle = self.load_image_frames(files, image_path, super::font::CELL_SIZE, super::font::CELL_SIZE)?;
        let sheet = self.image(handle).ok_or(RenderError::UnknownImage(handle))?;
        Ok(Font::from_parts(handle, sheet, widths))
    }

    /// Rasterize a TrueType/OpenType file at `px` pixels (at most 32).
    #[cfg(feature = "ttf")]
    pub fn load_ttf_font(&mut self, files: &FileManager, path: impl AsRef<Path>, px: f32) -> Result<Font, RenderError> {
        let bytes = files
            .read(path.as_ref())
            .map_err(|e| RenderError::Font(e.to_string()))?;
        let font = Font::bake_ttf(self, &bytes, px)?;
        log::debug!("Baked font {} at {px}px", path.as_ref().display());
        Ok(font)
    }

    pub fn unload_font(&mut self, font: Font) -> bool {
        self.unload_image(font.image())
    }

    // ── Flushing ────────────────────────────────────────────────────────

    fn destination(&self) -> Option<Destination> {
        match self.target {
            Some(target) => Some(Destination::Texture(target.texture)),
            None => self.current.map(Destination::Surface),
        }
    }

    /// Recorded draws awaiting the next flush.
    #[cfg(test)]
    pub(crate) fn pending(&self) -> &DrawList {
        &self.pending
    }

    /// Replay pending draws onto the current destination.
    pub(crate) fn flush(&mut self) -> Result<(), RenderError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let list = std::mem::take(&mut self.pending);
        let Some(destination) = self.destination() else {
            return Ok(());
        };
        // Headless: nothing to rasterize into.
        let Some(gpu) = self.gpu.as_mut() else {
            return Ok(());
        };

        for call in list.draw_calls() {
            if let Some(program) = call
                .state
                .shader
                .and_then(|id| self.shaders.get_mut(id.0))
                .and_then(Option::as_mut)
            {
                program.sync(gpu);
            }
        }

        let (view, format, size) = match destination {
            Destination::Surface(slot) => {
                let Some(surface) = self
                    .contexts
                    .get_mut(slot)
                    .and_then(Option::as_mut)
                    .and_then(|s| s.surface.as_mut())
                else {
                    return Ok(());
                };
                let format = surface.format();
                let size = (surface.config.width, surface.config.height);
                let frame = match surface.acquire(gpu) {
                    Ok(frame) => frame,
                    Err(wgpu::SurfaceError::Timeout) => {
                        log::warn!("Surface timed out, dropping frame");
                        return Ok(());
                    }
                    Err(e) => return Err(RenderError::Surface(e.to_string())),
                };
                let view = frame.texture.create_view(&wgpu::TextureViewDescriptor::default());
                (view, format, size)
            }
            Destination::Texture(id) => {
                let Some(entry) = self.textures.get(id) else {
                    return Ok(());
                };
                let Some(tex) = &entry.gpu else {
                    return Ok(());
                };
                let view = tex.texture.create_view(&wgpu::TextureViewDescriptor::default());
                (view, TextureEntry::FORMAT, (entry.width, entry.height))
            }
        };

        let Gpu {
            device,
            queue,
            pipelines,
            ..
        } = gpu;

        let key_for = |state: &DrawState| {
            let program = compiled(&self.shaders, state.shader);
            let key = PipelineKey {
                shader: program.map(|(id, _)| id),
                blend: state.blend,
                format,
            };
            (key, program.map(|(_, p)| p))
        };

        for call in list.draw_calls() {
            let (key, program) = key_for(&call.state);
            if let Err(e) = pipelines.ensure(device, key, program.map(|p| &p.module)) {
                log::error!("{e}");
            }
        }

        queue.write_buffer(
            &pipelines.projection_buffer,
            0,
            bytemuck::cast_slice(&[ProjectionUniform::pixels(size.0, size.1)]),
        );

        let buffers = (!list.vertices.is_empty()).then(|| {
            let vertices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("sprig vertex buffer"),
                contents: bytemuck::cast_slice(&list.vertices),
                usage: wgpu::BufferUsages::VERTEX,
            });
            let indices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("sprig index buffer"),
                contents: bytemuck::cast_slice(&list.indices),
                usage: wgpu::BufferUsages::INDEX,
            });
            (vertices, indices)
        });

        let load = match list.commands.first() {
            Some(Command::Clear(color)) => wgpu::LoadOp::Clear(*color),
            _ => wgpu::LoadOp::Load,
        };

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("sprig flush encoder"),
        });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("sprig render pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            if let Some((vertices, indices)) = &buffers {
                pass.set_vertex_buffer(0, vertices.slice(..));
                pass.set_index_buffer(indices.slice(..), wgpu::IndexFormat::Uint32);
                pass.set_bind_group(0, &pipelines.projection_bind_group, &[]);

                for call in list.draw_calls() {
                    if destination == Destination::Texture(call.state.texture) {
                        log::warn!("Skipping draw that samples its own render target");
                        continue;
                    }
                    let (key, program) = key_for(&call.state);
                    let Some(pipeline) = pipelines.get(&key) else {
                        continue;
                    };
                    let Some(texture) = self
                        .textures
                        .get(call.state.texture)
                        .or_else(|| self.textures.get(TextureId::WHITE))
                        .and_then(|e| e.gpu.as_ref())
                    else {
                        continue;
                    };
                    let (x, y, w, h) = match call.state.scissor {
                        Some(viewport) => viewport.clamp_to(size.0, size.1),
                        None => (0, 0, size.0, size.1),
                    };
                    if w == 0 || h == 0 {
                        continue;
                    }
                    let params = program.map_or(&pipelines.default_params, |p| &p.params_bind_group);

                    pass.set_pipeline(pipeline);
                    pass.set_bind_group(1, &texture.bind_group, &[]);
                    pass.set_bind_group(2, params, &[]);
                    pass.set_scissor_rect(x, y, w, h);
                    pass.draw_indexed(call.index_start..call.index_start + call.index_count, 0, 0..1);
                }
            }
        }
        queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }
}

/// A bound shader that exists and has GPU resources.
fn compiled(
    shaders: &[Option<ShaderProgram>],
    id: Option<ShaderId>,
) -> Option<(ShaderId, &super::shader::ShaderGpu)> {
    let id = id?;
    let program = shaders.get(id.0)?.as_ref()?;
    program.gpu.as_ref().map(|gpu| (id, gpu))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vec2;

    fn renderer() -> (Renderer, ContextId) {
        let mut r = Renderer::new();
        let id = r.add_headless_context(640, 480);
        (r, id)
    }

    fn sheet(r: &mut Renderer, w: u32, h: u32, frame: Option<(u32, u32)>) -> ImageHandle {
        r.create_image_from_pixels("test", w, h, vec![255; (w * h * 4) as usize], frame)
            .unwrap()
    }

    fn corners(r: &Renderer, quad: usize) -> [Vec2; 4] {
        let v = &r.pending().vertices[quad * 4..quad * 4 + 4];
        std::array::from_fn(|i| Vec2::from(v[i].position))
    }

    #[test]
    fn headless_context_is_current_with_defaults() {
        let (r, id) = renderer();
        assert_eq!(r.current_context(), Some(id));
        assert!(!r.has_gpu());
        let ctx = r.context().unwrap();
        assert_eq!(ctx.size(), (640, 480));
        assert_eq!(ctx.blend(), BlendMode::Alpha);
    }

    #[test]
    fn draw_image_region_builds_expected_quad() {
        let (mut r, _) = renderer();
        let img = sheet(&mut r, 16, 32, None);
        r.draw_image_region(img, 5.0, 5.0, 0, 0, 10, 20);
        assert_eq!(
            corners(&r, 0),
            [
                Vec2::new(5.0, 5.0),
                Vec2::new(15.0, 5.0),
                Vec2::new(15.0, 25.0),
                Vec2::new(5.0, 25.0),
            ]
        );
    }

    #[test]
    fn draws_capture_state_at_call_time() {
        let (mut r, _) = renderer();
        r.set_blend(BlendMode::Light);
        r.set_draw_color(255, 0, 0);
        r.draw_rect(0.0, 0.0, 4.0, 4.0);
        r.set_blend(BlendMode::Dark);
        r.set_draw_alpha(0.0);
        r.draw_rect(0.0, 0.0, 4.0, 4.0);

        let calls: Vec<_> = r.pending().draw_calls().copied().collect();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].state.blend, BlendMode::Light);
        assert_eq!(calls[1].state.blend, BlendMode::Dark);
        assert_eq!(r.pending().vertices[0].color, [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(r.pending().vertices[4].color[3], 0.0);
    }

    #[test]
    fn viewport_becomes_scissor() {
        let (mut r, _) = renderer();
        r.set_viewport(10, 10, 100, 100);
        r.draw_rect(0.0, 0.0, 1.0, 1.0);
        r.set_viewport(0, 0, 640, 480);
        r.draw_rect(0.0, 0.0, 1.0, 1.0);
        let scissors: Vec<_> = r.pending().draw_calls().map(|c| c.state.scissor).collect();
        assert_eq!(scissors[0].map(|v| v.x), Some(10));
        assert_eq!(scissors[1], None);
    }

    #[test]
    fn cls_discards_earlier_draws() {
        let (mut r, _) = renderer();
        r.draw_rect(0.0, 0.0, 1.0, 1.0);
        r.cls();
        assert!(matches!(r.pending().commands[..], [Command::Clear(_)]));
    }

    #[test]
    fn flip_without_gpu_empties_pending() {
        let (mut r, _) = renderer();
        r.draw_rect(0.0, 0.0, 1.0, 1.0);
        r.flip().unwrap();
        assert!(r.pending().is_empty());
    }

    #[test]
    fn frame_draw_uses_grid_source() {
        let (mut r, _) = renderer();
        let img = sheet(&mut r, 64, 32, Some((16, 16)));
        r.draw_image_frame(img, 0.0, 0.0, 4);
        let v = &r.pending().vertices[0..4];
        // Frame 4 starts row 1: v = 16 / 32.
        assert_eq!(v[0].uv, [0.0, 0.5]);
        assert_eq!(v[2].uv, [0.25, 1.0]);
    }

    #[test]
    fn target_round_trip_restores_size() {
        let (mut r, _) = renderer();
        r.set_viewport(5, 5, 50, 50);
        let target = r.create_image(100, 60).unwrap();
        r.set_target(Some(target)).unwrap();
        assert_eq!(r.context().unwrap().size(), (100, 60));
        assert_eq!(r.target(), Some(target));
        r.draw_rect(0.0, 0.0, 10.0, 10.0);
        r.set_target(None).unwrap();
        let ctx = r.context().unwrap();
        assert_eq!(ctx.size(), (640, 480));
        assert_eq!(ctx.viewport(), Viewport { x: 5, y: 5, width: 50, height: 50 });
        assert_eq!(r.target(), None);
    }

    #[test]
    fn setting_a_second_target_replaces_the_first() {
        let (mut r, _) = renderer();
        let a = r.create_image(32, 32).unwrap();
        let b = r.create_image(16, 8).unwrap();
        r.set_target(Some(a)).unwrap();
        r.set_target(Some(b)).unwrap();
        assert_eq!(r.context().unwrap().size(), (16, 8));
        r.set_target(None).unwrap();
        assert_eq!(r.context().unwrap().size(), (640, 480));
    }

    #[test]
    fn loaded_images_are_not_targets() {
        let (mut r, _) = renderer();
        let img = sheet(&mut r, 8, 8, None);
        assert!(matches!(r.set_target(Some(img)), Err(RenderError::NotTarget(_))));
        assert!(r.set_target(Some(ImageHandle(99))).is_err());
    }

    #[test]
    fn with_context_restores_previous() {
        let (mut r, first) = renderer();
        let second = r.add_headless_context(100, 100);
        r.make_current(first).unwrap();
        let size = r.with_context(second, |r| r.context().unwrap().size()).unwrap();
        assert_eq!(size, (100, 100));
        assert_eq!(r.current_context(), Some(first));
    }

    #[test]
    fn unknown_context_is_an_error() {
        let (mut r, _) = renderer();
        assert!(matches!(
            r.make_current(ContextId(7)),
            Err(RenderError::UnknownContext(ContextId(7)))
        ));
    }

    #[test]
    fn removing_current_context_leaves_none() {
        let (mut r, id) = renderer();
        assert!(r.remove_context(id));
        assert_eq!(r.current_context(), None);
        assert!(r.context().is_none());
        // Draws without a context are ignored.
        r.draw_rect(0.0, 0.0, 1.0, 1.0);
        assert!(r.pending().is_empty());
    }

    #[test]
    fn paint_session_uploads_on_drop() {
        let (mut r, _) = renderer();
        let img = r.create_image(4, 4).unwrap();
        {
            let mut paint = r.begin_paint(img).unwrap();
            assert!(paint.paint_pixel(0, 0, [1, 2, 3, 4]));
            assert!(paint.add_pixel(1, 0, [9, 9, 9, 200]));
            assert!(paint.add_pixel(1, 0, [7, 7, 7, 100]));
            assert!(!paint.paint_pixel(-1, 0, [0; 4]));
            assert!(!paint.paint_pixel(4, 0, [0; 4]));
        }
        let paint = r.begin_paint(img).unwrap();
        assert_eq!(paint.pixel(0, 0), Some([1, 2, 3, 4]));
        assert_eq!(paint.pixel(1, 0), Some([7, 7, 7, 255]));
        paint.end();
    }

    #[test]
    fn unload_frees_handle() {
        let (mut r, _) = renderer();
        let img = sheet(&mut r, 8, 8, None);
        assert!(r.unload_image(img));
        assert!(r.image(img).is_none());
        assert!(!r.unload_image(img));
        r.draw_image(img, 0.0, 0.0);
        assert!(r.pending().is_empty());
    }

    #[test]
    fn text_is_anchored_as_a_line() {
        let (mut r, _) = renderer();
        let img = sheet(&mut r, 512, 512, Some((32, 32)));
        let mut widths = [0u8; 256];
        widths[b'A' as usize] = 10;
        widths[b'B' as usize] = 10;
        let font = Font::from_parts(img, r.image(img).unwrap(), widths);

        r.set_offset(-0.5, 0.0);
        r.draw_text(&font, "AB", 100.0, 0.0);
        assert_eq!(corners(&r, 0)[0], Vec2::new(90.0, 0.0));
        assert_eq!(corners(&r, 1)[0], Vec2::new(100.0, 0.0));
        assert_eq!(r.context().unwrap().offset(), Vec2::new(-0.5, 0.0));
        assert_eq!(r.text_width(&font, "AB"), 20);
    }

    #[test]
    fn shaders_bind_and_take_uniforms_without_gpu() {
        let (mut r, _) = renderer();
        let id = r.create_shader(super::super::DEFAULT_SHADER, &["time"]).unwrap();
        assert!(r.bind_shader(Some(id)));
        r.draw_rect(0.0, 0.0, 1.0, 1.0);
        assert!(r.pending().uses_shader(id));
        assert!(r.set_uniform_f(id, "time", &[1.5]));
        assert!(r.set_uniform_i(id, "time", &[2]));
        assert_eq!(r.shader(id).unwrap().uniform("time"), Some([2.0, 0.0, 0.0, 0.0]));
        assert!(r.unload_shader(id));
        assert_eq!(r.bound_shader(), None);
        assert!(!r.bind_shader(Some(id)));
    }

    #[test]
    fn raw_pixels_must_match_the_size() {
        let (mut r, _) = renderer();
        let err = r
            .create_image_from_pixels("short", 4, 4, vec![0; 10], None)
            .unwrap_err();
        assert!(matches!(
            err,
            RenderError::Image(ImageError::PixelCount { expected: 64, actual: 10 })
        ));
    }

    #[test]
    fn oversized_images_are_errors() {
        let (mut r, _) = renderer();
        assert_eq!(r.max_texture_size(), wgpu::Limits::default().max_texture_dimension_2d);
        assert!(matches!(
            r.create_image(20000, 20000),
            Err(RenderError::Image(ImageError::TooLarge { .. }))
        ));
        assert!(matches!(
            r.create_image(u32::MAX, 1),
            Err(RenderError::Image(ImageError::TooLarge { .. }))
        ));
        assert!(matches!(
            r.create_image_from_pixels("wide", 20000, 1, vec![0; 20000 * 4], None),
            Err(RenderError::Image(ImageError::TooLarge { .. }))
        ));
        let max = r.max_texture_size();
        assert!(r.create_image(max, 1).is_ok());
    }

    #[test]
    fn shaders_without_fragment_entry_are_rejected() {
        let (mut r, _) = renderer();
        let source = super::super::DEFAULT_SHADER.replace("fn fs_main", "fn shade");
        assert!(matches!(r.create_shader(&source, &[]), Err(RenderError::Shader(_))));
        assert!(r.create_shader(super::super::DEFAULT_SHADER, &[]).is_ok());
    }

    #[test]
    fn with_context_keeps_the_result_when_restore_fails() {
        let (mut r, first) = renderer();
        let second = r.add_headless_context(320, 240);
        r.make_current(first).unwrap();
        let value = r
            .with_context(second, |r| {
                r.remove_context(first);
                7
            })
            .unwrap();
        assert_eq!(value, 7);
        assert_eq!(r.current_context(), Some(second));
    }
}
