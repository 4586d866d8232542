//! GPU context — wgpu device, queue, and per-window surfaces.
//!
//! The renderer creates one [`Gpu`] lazily, the first time a window-backed
//! context is added, so the adapter can be chosen for compatibility with that
//! window's surface. Every later window shares the same device. Each window
//! keeps its own [`SurfaceState`].

use std::sync::Arc;

use super::RenderError;
use super::pipeline::SpritePipelines;

/// The shared device, queue, and sprite pipelines.
pub(crate) struct Gpu {
    pub adapter: wgpu::Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub pipelines: SpritePipelines,
}

impl Gpu {
    /// Pick an adapter that can present to `surface` and open a device on it.
    pub fn new(instance: &wgpu::Instance, surface: &wgpu::Surface<'_>) -> Result<Self, RenderError> {
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::default(),
            compatible_surface: Some(surface),
            force_fallback_adapter: false,
        }))
        .map_err(|e| RenderError::Adapter(e.to_string()))?;

        let info = adapter.get_info();
        log::info!("Using GPU adapter: {} ({:?})", info.name, info.backend);

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("sprig device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            ..Default::default()
        }))
        .map_err(|e| RenderError::Device(e.to_string()))?;

        let pipelines = SpritePipelines::new(&device);

        Ok(Self {
            adapter,
            device,
            queue,
            pipelines,
        })
    }
}

/// A window's swapchain plus the frame currently being drawn, if any.
pub(crate) struct SurfaceState {
    pub surface: wgpu::Surface<'static>,
    pub config: wgpu::SurfaceConfiguration,
    /// Acquired on the first flush of a frame, presented by `flip`.
    pub frame: Option<wgpu::SurfaceTexture>,
}

impl SurfaceState {
    pub fn create(instance: &wgpu::Instance, window: Arc<winit::window::Window>) -> Result<wgpu::Surface<'static>, RenderError> {
        instance
            .create_surface(window)
            .map_err(|e| RenderError::Surface(e.to_string()))
    }

    /// Configure `surface` for presentation at `width × height`.
    pub fn new(gpu: &Gpu, surface: wgpu::Surface<'static>, width: u32, height: u32, vsync: bool) -> Self {
        let caps = surface.get_capabilities(&gpu.adapter);
        let format = caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .copied()
            .unwrap_or(wgpu::TextureFormat::Bgra8UnormSrgb);
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: width.max(1),
            height: height.max(1),
            present_mode: if vsync {
                wgpu::PresentMode::AutoVsync
            } else {
                wgpu::PresentMode::AutoNoVsync
            },
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&gpu.device, &config);

        Self {
            surface,
            config,
            frame: None,
        }
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    pub fn resize(&mut self, gpu: &Gpu, width: u32, height: u32) {
        if width > 0 && height > 0 {
            // A frame acquired at the old size can't be presented after reconfigure.
            self.frame = None;
            self.config.width = width;
            self.config.height = height;
            self.surface.configure(&gpu.device, &self.config);
        }
    }

    /// The frame being drawn, acquiring one if needed.
    ///
    /// Lost or outdated surfaces are reconfigured and retried once.
    pub fn acquire(&mut self, gpu: &Gpu) -> Result<&wgpu::SurfaceTexture, wgpu::SurfaceError> {
        if self.frame.is_none() {
            let frame = match self.surface.get_current_texture() {
                Ok(frame) => frame,
                Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                    log::warn!("Surface lost or outdated, reconfiguring");
                    self.surface.configure(&gpu.device, &self.config);
                    self.surface.get_current_texture()?
                }
                Err(e) => return Err(e),
            };
            self.frame = Some(frame);
        }
        match &self.frame {
            Some(frame) => Ok(frame),
            None => Err(wgpu::SurfaceError::Lost),
        }
    }

    /// Present the current frame, if one was drawn.
    pub fn present(&mut self) {
        if let Some(frame) = self.frame.take() {
            frame.present();
        }
    }
}
