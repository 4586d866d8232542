//! # Pipeline — The Full GPU Configuration for Drawing
//!
//! A *render pipeline* bundles the shaders, vertex layout, blend state and
//! target format into one immutable wgpu object. The renderer needs a
//! different one for every combination of blend mode, shader program and
//! target format (a window surface is usually BGRA, an image target RGBA), so
//! [`SpritePipelines`] builds them on demand and caches them.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │ SpritePipelines                                             │
//! │                                                             │
//! │  Bind group layouts (shared by every pipeline)              │
//! │    group 0: projection uniform (mat4x4, vertex-only)        │
//! │    group 1: texture + sampler (fragment-only)               │
//! │    group 2: shader params (16 × vec4, both stages)          │
//! │                                                             │
//! │  cache: (shader, blend, format) → RenderPipeline            │
//! │    (None,     Alpha, Bgra8UnormSrgb) → built on first draw  │
//! │    (None,     Light, Bgra8UnormSrgb)                        │
//! │    (Some(#2), Alpha, Rgba8UnormSrgb)                        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Blend Modes
//!
//! | mode         | src factor | dst factor          |
//! |--------------|------------|---------------------|
//! | Alpha        | SrcAlpha   | OneMinusSrcAlpha    |
//! | Light        | SrcAlpha   | One                 |
//! | Dark         | Dst        | Zero                |
//! | Solid / None | (blending disabled)              |
//!
//! There is no alpha test stage in wgpu; fully transparent texels simply
//! blend to nothing under `Alpha` and `Light`.
//!
//! ## Comparison
//!
//! - **OpenGL**: `glBlendFunc` is global mutable state toggled between draws.
//!   Here each blend mode is a separate baked pipeline and switching is a
//!   `set_pipeline` call.
//! - **Macroquad**: Same idea, a `Material` carries a pipeline with its own
//!   blend state.

use std::collections::{HashMap, HashSet};

use wgpu::util::DeviceExt;

use super::RenderError;
use super::context::BlendMode;
use super::image::Filter;
use super::shader::ShaderId;
use super::vertex::{ParamsUniform, ProjectionUniform, QuadVertex};

/// Source of the built-in shader. Custom shaders must declare the same
/// bindings and the `vs_main`/`fs_main` entry points.
pub const DEFAULT_SHADER: &str = include_str!("shader.wgsl");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct PipelineKey {
    pub shader: Option<ShaderId>,
    pub blend: BlendMode,
    pub format: wgpu::TextureFormat,
}

/// Layouts, samplers and the cache of built pipelines.
pub(crate) struct SpritePipelines {
    pub projection_layout: wgpu::BindGroupLayout,
    pub texture_layout: wgpu::BindGroupLayout,
    pub params_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    pub projection_buffer: wgpu::Buffer,
    pub projection_bind_group: wgpu::BindGroup,
    /// Zeroed params for the built-in shader.
    pub default_params: wgpu::BindGroup,
    linear_sampler: wgpu::Sampler,
    nearest_sampler: wgpu::Sampler,
    default_module: wgpu::ShaderModule,
    cache: HashMap<PipelineKey, wgpu::RenderPipeline>,
    /// Keys whose pipeline failed validation; not retried.
    failed: HashSet<PipelineKey>,
}

impl SpritePipelines {
    pub fn new(device: &wgpu::Device) -> Self {
        let default_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("sprite shader"),
            source: wgpu::ShaderSource::Wgsl(DEFAULT_SHADER.into()),
        });

        // Bind group layout 0: projection uniform
        let projection_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("projection bind group layout"),
            entries: &[uniform_entry(0, wgpu::ShaderStages::VERTEX)],
        });

        // Bind group layout 1: texture + sampler
        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("texture bind group layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        // Bind group layout 2: custom shader params
        let params_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("params bind group layout"),
            entries: &[uniform_entry(0, wgpu::ShaderStages::VERTEX_FRAGMENT)],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("sprite pipeline layout"),
            bind_group_layouts: &[&projection_layout, &texture_layout, &params_layout],
            push_constant_ranges: &[],
        });

        let projection_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("projection uniform buffer"),
            contents: bytemuck::cast_slice(&[ProjectionUniform::pixels(1, 1)]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let projection_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("projection bind group"),
            layout: &projection_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: projection_buffer.as_entire_binding(),
            }],
        });

        let default_params_buffer = Self::create_params_buffer(device, "default params");
        let default_params = Self::bind_params(device, &params_layout, &default_params_buffer);

        let sampler = |label, filter| {
            device.create_sampler(&wgpu::SamplerDescriptor {
                label: Some(label),
                address_mode_u: wgpu::AddressMode::ClampToEdge,
                address_mode_v: wgpu::AddressMode::ClampToEdge,
                mag_filter: filter,
                min_filter: filter,
                ..Default::default()
            })
        };
        let linear_sampler = sampler("linear sampler", wgpu::FilterMode::Linear);
        let nearest_sampler = sampler("nearest sampler", wgpu::FilterMode::Nearest);

        Self {
            projection_layout,
            texture_layout,
            params_layout,
            pipeline_layout,
            projection_buffer,
            projection_bind_group,
            default_params,
            linear_sampler,
            nearest_sampler,
            default_module,
            cache: HashMap::new(),
            failed: HashSet::new(),
        }
    }

    pub fn create_params_buffer(device: &wgpu::Device, label: &str) -> wgpu::Buffer {
        device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::cast_slice(&[ParamsUniform::default()]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        })
    }

    fn bind_params(device: &wgpu::Device, layout: &wgpu::BindGroupLayout, buffer: &wgpu::Buffer) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("params bind group"),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        })
    }

    pub fn params_bind_group(&self, device: &wgpu::Device, buffer: &wgpu::Buffer) -> wgpu::BindGroup {
        Self::bind_params(device, &self.params_layout, buffer)
    }

    pub fn texture_bind_group(
        &self,
        device: &wgpu::Device,
        view: &wgpu::TextureView,
        filter: Filter,
        label: &str,
    ) -> wgpu::BindGroup {
        let sampler = match filter {
            Filter::Linear => &self.linear_sampler,
            Filter::Nearest => &self.nearest_sampler,
        };
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout: &self.texture_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        })
    }

    /// Build the pipeline for `key` if it isn't cached yet. `module` is the
    /// custom shader's module, `None` for the built-in shader.
    ///
    /// A pipeline wgpu rejects is reported once and remembered, so draws
    /// using it are skipped instead of aborting the frame.
    pub fn ensure(
        &mut self,
        device: &wgpu::Device,
        key: PipelineKey,
        module: Option<&wgpu::ShaderModule>,
    ) -> Result<(), RenderError> {
        if self.cache.contains_key(&key) || self.failed.contains(&key) {
            return Ok(());
        }
        let module = module.unwrap_or(&self.default_module);
        log::debug!("Building sprite pipeline for {key:?}");

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("sprite pipeline"),
            layout: Some(&self.pipeline_layout),
            vertex: wgpu::VertexState {
                module,
                entry_point: Some("vs_main"),
                buffers: &[QuadVertex::LAYOUT],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: key.format,
                    blend: key.blend.blend_state(),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None, // rotated or mirrored quads may flip winding
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });
        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            self.failed.insert(key);
            return Err(RenderError::Shader(format!("pipeline for {key:?} rejected: {err}")));
        }
        self.cache.insert(key, pipeline);
        Ok(())
    }

    pub fn get(&self, key: &PipelineKey) -> Option<&wgpu::RenderPipeline> {
        self.cache.get(key)
    }

    /// Forget every pipeline built from `shader`.
    pub fn evict_shader(&mut self, shader: ShaderId) {
        self.cache.retain(|key, _| key.shader != Some(shader));
        self.failed.retain(|key| key.shader != Some(shader));
    }
}

fn uniform_entry(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}
