//! Custom shader programs.
//!
//! A [`ShaderProgram`] is WGSL source with `vs_main`/`fs_main` entry points
//! and the same three bind groups as [`DEFAULT_SHADER`](super::DEFAULT_SHADER).
//! Uniforms are addressed by name: the names given at creation are assigned
//! to consecutive vec4 slots of the params block, and
//! [`Renderer::set_uniform_f`](super::Renderer::set_uniform_f) writes 1–4
//! components into a slot. Unknown names are ignored.

use super::RenderError;
use super::gpu::Gpu;
use super::pipeline::SpritePipelines;
use super::vertex::{PARAM_SLOTS, ParamsUniform};

/// Entry points every program must define.
const ENTRY_POINTS: [(&str, naga::ShaderStage); 2] = [
    ("vs_main", naga::ShaderStage::Vertex),
    ("fs_main", naga::ShaderStage::Fragment),
];

/// `(group, binding)` slots the sprite pipeline layout provides.
const BINDINGS: [(u32, u32); 4] = [(0, 0), (1, 0), (1, 1), (2, 0)];

/// Parse `source` and check it fits the sprite pipeline: both entry points
/// present and no resource outside the three shared bind groups. Runs
/// without a GPU.
pub(crate) fn reflect(label: &str, source: &str) -> Result<(), RenderError> {
    let module = naga::front::wgsl::parse_str(source)
        .map_err(|e| RenderError::Shader(format!("{label}: {}", e.emit_to_string(source))))?;

    for (name, stage) in ENTRY_POINTS {
        if !module.entry_points.iter().any(|ep| ep.name == name && ep.stage == stage) {
            return Err(RenderError::Shader(format!("{label}: missing {stage:?} entry point `{name}`")));
        }
    }

    for (_, var) in module.global_variables.iter() {
        if let Some(binding) = &var.binding {
            if !BINDINGS.contains(&(binding.group, binding.binding)) {
                let name = var.name.as_deref().unwrap_or("?");
                return Err(RenderError::Shader(format!(
                    "{label}: `{name}` uses @group({}) @binding({}), which the sprite pipeline does not provide",
                    binding.group, binding.binding
                )));
            }
        }
    }
    Ok(())
}

/// Handle to a loaded shader program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderId(pub(crate) usize);

pub(crate) struct ShaderGpu {
    pub module: wgpu::ShaderModule,
    pub params_buffer: wgpu::Buffer,
    pub params_bind_group: wgpu::BindGroup,
}

pub struct ShaderProgram {
    label: String,
    source: String,
    /// Uniform names with their component counts, in slot order.
    uniforms: Vec<(String, usize)>,
    params: ParamsUniform,
    dirty: bool,
    pub(crate) gpu: Option<ShaderGpu>,
}

impl std::fmt::Debug for ShaderProgram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShaderProgram")
            .field("label", &self.label)
            .field("uniforms", &self.uniforms)
            .field("compiled", &self.gpu.is_some())
            .finish()
    }
}

impl ShaderProgram {
    pub(crate) fn new(label: &str, source: String, uniforms: &[&str]) -> Result<Self, RenderError> {
        if uniforms.len() > PARAM_SLOTS {
            return Err(RenderError::Shader(format!(
                "{label}: {} uniforms requested, at most {PARAM_SLOTS} supported",
                uniforms.len()
            )));
        }
        Ok(Self {
            label: label.to_owned(),
            source,
            uniforms: uniforms.iter().map(|s| ((*s).to_owned(), 4)).collect(),
            params: ParamsUniform::default(),
            dirty: false,
            gpu: None,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn uniform_names(&self) -> impl Iterator<Item = &str> {
        self.uniforms.iter().map(|(name, _)| name.as_str())
    }

    /// Params slot assigned to `name`.
    pub fn slot(&self, name: &str) -> Option<usize> {
        self.uniforms.iter().position(|(u, _)| u == name)
    }

    /// Add a uniform of `components` floats (1–4) in the next free slot.
    /// Declaring an existing name changes its component count and keeps its
    /// slot.
    pub fn declare_uniform(&mut self, name: &str, components: usize) -> Option<usize> {
        if !(1..=4).contains(&components) {
            return None;
        }
        if let Some(i) = self.slot(name) {
            self.uniforms[i].1 = components;
            return Some(i);
        }
        if self.uniforms.len() >= PARAM_SLOTS {
            log::warn!("{}: no free uniform slot for {name}", self.label);
            return None;
        }
        self.uniforms.push((name.to_owned(), components));
        Some(self.uniforms.len() - 1)
    }

    /// Current value of a uniform, padded with zeros to four components.
    pub fn uniform(&self, name: &str) -> Option<[f32; 4]> {
        self.slot(name).map(|i| self.params.slots[i])
    }

    /// Write 1–4 components. Returns `false` for an unknown name or more
    /// components than the uniform was declared with.
    pub(crate) fn set(&mut self, name: &str, values: &[f32]) -> bool {
        let Some(i) = self.slot(name) else {
            return false;
        };
        if values.is_empty() || values.len() > self.uniforms[i].1 {
            return false;
        }
        let mut slot = [0.0; 4];
        slot[..values.len()].copy_from_slice(values);
        self.params.slots[i] = slot;
        self.dirty = true;
        true
    }

    /// Compile on `gpu`, surfacing validation errors instead of panicking.
    pub(crate) fn compile(&mut self, gpu: &Gpu) -> Result<(), RenderError> {
        gpu.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = gpu.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&self.label),
            source: wgpu::ShaderSource::Wgsl(self.source.as_str().into()),
        });
        if let Some(err) = pollster::block_on(gpu.device.pop_error_scope()) {
            return Err(RenderError::Shader(format!("{}: {err}", self.label)));
        }

        let params_buffer = SpritePipelines::create_params_buffer(&gpu.device, &self.label);
        let params_bind_group = gpu.pipelines.params_bind_group(&gpu.device, &params_buffer);
        self.gpu = Some(ShaderGpu {
            module,
            params_buffer,
            params_bind_group,
        });
        self.dirty = true;
        Ok(())
    }

    /// Push changed uniform values to the GPU.
    pub(crate) fn sync(&mut self, gpu: &Gpu) {
        if !self.dirty {
            return;
        }
        if let Some(shader) = &self.gpu {
            gpu.queue
                .write_buffer(&shader.params_buffer, 0, bytemuck::cast_slice(&[self.params]));
            self.dirty = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn program() -> ShaderProgram {
        ShaderProgram::new("test", String::new(), &["time", "tint"]).unwrap()
    }

    #[test]
    fn built_in_shader_fits_the_pipeline() {
        assert!(reflect("default", super::super::DEFAULT_SHADER).is_ok());
    }

    #[test]
    fn missing_fragment_entry_is_rejected() {
        let source = super::super::DEFAULT_SHADER.replace("fn fs_main", "fn frag");
        let err = reflect("no fs", &source).unwrap_err();
        assert!(err.to_string().contains("fs_main"), "{err}");
    }

    #[test]
    fn extra_bind_group_is_rejected() {
        let source = format!(
            "{}\n@group(3) @binding(0) var<uniform> extra: vec4<f32>;\n",
            super::super::DEFAULT_SHADER
        );
        let err = reflect("extra", &source).unwrap_err();
        assert!(err.to_string().contains("extra"), "{err}");
    }

    #[test]
    fn syntax_errors_are_reported() {
        assert!(matches!(reflect("junk", "fn vs_main( {"), Err(RenderError::Shader(_))));
    }

    #[test]
    fn uniforms_get_slots_in_order() {
        let p = program();
        assert_eq!(p.slot("time"), Some(0));
        assert_eq!(p.slot("tint"), Some(1));
        assert_eq!(p.slot("missing"), None);
    }

    #[test]
    fn set_pads_components() {
        let mut p = program();
        assert!(p.set("tint", &[0.5, 0.25]));
        assert_eq!(p.uniform("tint"), Some([0.5, 0.25, 0.0, 0.0]));
    }

    #[test]
    fn set_rejects_unknown_and_oversized() {
        let mut p = program();
        assert!(!p.set("nope", &[1.0]));
        assert!(!p.set("time", &[]));
        assert!(!p.set("time", &[1.0; 5]));
        assert_eq!(p.uniform("time"), Some([0.0; 4]));
    }

    #[test]
    fn declared_uniform_limits_components() {
        let mut p = program();
        assert_eq!(p.declare_uniform("speed", 1), Some(2));
        assert!(p.set("speed", &[3.0]));
        assert!(!p.set("speed", &[3.0, 4.0]));
        assert_eq!(p.declare_uniform("speed", 2), Some(2));
        assert!(p.set("speed", &[3.0, 4.0]));
        assert_eq!(p.declare_uniform("bad", 5), None);
    }

    #[test]
    fn too_many_uniforms_is_an_error() {
        let names: Vec<String> = (0..=PARAM_SLOTS).map(|i| format!("u{i}")).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        assert!(ShaderProgram::new("big", String::new(), &refs).is_err());
    }
}
