//! # Vertex — Per-Corner Data Sent to the GPU
//!
//! Every draw call in the renderer is a quad: four corners, each carrying a
//! pixel-space position, a texture coordinate and the context's tint. The
//! corners are transformed on the CPU (offset, rotate, scale, translate) and
//! appended to a per-frame vertex buffer; the shader only applies the
//! orthographic projection for the current target.
//!
//! ```text
//! QuadVertex (32 bytes per vertex)
//! ┌──────────────┬──────────────┬────────────────────────┐
//! │ position     │ uv           │ color                  │
//! │ [f32; 2]     │ [f32; 2]     │ [f32; 4]               │
//! │ offset 0     │ offset 8     │ offset 16              │
//! │ location(0)  │ location(1)  │ location(2)            │
//! └──────────────┴──────────────┴────────────────────────┘
//! ```
//!
//! The projection is a uniform rather than baked into the positions so the
//! same geometry works for a window and for an off-screen image of a
//! different size.

use bytemuck::{Pod, Zeroable};

/// Per-vertex data for quads. Position is in target pixels, y down.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub(crate) struct QuadVertex {
    pub position: [f32; 2],
    pub uv: [f32; 2],
    pub color: [f32; 4],
}

impl QuadVertex {
    pub const LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<QuadVertex>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &[
            // position
            wgpu::VertexAttribute {
                offset: 0,
                shader_location: 0,
                format: wgpu::VertexFormat::Float32x2,
            },
            // uv
            wgpu::VertexAttribute {
                offset: 8,
                shader_location: 1,
                format: wgpu::VertexFormat::Float32x2,
            },
            // color
            wgpu::VertexAttribute {
                offset: 16,
                shader_location: 2,
                format: wgpu::VertexFormat::Float32x4,
            },
        ],
    };
}

/// Orthographic projection uploaded as a uniform buffer.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub(crate) struct ProjectionUniform {
    pub view_proj: [[f32; 4]; 4],
}

impl ProjectionUniform {
    /// Maps `(0,0)..(width,height)` with y down onto clip space.
    pub fn pixels(width: u32, height: u32) -> Self {
        let proj = glam::Mat4::orthographic_rh(0.0, width.max(1) as f32, height.max(1) as f32, 0.0, -1.0, 1.0);
        Self {
            view_proj: proj.to_cols_array_2d(),
        }
    }
}

/// Number of vec4 slots available to custom shader uniforms.
pub(crate) const PARAM_SLOTS: usize = 16;

/// Values for a custom shader's named uniforms, one vec4 per name.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub(crate) struct ParamsUniform {
    pub slots: [[f32; 4]; PARAM_SLOTS],
}

impl Default for ParamsUniform {
    fn default() -> Self {
        Self::zeroed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_matches_struct() {
        assert_eq!(std::mem::size_of::<QuadVertex>(), 32);
        assert_eq!(QuadVertex::LAYOUT.array_stride, 32);
    }

    #[test]
    fn projection_maps_corners_to_clip_space() {
        let proj = glam::Mat4::from_cols_array_2d(&ProjectionUniform::pixels(200, 100).view_proj);
        let top_left = proj.project_point3(glam::Vec3::new(0.0, 0.0, 0.0));
        let bottom_right = proj.project_point3(glam::Vec3::new(200.0, 100.0, 0.0));
        assert!((top_left.x + 1.0).abs() < 1e-6 && (top_left.y - 1.0).abs() < 1e-6);
        assert!((bottom_right.x - 1.0).abs() < 1e-6 && (bottom_right.y + 1.0).abs() < 1e-6);
    }
}
