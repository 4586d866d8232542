//! # Texture — Pixel Storage Behind Images
//!
//! The [`TextureStore`] owns every texture the renderer knows about. Images,
//! font sheets and render targets refer to entries through a copyable
//! [`TextureId`], never through a `wgpu::Texture` directly.
//!
//! ```text
//! TextureStore
//! ┌────────────────────────────────────────────────────┐
//! │ entries: Vec<Option<TextureEntry>>                 │
//! │   [0] 1x1 white (untextured draws) ◄── always here │
//! │   [1] "player.png"  gpu: Some, shadow: None        │
//! │   [2] blank target  gpu: Some, shadow: None        │
//! │   [3] None          (unloaded)                     │
//! └────────────────────────────────────────────────────┘
//! ```
//!
//! ## GPU and Shadow Copies
//!
//! An entry holds its GPU texture once a device exists. Until then (or
//! forever, for a headless renderer) it keeps a CPU *shadow* of its pixels,
//! which is uploaded the moment a device appears. Paint sessions read from
//! whichever copy is authoritative: the GPU texture when there is one (via a
//! readback buffer), the shadow otherwise.
//!
//! ## The 1x1 White Default Texture
//!
//! Entry 0 is a single white pixel. [`draw_rect`](super::Renderer::draw_rect)
//! binds it so solid rectangles go through the same `texture × tint` shader
//! path as images.

use super::gpu::Gpu;
use super::image::Filter;

/// Index of a texture in the [`TextureStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct TextureId(pub usize);

impl TextureId {
    pub const WHITE: Self = Self(0);
}

/// GPU resources for one texture.
pub(crate) struct GpuTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub bind_group: wgpu::BindGroup,
}

pub(crate) struct TextureEntry {
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub filter: Filter,
    pub render_target: bool,
    pub gpu: Option<GpuTexture>,
    pub shadow: Option<Vec<u8>>,
}

impl TextureEntry {
    pub const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

    fn usage(&self) -> wgpu::TextureUsages {
        let base = wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::COPY_DST
            | wgpu::TextureUsages::COPY_SRC;
        if self.render_target {
            base | wgpu::TextureUsages::RENDER_ATTACHMENT
        } else {
            base
        }
    }

    fn extent(&self) -> wgpu::Extent3d {
        wgpu::Extent3d {
            width: self.width,
            height: self.height,
            depth_or_array_layers: 1,
        }
    }

    /// Create the GPU texture from `pixels` (tightly packed RGBA8). If wgpu
    /// rejects it, the pixels stay in the shadow copy and draws using it are
    /// skipped.
    fn realize(&mut self, gpu: &Gpu, pixels: &[u8]) {
        use wgpu::util::DeviceExt;

        gpu.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let texture = gpu.device.create_texture_with_data(
            &gpu.queue,
            &wgpu::TextureDescriptor {
                label: Some(&self.label),
                size: self.extent(),
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: Self::FORMAT,
                usage: self.usage(),
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            pixels,
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = gpu.pipelines.texture_bind_group(&gpu.device, &view, self.filter, &self.label);
        if let Some(err) = pollster::block_on(gpu.device.pop_error_scope()) {
            log::error!("Texture {} ({}x{}) rejected: {err}", self.label, self.width, self.height);
            self.shadow = Some(pixels.to_vec());
            return;
        }
        self.gpu = Some(GpuTexture {
            texture,
            view,
            bind_group,
        });
    }
}

/// Owns all textures.
pub(crate) struct TextureStore {
    entries: Vec<Option<TextureEntry>>,
}

impl TextureStore {
    /// A store holding only the white default texture.
    pub fn new(gpu: Option<&Gpu>) -> Self {
        let mut store = Self {
            entries: Vec::new(),
        };
        store.create(gpu, "white 1x1", 1, 1, Filter::Nearest, false, &[255, 255, 255, 255]);
        store
    }

    pub fn get(&self, id: TextureId) -> Option<&TextureEntry> {
        self.entries.get(id.0).and_then(Option::as_ref)
    }

    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| e.is_some()).count()
    }

    /// Add a texture. `pixels` must hold `width × height` RGBA8 texels.
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        &mut self,
        gpu: Option<&Gpu>,
        label: &str,
        width: u32,
        height: u32,
        filter: Filter,
        render_target: bool,
        pixels: &[u8],
    ) -> TextureId {
        let mut entry = TextureEntry {
            label: label.to_owned(),
            width,
            height,
            filter,
            render_target,
            gpu: None,
            shadow: None,
        };
        match gpu {
            Some(gpu) => entry.realize(gpu, pixels),
            None => entry.shadow = Some(pixels.to_vec()),
        }

        // Reuse the first free slot, never slot 0.
        let slot = self.entries.iter().skip(1).position(Option::is_none).map(|i| i + 1);
        match slot {
            Some(i) => {
                self.entries[i] = Some(entry);
                TextureId(i)
            }
            None => {
                self.entries.push(Some(entry));
                TextureId(self.entries.len() - 1)
            }
        }
    }

    /// Upload every shadow-only entry once a device is available.
    pub fn realize_all(&mut self, gpu: &Gpu) {
        for entry in self.entries.iter_mut().flatten() {
            if entry.gpu.is_none() {
                if let Some(pixels) = entry.shadow.take() {
                    entry.realize(gpu, &pixels);
                }
            }
        }
    }

    /// Replace the contents of a texture.
    pub fn upload(&mut self, gpu: Option<&Gpu>, id: TextureId, pixels: &[u8]) -> bool {
        let Some(entry) = self.entries.get_mut(id.0).and_then(Option::as_mut) else {
            return false;
        };
        match (&entry.gpu, gpu) {
            (Some(tex), Some(gpu)) => {
                gpu.queue.write_texture(
                    tex.texture.as_image_copy(),
                    pixels,
                    wgpu::TexelCopyBufferLayout {
                        offset: 0,
                        bytes_per_row: Some(4 * entry.width),
                        rows_per_image: Some(entry.height),
                    },
                    entry.extent(),
                );
            }
            _ => entry.shadow = Some(pixels.to_vec()),
        }
        true
    }

    /// Current contents of a texture as tightly packed RGBA8.
    pub fn read(&self, gpu: Option<&Gpu>, id: TextureId) -> Option<Vec<u8>> {
        let entry = self.get(id)?;
        match (&entry.gpu, gpu) {
            (Some(tex), Some(gpu)) => read_back(gpu, &tex.texture, entry.width, entry.height),
            _ => entry.shadow.clone(),
        }
    }

    /// Drop a texture. The white default cannot be released.
    pub fn release(&mut self, id: TextureId) -> bool {
        if id == TextureId::WHITE {
            return false;
        }
        let Some(entry) = self.entries.get_mut(id.0).and_then(Option::take) else {
            return false;
        };
        if let Some(gpu) = entry.gpu {
            gpu.texture.destroy();
        }
        true
    }
}

/// Copy a texture into a mappable buffer and wait for it.
///
/// Rows in the staging buffer are padded to wgpu's copy alignment and
/// repacked on the way out.
fn read_back(gpu: &Gpu, texture: &wgpu::Texture, width: u32, height: u32) -> Option<Vec<u8>> {
    let row_bytes = 4 * width;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    let padded_row = row_bytes.div_ceil(align) * align;

    let buffer = gpu.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("texture readback"),
        size: (padded_row * height) as wgpu::BufferAddress,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = gpu
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("texture readback encoder"),
        });
    encoder.copy_texture_to_buffer(
        texture.as_image_copy(),
        wgpu::TexelCopyBufferInfo {
            buffer: &buffer,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded_row),
                rows_per_image: Some(height),
            },
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
    gpu.queue.submit(std::iter::once(encoder.finish()));

    let slice = buffer.slice(..);
    let (sender, receiver) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        sender.send(result).ok();
    });
    gpu.device
        .poll(wgpu::PollType::Wait {
            submission_index: None,
            timeout: None,
        })
        .ok();

    match receiver.recv() {
        Ok(Ok(())) => {
            let mapped = slice.get_mapped_range();
            let mut pixels = Vec::with_capacity((row_bytes * height) as usize);
            for row in mapped.chunks(padded_row as usize) {
                pixels.extend_from_slice(&row[..row_bytes as usize]);
            }
            drop(mapped);
            buffer.unmap();
            Some(pixels)
        }
        Ok(Err(e)) => {
            log::warn!("Texture readback failed: {e:?}");
            None
        }
        Err(_) => {
            log::warn!("Texture readback channel closed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn white_texture_at_slot_zero() {
        let store = TextureStore::new(None);
        let white = store.get(TextureId::WHITE).unwrap();
        assert_eq!((white.width, white.height), (1, 1));
        assert_eq!(store.read(None, TextureId::WHITE), Some(vec![255; 4]));
    }

    #[test]
    fn released_slots_are_reused() {
        let mut store = TextureStore::new(None);
        let a = store.create(None, "a", 1, 1, Filter::Linear, false, &[0; 4]);
        let b = store.create(None, "b", 1, 1, Filter::Linear, false, &[0; 4]);
        assert!(store.release(a));
        assert!(!store.release(a));
        let c = store.create(None, "c", 1, 1, Filter::Linear, false, &[0; 4]);
        assert_eq!(c, a);
        assert_ne!(c, b);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn white_cannot_be_released() {
        let mut store = TextureStore::new(None);
        assert!(!store.release(TextureId::WHITE));
    }

    #[test]
    fn upload_replaces_shadow() {
        let mut store = TextureStore::new(None);
        let id = store.create(None, "t", 1, 1, Filter::Linear, false, &[0; 4]);
        assert!(store.upload(None, id, &[1, 2, 3, 4]));
        assert_eq!(store.read(None, id), Some(vec![1, 2, 3, 4]));
    }
}
