// SPDX-License-Identifier: GPL-3.0-only

//! Per-plane GPU textures for camera frames
//!
//! Each plane role keeps a small pool of same-sized textures, one per frame
//! that can be in flight. A texture still referenced by an in-flight frame
//! is never written again; the next idle one in the pool is used instead, so
//! the GPU always reads the data the frame was drawn with. A size change
//! empties the role's pool.

use crate::backends::camera::{CaptureMode, CapturedFrame, PixelBuffer, PixelFormat};
use crate::constants::MAX_FRAMES_IN_FLIGHT;
use crate::shaders::CachedDimensions;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Which frame plane a texture holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaneRole {
    /// Color plane 0
    Luma,
    /// Color plane 1, interleaved Cb/Cr
    Chroma,
    Depth,
    Confidence,
}

impl PlaneRole {
    pub fn texture_format(self) -> wgpu::TextureFormat {
        match self {
            PlaneRole::Luma => wgpu::TextureFormat::R8Unorm,
            PlaneRole::Chroma => wgpu::TextureFormat::Rg8Unorm,
            PlaneRole::Depth => wgpu::TextureFormat::R32Float,
            PlaneRole::Confidence => wgpu::TextureFormat::R8Uint,
        }
    }

    pub fn bytes_per_texel(self) -> u32 {
        match self {
            PlaneRole::Luma | PlaneRole::Confidence => 1,
            PlaneRole::Chroma => 2,
            PlaneRole::Depth => 4,
        }
    }

    /// Buffer format the plane must come from
    pub fn pixel_format(self) -> PixelFormat {
        match self {
            PlaneRole::Luma | PlaneRole::Chroma => PixelFormat::Nv12,
            PlaneRole::Depth => PixelFormat::DepthF32,
            PlaneRole::Confidence => PixelFormat::ConfidenceU8,
        }
    }

    /// Plane index inside the source pixel buffer
    pub fn plane_index(self) -> usize {
        match self {
            PlaneRole::Chroma => 1,
            _ => 0,
        }
    }

    fn label(self) -> &'static str {
        match self {
            PlaneRole::Luma => "depth-clipper luma texture",
            PlaneRole::Chroma => "depth-clipper chroma texture",
            PlaneRole::Depth => "depth-clipper depth texture",
            PlaneRole::Confidence => "depth-clipper confidence texture",
        }
    }
}

/// A plane uploaded to the GPU
///
/// Holding one keeps the texture alive; the renderer holds them until the
/// frame's GPU work completes.
#[derive(Debug, Clone)]
pub struct PlaneTexture {
    pub texture: Arc<wgpu::Texture>,
    pub view: wgpu::TextureView,
}

/// All textures one draw reads
#[derive(Debug, Clone)]
pub struct FrameTextures {
    pub luma: PlaneTexture,
    pub chroma: PlaneTexture,
    pub depth: PlaneTexture,
    /// Wide sensor only
    pub confidence: Option<PlaneTexture>,
}

/// Same-sized allocations for one plane role
///
/// Entries whose only reference is the pool's own are idle and may be
/// written again.
struct PlanePool<T> {
    dims: CachedDimensions,
    capacity: usize,
    entries: Vec<Arc<T>>,
}

impl<T> PlanePool<T> {
    fn new(capacity: usize) -> Self {
        Self {
            dims: CachedDimensions::default(),
            capacity,
            entries: Vec::with_capacity(capacity),
        }
    }

    /// An idle entry of `width × height`, or a new one from `create`
    fn acquire(&mut self, width: u32, height: u32, create: impl FnOnce() -> T) -> Arc<T> {
        if self.dims.needs_update(width, height) {
            self.entries.clear();
            self.dims = CachedDimensions::new(width, height);
        }

        if let Some(idle) = self.entries.iter().find(|e| Arc::strong_count(e) == 1) {
            return Arc::clone(idle);
        }

        let entry = Arc::new(create());
        if self.entries.len() < self.capacity {
            self.entries.push(Arc::clone(&entry));
        } else {
            // Every pooled entry is busy; this one is used once and dropped
            debug!(capacity = self.capacity, "Plane pool exhausted");
        }
        entry
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Converts pixel-buffer planes into textures, reusing allocations
pub struct TextureCache {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    pools: HashMap<PlaneRole, PlanePool<wgpu::Texture>>,
}

impl TextureCache {
    pub fn new(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>) -> Self {
        Self {
            device,
            queue,
            pools: HashMap::new(),
        }
    }

    /// Upload one plane of `buffer` as a texture of `role`'s format
    ///
    /// Returns `None` when the buffer has the wrong format, or the plane is
    /// missing, empty, or has rows shorter than the format needs.
    pub fn make_texture(&mut self, buffer: &PixelBuffer, role: PlaneRole) -> Option<PlaneTexture> {
        if buffer.format() != role.pixel_format() {
            warn!(?role, format = ?buffer.format(), "Pixel buffer format does not match plane role");
            return None;
        }
        let Some(plane) = buffer.plane(role.plane_index()) else {
            warn!(?role, planes = buffer.plane_count(), "Pixel buffer plane missing");
            return None;
        };
        if !plane.fits_texels(role.bytes_per_texel()) {
            warn!(
                ?role,
                width = plane.width(),
                height = plane.height(),
                bytes_per_row = plane.bytes_per_row(),
                "Plane layout does not fit texture format"
            );
            return None;
        }

        let (width, height) = (plane.width(), plane.height());
        let texture = self.texture_for(role, width, height);

        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            plane.bytes(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(plane.bytes_per_row()),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Some(PlaneTexture { texture, view })
    }

    /// Upload every plane `mode` reads
    pub fn prepare_frame(&mut self, frame: &CapturedFrame, mode: CaptureMode) -> Option<FrameTextures> {
        let luma = self.make_texture(&frame.color, PlaneRole::Luma)?;
        let chroma = self.make_texture(&frame.color, PlaneRole::Chroma)?;
        let depth = self.make_texture(frame.depth.as_deref()?, PlaneRole::Depth)?;
        let confidence = if mode.uses_confidence() {
            Some(self.make_texture(frame.confidence.as_deref()?, PlaneRole::Confidence)?)
        } else {
            None
        };
        Some(FrameTextures {
            luma,
            chroma,
            depth,
            confidence,
        })
    }

    fn texture_for(&mut self, role: PlaneRole, width: u32, height: u32) -> Arc<wgpu::Texture> {
        let device = &self.device;
        self.pools
            .entry(role)
            .or_insert_with(|| PlanePool::new(MAX_FRAMES_IN_FLIGHT))
            .acquire(width, height, || {
                debug!(?role, width, height, "Allocating plane texture");
                device.create_texture(&wgpu::TextureDescriptor {
                    label: Some(role.label()),
                    size: wgpu::Extent3d {
                        width,
                        height,
                        depth_or_array_layers: 1,
                    },
                    mip_level_count: 1,
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D2,
                    format: role.texture_format(),
                    usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                    view_formats: &[],
                })
            })
    }
}
