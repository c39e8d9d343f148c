// SPDX-License-Identifier: GPL-3.0-only

//! Render destinations: where a composited frame is drawn

use crate::errors::RendererError;
use crate::render::DestinationFormats;
use crate::shaders::{padded_bytes_per_row, read_buffer_async};
use image::RgbaImage;
use std::sync::Arc;
use tracing::debug;

/// Attachments for one frame
pub struct RenderTarget {
    /// Color attachment (multisampled when the destination uses MSAA)
    pub view: wgpu::TextureView,
    /// Single-sample texture the MSAA attachment resolves into
    pub resolve_view: Option<wgpu::TextureView>,
    pub depth_view: Option<wgpu::TextureView>,
}

/// Supplier of render targets and their formats
pub trait RenderDestination {
    fn formats(&self) -> DestinationFormats;

    fn color_format(&self) -> wgpu::TextureFormat {
        self.formats().color
    }

    fn depth_stencil_format(&self) -> Option<wgpu::TextureFormat> {
        self.formats().depth_stencil
    }

    fn sample_count(&self) -> u32 {
        self.formats().sample_count
    }

    /// Target for the next frame, or `None` if none is available right now
    fn acquire_target(&mut self) -> Option<RenderTarget>;
}

fn create_attachment(
    device: &wgpu::Device,
    label: &str,
    width: u32,
    height: u32,
    format: wgpu::TextureFormat,
    sample_count: u32,
    usage: wgpu::TextureUsages,
) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage,
        view_formats: &[],
    })
}

fn create_depth_attachment(
    device: &wgpu::Device,
    width: u32,
    height: u32,
    formats: DestinationFormats,
) -> Option<wgpu::Texture> {
    formats.depth_stencil.map(|format| {
        create_attachment(
            device,
            "depth-clipper depth attachment",
            width,
            height,
            format,
            formats.sample_count,
            wgpu::TextureUsages::RENDER_ATTACHMENT,
        )
    })
}

/// Offscreen color texture with optional depth and MSAA attachments
pub struct OffscreenDestination {
    device: Arc<wgpu::Device>,
    width: u32,
    height: u32,
    formats: DestinationFormats,
    color: wgpu::Texture,
    multisampled: Option<wgpu::Texture>,
    depth: Option<wgpu::Texture>,
}

impl OffscreenDestination {
    /// `width × height` RGBA8 destination without depth or MSAA
    pub fn new(device: Arc<wgpu::Device>, width: u32, height: u32) -> Result<Self, RendererError> {
        Self::with_formats(
            device,
            width,
            height,
            DestinationFormats::color_only(wgpu::TextureFormat::Rgba8Unorm),
        )
    }

    pub fn with_formats(
        device: Arc<wgpu::Device>,
        width: u32,
        height: u32,
        formats: DestinationFormats,
    ) -> Result<Self, RendererError> {
        if width == 0 || height == 0 {
            return Err(RendererError::Destination(format!(
                "Invalid destination size {width}x{height}"
            )));
        }
        if formats.sample_count == 0 {
            return Err(RendererError::Destination("Sample count must be at least 1".into()));
        }

        let color = create_attachment(
            &device,
            "depth-clipper offscreen color",
            width,
            height,
            formats.color,
            1,
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        );
        let multisampled = (formats.sample_count > 1).then(|| {
            create_attachment(
                &device,
                "depth-clipper offscreen msaa color",
                width,
                height,
                formats.color,
                formats.sample_count,
                wgpu::TextureUsages::RENDER_ATTACHMENT,
            )
        });
        let depth = create_depth_attachment(&device, width, height, formats);

        debug!(width, height, ?formats, "Offscreen destination allocated");
        Ok(Self {
            device,
            width,
            height,
            formats,
            color,
            multisampled,
            depth,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn set_color_format(&mut self, format: wgpu::TextureFormat) -> Result<(), RendererError> {
        self.reformat(DestinationFormats {
            color: format,
            ..self.formats
        })
    }

    pub fn set_depth_stencil_format(
        &mut self,
        format: Option<wgpu::TextureFormat>,
    ) -> Result<(), RendererError> {
        self.reformat(DestinationFormats {
            depth_stencil: format,
            ..self.formats
        })
    }

    pub fn set_sample_count(&mut self, sample_count: u32) -> Result<(), RendererError> {
        self.reformat(DestinationFormats {
            sample_count,
            ..self.formats
        })
    }

    fn reformat(&mut self, formats: DestinationFormats) -> Result<(), RendererError> {
        if formats != self.formats {
            *self = Self::with_formats(Arc::clone(&self.device), self.width, self.height, formats)?;
        }
        Ok(())
    }

    /// The single-sample color texture frames end up in
    pub fn color_texture(&self) -> &wgpu::Texture {
        &self.color
    }

    /// Copy the color texture back to the CPU
    ///
    /// Only RGBA8 destinations can be read back. Work submitted before this
    /// call is included.
    pub async fn read_rgba(&self, queue: &wgpu::Queue) -> Result<RgbaImage, RendererError> {
        if !matches!(
            self.formats.color,
            wgpu::TextureFormat::Rgba8Unorm | wgpu::TextureFormat::Rgba8UnormSrgb
        ) {
            return Err(RendererError::Readback(format!(
                "Cannot read back {:?} destination as RGBA8",
                self.formats.color
            )));
        }

        let padded_row = padded_bytes_per_row(self.width, 4);
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("depth-clipper readback buffer"),
            size: padded_row as u64 * self.height as u64,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("depth-clipper readback encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.color,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_row),
                    rows_per_image: Some(self.height),
                },
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );
        queue.submit(Some(encoder.finish()));

        let data = read_buffer_async(&self.device, &buffer).await?;

        let row_bytes = (self.width * 4) as usize;
        let mut pixels = Vec::with_capacity(row_bytes * self.height as usize);
        for row in data.chunks_exact(padded_row as usize) {
            pixels.extend_from_slice(&row[..row_bytes]);
        }

        RgbaImage::from_raw(self.width, self.height, pixels)
            .ok_or_else(|| RendererError::Readback("Readback size mismatch".into()))
    }
}

impl RenderDestination for OffscreenDestination {
    fn formats(&self) -> DestinationFormats {
        self.formats
    }

    fn acquire_target(&mut self) -> Option<RenderTarget> {
        let color_view = self.color.create_view(&wgpu::TextureViewDescriptor::default());
        let depth_view = self
            .depth
            .as_ref()
            .map(|t| t.create_view(&wgpu::TextureViewDescriptor::default()));

        Some(match &self.multisampled {
            Some(msaa) => RenderTarget {
                view: msaa.create_view(&wgpu::TextureViewDescriptor::default()),
                resolve_view: Some(color_view),
                depth_view,
            },
            None => RenderTarget {
                view: color_view,
                resolve_view: None,
                depth_view,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_offscreen_formats_and_targets() {
        let Ok((device, _queue, _)) =
            crate::gpu::create_headless_render_device("destination-test").await
        else {
            println!("Skipping test (no GPU)");
            return;
        };

        assert!(OffscreenDestination::new(Arc::clone(&device), 0, 10).is_err());

        let mut destination = OffscreenDestination::new(device, 8, 4).unwrap();
        assert_eq!(destination.sample_count(), 1);
        assert_eq!(destination.color_format(), wgpu::TextureFormat::Rgba8Unorm);
        let target = destination.acquire_target().unwrap();
        assert!(target.resolve_view.is_none());
        assert!(target.depth_view.is_none());

        destination
            .set_depth_stencil_format(Some(wgpu::TextureFormat::Depth32Float))
            .unwrap();
        destination.set_sample_count(4).unwrap();
        let target = destination.acquire_target().unwrap();
        assert!(target.resolve_view.is_some());
        assert!(target.depth_view.is_some());
        assert_eq!(
            destination.depth_stencil_format(),
            Some(wgpu::TextureFormat::Depth32Float)
        );
        assert_eq!(destination.color_texture().sample_count(), 1);
    }
}
