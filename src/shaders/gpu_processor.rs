// SPDX-License-Identifier: GPL-3.0-only

//! Texture size tracking and buffer readback shared by the render modules

use crate::errors::RendererError;

/// Last allocated texture size; a change forces reallocation
#[derive(Default, Clone, Copy, PartialEq, Debug)]
pub struct CachedDimensions {
    pub width: u32,
    pub height: u32,
}

impl CachedDimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn needs_update(&self, width: u32, height: u32) -> bool {
        self.width != width || self.height != height
    }
}

/// Row stride for texture-to-buffer copies, rounded up to wgpu's alignment
#[inline]
pub fn padded_bytes_per_row(width: u32, bytes_per_texel: u32) -> u32 {
    let unpadded = width * bytes_per_texel;
    unpadded.div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT) * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT
}

/// Map a `MAP_READ` buffer, wait for the device, and copy its contents out
pub async fn read_buffer_async(
    device: &wgpu::Device,
    buffer: &wgpu::Buffer,
) -> Result<Vec<u8>, RendererError> {
    let slice = buffer.slice(..);
    let (sender, receiver) = futures::channel::oneshot::channel();

    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = sender.send(result);
    });

    device
        .poll(wgpu::PollType::wait_indefinitely())
        .map_err(|e| RendererError::Readback(format!("Device poll failed: {e}")))?;

    receiver
        .await
        .map_err(|_| RendererError::Readback("Buffer mapping callback dropped".into()))?
        .map_err(|e| RendererError::Readback(format!("Failed to map buffer: {e:?}")))?;

    let data = slice.get_mapped_range().to_vec();
    buffer.unmap();

    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cached_dimensions() {
        assert!(CachedDimensions::default().needs_update(64, 48));

        let dims = CachedDimensions::new(64, 48);
        assert!(!dims.needs_update(64, 48));
        assert!(dims.needs_update(64, 49));
        assert_eq!(dims, CachedDimensions::new(64, 48));
    }

    #[test]
    fn test_padded_bytes_per_row() {
        assert_eq!(padded_bytes_per_row(1, 4), 256);
        assert_eq!(padded_bytes_per_row(64, 4), 256);
        assert_eq!(padded_bytes_per_row(65, 4), 512);
        assert_eq!(padded_bytes_per_row(390, 4), 1792);
    }
}
