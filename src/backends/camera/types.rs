// SPDX-License-Identifier: GPL-3.0-only

//! Shared types for frame sources

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Which depth sensor feeds the compositor
///
/// Fixed for the lifetime of a renderer: it decides which planes a frame
/// must carry and which fragment variant runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CaptureMode {
    /// Rear wide-angle depth sensor with per-pixel confidence
    #[default]
    DepthSensorWide,
    /// Front depth sensor; frames must carry camera calibration
    FrontDepthSensor,
}

impl CaptureMode {
    pub const ALL: [CaptureMode; 2] = [CaptureMode::DepthSensorWide, CaptureMode::FrontDepthSensor];

    /// Whether frames in this mode are gated by a confidence plane
    pub fn uses_confidence(self) -> bool {
        matches!(self, CaptureMode::DepthSensorWide)
    }

    /// Whether frames in this mode must carry calibration data to be drawn
    pub fn requires_calibration(self) -> bool {
        matches!(self, CaptureMode::FrontDepthSensor)
    }
}

impl std::fmt::Display for CaptureMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureMode::DepthSensorWide => write!(f, "wide depth sensor"),
            CaptureMode::FrontDepthSensor => write!(f, "front depth sensor"),
        }
    }
}

/// Per-pixel depth confidence class, ordered from least to most reliable
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[repr(u8)]
pub enum ConfidenceLevel {
    Low = 0,
    #[default]
    Medium = 1,
    High = 2,
}

impl ConfidenceLevel {
    pub const ALL: [ConfidenceLevel; 3] = [
        ConfidenceLevel::Low,
        ConfidenceLevel::Medium,
        ConfidenceLevel::High,
    ];

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for ConfidenceLevel {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ConfidenceLevel::Low),
            1 => Ok(ConfidenceLevel::Medium),
            2 => Ok(ConfidenceLevel::High),
            other => Err(other),
        }
    }
}

/// Display orientation used when asking the source for its display transform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Orientation {
    #[default]
    Portrait,
    PortraitUpsideDown,
    LandscapeLeft,
    LandscapeRight,
}

/// Viewport size in points
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ViewportSize {
    pub width: f32,
    pub height: f32,
}

impl ViewportSize {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// True when either side is zero, negative or not finite
    pub fn is_empty(&self) -> bool {
        !(self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0)
    }
}

/// Layout of a pixel buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// Bi-planar YCbCr 4:2:0: plane 0 is Y, plane 1 is interleaved CbCr at half size
    Nv12,
    /// Single plane of little-endian f32 depth values
    DepthF32,
    /// Single plane of u8 confidence classes
    ConfidenceU8,
}

/// Geometry of one plane inside a pixel buffer's storage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaneLayout {
    pub width: u32,
    pub height: u32,
    /// Row stride in bytes, including any padding
    pub bytes_per_row: u32,
    /// Byte offset of the plane's first row within the buffer
    pub offset: usize,
}

impl PlaneLayout {
    /// Bytes covered by the plane's rows
    pub fn byte_len(&self) -> usize {
        self.bytes_per_row as usize * self.height as usize
    }
}

/// A sensor-owned pixel buffer
///
/// Storage is a single shared allocation; planes are described by
/// [`PlaneLayout`]s pointing into it, the way camera pipelines hand out
/// NV12 frames.
#[derive(Clone)]
pub struct PixelBuffer {
    format: PixelFormat,
    planes: Vec<PlaneLayout>,
    data: Arc<[u8]>,
}

impl PixelBuffer {
    /// Build a buffer from raw storage and plane layouts
    ///
    /// No validation happens here; malformed buffers are caught when a
    /// plane is viewed.
    pub fn from_planes(format: PixelFormat, planes: Vec<PlaneLayout>, data: Arc<[u8]>) -> Self {
        Self {
            format,
            planes,
            data,
        }
    }

    /// Tightly packed NV12 buffer from separate Y and CbCr planes
    pub fn nv12(width: u32, height: u32, y: &[u8], cbcr: &[u8]) -> Self {
        let chroma_width = width.div_ceil(2);
        let chroma_height = height.div_ceil(2);
        let mut data = Vec::with_capacity(y.len() + cbcr.len());
        data.extend_from_slice(y);
        data.extend_from_slice(cbcr);
        let planes = vec![
            PlaneLayout {
                width,
                height,
                bytes_per_row: width,
                offset: 0,
            },
            PlaneLayout {
                width: chroma_width,
                height: chroma_height,
                bytes_per_row: chroma_width * 2,
                offset: y.len(),
            },
        ];
        Self::from_planes(PixelFormat::Nv12, planes, data.into())
    }

    /// Single-plane depth map
    pub fn depth(width: u32, height: u32, values: &[f32]) -> Self {
        let planes = vec![PlaneLayout {
            width,
            height,
            bytes_per_row: width * 4,
            offset: 0,
        }];
        let data: Vec<u8> = bytemuck::cast_slice(values).to_vec();
        Self::from_planes(PixelFormat::DepthF32, planes, data.into())
    }

    /// Single-plane confidence map
    pub fn confidence(width: u32, height: u32, levels: &[u8]) -> Self {
        let planes = vec![PlaneLayout {
            width,
            height,
            bytes_per_row: width,
            offset: 0,
        }];
        Self::from_planes(PixelFormat::ConfidenceU8, planes, levels.to_vec().into())
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn plane_count(&self) -> usize {
        self.planes.len()
    }

    /// Width of the first plane
    pub fn width(&self) -> u32 {
        self.planes.first().map(|p| p.width).unwrap_or(0)
    }

    /// Height of the first plane
    pub fn height(&self) -> u32 {
        self.planes.first().map(|p| p.height).unwrap_or(0)
    }

    /// Borrow one plane
    ///
    /// Returns `None` when the plane does not exist or its rows run past the
    /// end of the storage.
    pub fn plane(&self, index: usize) -> Option<PlaneView<'_>> {
        let layout = *self.planes.get(index)?;
        let end = layout.offset.checked_add(layout.byte_len())?;
        let bytes = self.data.get(layout.offset..end)?;
        Some(PlaneView { layout, bytes })
    }
}

impl std::fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("format", &self.format)
            .field("planes", &self.planes)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// Borrowed view of one plane
///
/// Only valid while the frame that owns the buffer is held; the sensor
/// recycles buffer memory once the next frame is produced.
#[derive(Debug, Clone, Copy)]
pub struct PlaneView<'a> {
    layout: PlaneLayout,
    bytes: &'a [u8],
}

impl<'a> PlaneView<'a> {
    pub fn width(&self) -> u32 {
        self.layout.width
    }

    pub fn height(&self) -> u32 {
        self.layout.height
    }

    pub fn bytes_per_row(&self) -> u32 {
        self.layout.bytes_per_row
    }

    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Bytes of one texel row, without stride padding
    pub fn row(&self, y: u32, bytes_per_texel: u32) -> Option<&'a [u8]> {
        if y >= self.layout.height {
            return None;
        }
        let start = y as usize * self.layout.bytes_per_row as usize;
        let len = self.layout.width as usize * bytes_per_texel as usize;
        self.bytes.get(start..start + len)
    }

    /// Whether each row holds at least `width * bytes_per_texel` bytes
    pub fn fits_texels(&self, bytes_per_texel: u32) -> bool {
        self.layout.width > 0
            && self.layout.height > 0
            && self.layout.width as u64 * bytes_per_texel as u64 <= self.layout.bytes_per_row as u64
    }
}

/// One tick's worth of sensor output
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    /// Bi-planar YCbCr color image
    pub color: Arc<PixelBuffer>,
    /// Depth map, aligned to the color image
    pub depth: Option<Arc<PixelBuffer>>,
    /// Confidence map (wide sensor only)
    pub confidence: Option<Arc<PixelBuffer>>,
    /// Whether the frame carries camera calibration data
    pub calibration_present: bool,
}
