// SPDX-License-Identifier: GPL-3.0-only

//! Synthetic depth-camera frames for headless runs and tests
//!
//! - Color: luma ramps left to right, chroma varies with position
//! - Depth: horizontal ramp from 0 to 1
//! - Confidence: three horizontal bands (low, medium, high) from top to bottom

use super::types::{
    CaptureMode, CapturedFrame, Orientation, PixelBuffer, PixelFormat, PlaneLayout, ViewportSize,
};
use super::FrameSource;
use crate::constants::synthetic::{COLOR_HEIGHT, COLOR_WIDTH, DEPTH_HEIGHT, DEPTH_WIDTH};
use crate::render::{Affine, aspect_fill_display_transform};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

/// Ways to degrade the generated frames
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyntheticOptions {
    pub drop_calibration: bool,
    pub drop_depth: bool,
    pub drop_confidence: bool,
    /// Deliver only the luma plane
    pub single_plane_color: bool,
}

/// In-memory [`FrameSource`] producing the same frame every tick
pub struct SyntheticFrameSource {
    mode: CaptureMode,
    frame: CapturedFrame,
    options: RwLock<SyntheticOptions>,
    paused: AtomicBool,
    served: AtomicU64,
}

impl SyntheticFrameSource {
    pub fn new(mode: CaptureMode) -> Self {
        Self::with_size(mode, (COLOR_WIDTH, COLOR_HEIGHT), (DEPTH_WIDTH, DEPTH_HEIGHT))
    }

    pub fn with_size(mode: CaptureMode, color: (u32, u32), depth: (u32, u32)) -> Self {
        let (color_width, color_height) = color;
        let (depth_width, depth_height) = depth;
        debug!(%mode, color_width, color_height, depth_width, depth_height, "Synthetic source created");

        let frame = CapturedFrame {
            color: Arc::new(color_gradient(color_width, color_height)),
            depth: Some(Arc::new(depth_ramp(depth_width, depth_height))),
            confidence: mode
                .uses_confidence()
                .then(|| Arc::new(confidence_bands(depth_width, depth_height))),
            // The front sensor always ships calibration with depth
            calibration_present: mode.requires_calibration(),
        };

        Self {
            mode,
            frame,
            options: RwLock::new(SyntheticOptions::default()),
            paused: AtomicBool::new(false),
            served: AtomicU64::new(0),
        }
    }

    pub fn mode(&self) -> CaptureMode {
        self.mode
    }

    pub fn options(&self) -> SyntheticOptions {
        *self.options.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_options(&self, options: SyntheticOptions) {
        *self.options.write().unwrap_or_else(PoisonError::into_inner) = options;
    }

    /// While paused the source has no current frame
    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Release);
    }

    /// Number of frames handed out so far
    pub fn frames_served(&self) -> u64 {
        self.served.load(Ordering::Relaxed)
    }
}

impl FrameSource for SyntheticFrameSource {
    fn current_frame(&self) -> Option<CapturedFrame> {
        if self.paused.load(Ordering::Acquire) {
            return None;
        }
        let options = self.options();
        let mut frame = self.frame.clone();

        if options.drop_calibration {
            frame.calibration_present = false;
        }
        if options.drop_depth {
            frame.depth = None;
        }
        if options.drop_confidence {
            frame.confidence = None;
        }
        if options.single_plane_color {
            frame.color = Arc::new(luma_only(&frame.color));
        }

        self.served.fetch_add(1, Ordering::Relaxed);
        Some(frame)
    }

    fn display_transform(&self, orientation: Orientation, viewport: ViewportSize) -> Affine {
        aspect_fill_display_transform(
            orientation,
            self.frame.color.width(),
            self.frame.color.height(),
            viewport,
        )
    }
}

fn color_gradient(width: u32, height: u32) -> PixelBuffer {
    let luma: Vec<u8> = (0..height)
        .flat_map(|_| (0..width).map(move |x| ramp_u8(x, width)))
        .collect();

    let (chroma_width, chroma_height) = (width.div_ceil(2), height.div_ceil(2));
    let chroma: Vec<u8> = (0..chroma_height)
        .flat_map(|y| {
            (0..chroma_width).flat_map(move |x| [ramp_u8(y, chroma_height), ramp_u8(x, chroma_width)])
        })
        .collect();

    PixelBuffer::nv12(width, height, &luma, &chroma)
}

fn depth_ramp(width: u32, height: u32) -> PixelBuffer {
    let values: Vec<f32> = (0..height)
        .flat_map(|_| (0..width).map(move |x| (x as f32 + 0.5) / width as f32))
        .collect();
    PixelBuffer::depth(width, height, &values)
}

fn confidence_bands(width: u32, height: u32) -> PixelBuffer {
    let levels: Vec<u8> = (0..height)
        .flat_map(|y| {
            let band = (y * 3 / height.max(1)).min(2) as u8;
            std::iter::repeat_n(band, width as usize)
        })
        .collect();
    PixelBuffer::confidence(width, height, &levels)
}

fn luma_only(color: &PixelBuffer) -> PixelBuffer {
    let (width, height) = (color.width(), color.height());
    let (bytes, bytes_per_row) = color
        .plane(0)
        .map(|plane| (plane.bytes().to_vec(), plane.bytes_per_row()))
        .unwrap_or_default();
    let planes = vec![PlaneLayout {
        width,
        height,
        bytes_per_row,
        offset: 0,
    }];
    PixelBuffer::from_planes(PixelFormat::Nv12, planes, bytes.into())
}

fn ramp_u8(i: u32, n: u32) -> u8 {
    if n <= 1 {
        return 128;
    }
    (i * 255 / (n - 1)) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wide_frames_carry_confidence_but_no_calibration() {
        let source = SyntheticFrameSource::new(CaptureMode::DepthSensorWide);
        let frame = source.current_frame().unwrap();
        assert_eq!(frame.color.plane_count(), 2);
        assert!(frame.depth.is_some());
        assert!(frame.confidence.is_some());
        assert!(!frame.calibration_present);
        assert_eq!(source.frames_served(), 1);
    }

    #[test]
    fn front_frames_carry_calibration() {
        let source = SyntheticFrameSource::new(CaptureMode::FrontDepthSensor);
        let frame = source.current_frame().unwrap();
        assert!(frame.calibration_present);
        assert!(frame.confidence.is_none());
    }

    #[test]
    fn depth_ramps_left_to_right() {
        let source = SyntheticFrameSource::with_size(CaptureMode::DepthSensorWide, (8, 4), (4, 3));
        let frame = source.current_frame().unwrap();
        let depth = frame.depth.unwrap();
        let row: Vec<f32> = bytemuck::pod_collect_to_vec(depth.plane(0).unwrap().row(1, 4).unwrap());
        assert_eq!(row, vec![0.125, 0.375, 0.625, 0.875]);

        let confidence = frame.confidence.unwrap();
        let plane = confidence.plane(0).unwrap();
        let bands: Vec<u8> = (0..3).map(|y| plane.row(y, 1).unwrap()[0]).collect();
        assert_eq!(bands, vec![0, 1, 2]);
    }

    #[test]
    fn options_degrade_frames() {
        let source = SyntheticFrameSource::new(CaptureMode::FrontDepthSensor);
        source.set_options(SyntheticOptions {
            drop_calibration: true,
            single_plane_color: true,
            ..Default::default()
        });
        let frame = source.current_frame().unwrap();
        assert!(!frame.calibration_present);
        assert_eq!(frame.color.plane_count(), 1);

        source.set_paused(true);
        assert!(source.current_frame().is_none());
    }
}
