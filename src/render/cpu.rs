// SPDX-License-Identifier: GPL-3.0-only

//! CPU reference compositor
//!
//! Produces the same image as `composite.wgsl` with nearest sampling. Used
//! as the snapshot fallback when no GPU adapter is available and to check
//! the visibility rule in tests.

use crate::backends::camera::{CaptureMode, CapturedFrame, PlaneView};
use crate::render::{Affine, ThresholdState, check_frame};
use image::{Rgba, RgbaImage};

/// Visibility rule shared with the fragment shader
///
/// A pixel survives when `near <= depth <= far` and, if a confidence class
/// is given, it is at least the threshold. NaN depths never survive.
pub fn is_visible(depth: f32, confidence: Option<u8>, thresholds: &ThresholdState) -> bool {
    if !(depth >= thresholds.near && depth <= thresholds.far) {
        return false;
    }
    match confidence {
        Some(class) => class >= thresholds.confidence.as_u8(),
        None => true,
    }
}

/// Per-sample visibility for parallel depth and confidence arrays
pub fn visibility_mask(
    depths: &[f32],
    confidences: Option<&[u8]>,
    thresholds: &ThresholdState,
) -> Vec<bool> {
    depths
        .iter()
        .enumerate()
        .map(|(i, &depth)| {
            let confidence = confidences.map(|c| c.get(i).copied().unwrap_or(0));
            is_visible(depth, confidence, thresholds)
        })
        .collect()
}

/// Full-range BT.601 YCbCr to RGB, all components normalized to `[0, 1]`
pub fn ycbcr_to_rgb(y: f32, cb: f32, cr: f32) -> [f32; 3] {
    let r = y + 1.402 * cr - 0.701;
    let g = y - 0.3441 * cb - 0.7141 * cr + 0.5291;
    let b = y + 1.772 * cb - 0.886;
    [r.clamp(0.0, 1.0), g.clamp(0.0, 1.0), b.clamp(0.0, 1.0)]
}

/// Nearest texel of a plane for normalized coordinates, clamped to the edge
fn texel<'a>(plane: &PlaneView<'a>, u: f32, v: f32, bytes_per_texel: u32) -> Option<&'a [u8]> {
    let x = clamp_index(u, plane.width());
    let y = clamp_index(v, plane.height());
    let row = plane.row(y, bytes_per_texel)?;
    let start = (x * bytes_per_texel) as usize;
    row.get(start..start + bytes_per_texel as usize)
}

fn clamp_index(coord: f32, size: u32) -> u32 {
    let max = size.saturating_sub(1);
    if !coord.is_finite() {
        return 0;
    }
    ((coord * size as f32).floor().max(0.0) as u32).min(max)
}

/// Composite one frame into a `width × height` RGBA image
///
/// Returns `None` when the frame lacks anything `mode` needs or a plane is
/// malformed. Hidden pixels are fully transparent.
pub fn composite_frame(
    frame: &CapturedFrame,
    mode: CaptureMode,
    thresholds: &ThresholdState,
    view_to_camera: &Affine,
    width: u32,
    height: u32,
) -> Option<RgbaImage> {
    check_frame(frame, mode).ok()?;

    let luma = frame.color.plane(0).filter(|p| p.fits_texels(1))?;
    let chroma = frame.color.plane(1).filter(|p| p.fits_texels(2))?;
    let depth_buffer = frame.depth.as_deref()?;
    let depth = depth_buffer.plane(0).filter(|p| p.fits_texels(4))?;
    let confidence = if mode.uses_confidence() {
        let buffer = frame.confidence.as_deref()?;
        Some(buffer.plane(0).filter(|p| p.fits_texels(1))?)
    } else {
        None
    };

    let mut out = RgbaImage::new(width, height);
    for (px, py, pixel) in out.enumerate_pixels_mut() {
        let vu = (px as f32 + 0.5) / width as f32;
        let vv = (py as f32 + 0.5) / height as f32;
        let (u, v) = view_to_camera.apply(vu, vv);

        let d = texel(&depth, u, v, 4)
            .and_then(|b| b.try_into().ok())
            .map(f32::from_le_bytes)
            .unwrap_or(f32::NAN);
        let c = confidence
            .as_ref()
            .map(|plane| texel(plane, u, v, 1).map(|b| b[0]).unwrap_or(0));

        if !is_visible(d, c, thresholds) {
            *pixel = Rgba([0, 0, 0, 0]);
            continue;
        }

        let y = texel(&luma, u, v, 1).map(|b| b[0]).unwrap_or(0);
        let (cb, cr) = texel(&chroma, u, v, 2)
            .map(|b| (b[0], b[1]))
            .unwrap_or((128, 128));
        let rgb = ycbcr_to_rgb(
            y as f32 / 255.0,
            cb as f32 / 255.0,
            cr as f32 / 255.0,
        );
        *pixel = Rgba([
            (rgb[0] * 255.0).round() as u8,
            (rgb[1] * 255.0).round() as u8,
            (rgb[2] * 255.0).round() as u8,
            255,
        ]);
    }
    Some(out)
}
