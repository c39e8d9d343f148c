// SPDX-License-Identifier: GPL-3.0-only

//! Per-frame draw state machine
//!
//! Each [`Renderer::draw`] call walks:
//!
//! ```text
//! poll frame -> validate planes/calibration -> acquire target -> acquire gate
//!   -> upload textures -> select ring slot -> write uniforms -> encode+submit
//! ```
//!
//! Any missing input ends the walk with [`DrawOutcome::Skipped`]. A skip
//! after the gate was entered returns the permit immediately, so skipped
//! frames never hold gate capacity. A backend that declines the submit
//! also yields a skip; its ring slot has already been consumed.

use crate::backends::camera::{
    CaptureMode, CapturedFrame, ConfidenceLevel, FrameSource, Orientation, ViewportSize,
};
use crate::constants::MAX_FRAMES_IN_FLIGHT;
use crate::errors::RendererError;
use crate::render::{
    Affine, CompositeUniforms, CompositorBackend, FrameCompletion, FrameGate, RenderControls,
    ThresholdState, UniformRing,
};
use std::sync::Arc;
use tracing::{info, trace, warn};

/// Why a draw produced no frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Source had no frame
    NoFrame,
    /// Color buffer has fewer than two planes
    MissingColorPlanes,
    /// Mode needs a depth plane and the frame has none
    MissingDepth,
    /// Mode needs a confidence plane and the frame has none
    MissingConfidence,
    /// Front-sensor frame without calibration data
    MissingCalibration,
    /// Destination could not provide a render target
    NoRenderTarget,
    /// A plane could not be turned into a texture
    TexturesUnavailable,
}

/// Result of one draw call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawOutcome {
    Submitted { frame: u64, slot: usize },
    Skipped(SkipReason),
}

impl DrawOutcome {
    pub fn is_submitted(&self) -> bool {
        matches!(self, DrawOutcome::Submitted { .. })
    }
}

/// Running draw counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub submitted: u64,
    pub skipped: u64,
    pub uniform_uploads: u64,
}

/// Check that `frame` carries everything `mode` needs
pub fn check_frame(frame: &CapturedFrame, mode: CaptureMode) -> Result<(), SkipReason> {
    if mode.requires_calibration() && !frame.calibration_present {
        return Err(SkipReason::MissingCalibration);
    }
    if frame.color.plane_count() < 2 {
        return Err(SkipReason::MissingColorPlanes);
    }
    if frame.depth.is_none() {
        return Err(SkipReason::MissingDepth);
    }
    if mode.uses_confidence() && frame.confidence.is_none() {
        return Err(SkipReason::MissingConfidence);
    }
    Ok(())
}

/// Depth-clipping compositor
pub struct Renderer<B: CompositorBackend> {
    backend: B,
    mode: CaptureMode,
    orientation: Orientation,
    controls: Arc<RenderControls>,
    ring: UniformRing<B::UniformBuffer>,
    gate: Arc<FrameGate>,
    stats: RenderStats,
}

impl<B: CompositorBackend> Renderer<B> {
    /// Create a renderer with a ring of [`MAX_FRAMES_IN_FLIGHT`] slots
    pub fn new(
        mut backend: B,
        mode: CaptureMode,
        thresholds: ThresholdState,
    ) -> Result<Self, RendererError> {
        let buffers = (0..MAX_FRAMES_IN_FLIGHT)
            .map(|index| backend.create_uniform_buffer(index))
            .collect::<Result<Vec<_>, _>>()?;

        info!(%mode, ring = buffers.len(), "Compositor renderer created");

        Ok(Self {
            backend,
            mode,
            orientation: Orientation::Portrait,
            controls: Arc::new(RenderControls::new(thresholds)),
            ring: UniformRing::new(buffers),
            // Gate and ring share one size
            gate: FrameGate::new(MAX_FRAMES_IN_FLIGHT),
            stats: RenderStats::default(),
        })
    }

    /// Display orientation passed to the frame source (portrait by default)
    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn mode(&self) -> CaptureMode {
        self.mode
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    /// Shared controls handle for the UI thread
    pub fn controls(&self) -> Arc<RenderControls> {
        Arc::clone(&self.controls)
    }

    pub fn thresholds(&self) -> ThresholdState {
        self.controls.snapshot()
    }

    pub fn set_confidence_threshold(&self, level: ConfidenceLevel) -> bool {
        self.controls.set_confidence_threshold(level)
    }

    pub fn set_near_depth_threshold(&self, near: f32) -> bool {
        self.controls.set_near_depth_threshold(near)
    }

    pub fn set_far_depth_threshold(&self, far: f32) -> bool {
        self.controls.set_far_depth_threshold(far)
    }

    pub fn on_viewport_resized(&self, size: ViewportSize) -> bool {
        self.controls.set_viewport(size)
    }

    pub fn gate(&self) -> &Arc<FrameGate> {
        &self.gate
    }

    pub fn ring(&self) -> &UniformRing<B::UniformBuffer> {
        &self.ring
    }

    pub fn stats(&self) -> RenderStats {
        self.stats
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// View-to-camera transform for the current viewport
    ///
    /// Falls back to identity when the source's display transform cannot be
    /// inverted (e.g. before the first resize).
    pub fn view_to_camera<S: FrameSource + ?Sized>(&self, source: &S) -> Affine {
        let viewport = self.controls.viewport();
        let display = source.display_transform(self.orientation, viewport);
        display.inverted().unwrap_or_else(|| {
            warn!(?viewport, "Display transform is not invertible, using identity");
            Affine::IDENTITY
        })
    }

    /// Composite the source's current frame
    pub fn draw<S: FrameSource + ?Sized>(&mut self, source: &S) -> DrawOutcome {
        let Some(frame) = source.current_frame() else {
            return self.skip(SkipReason::NoFrame);
        };
        if let Err(reason) = check_frame(&frame, self.mode) {
            return self.skip(reason);
        }

        let Some(target) = self.backend.acquire_target() else {
            return self.skip(SkipReason::NoRenderTarget);
        };

        let permit = self.gate.acquire();

        let Some(textures) = self.backend.upload_textures(&frame, self.mode) else {
            drop(permit);
            return self.skip(SkipReason::TexturesUnavailable);
        };

        let uniforms = CompositeUniforms::new(&self.view_to_camera(source), self.controls.snapshot());
        let slot_index = self.ring.advance();
        let slot = self.ring.slot_mut(slot_index);
        if slot.needs_upload(&uniforms) {
            self.backend.write_uniforms(slot.buffer(), &uniforms);
            slot.mark_uploaded(uniforms);
            self.stats.uniform_uploads += 1;
        }

        let frame_number = self.stats.submitted + 1;
        let completion = FrameCompletion::new(frame_number, slot_index, permit);
        if !self
            .backend
            .submit(target, slot.buffer(), textures, completion)
        {
            return self.skip(SkipReason::TexturesUnavailable);
        }
        self.stats.submitted = frame_number;

        trace!(frame = frame_number, slot = slot_index, "Frame submitted");
        DrawOutcome::Submitted {
            frame: frame_number,
            slot: slot_index,
        }
    }

    fn skip(&mut self, reason: SkipReason) -> DrawOutcome {
        self.stats.skipped += 1;
        trace!(?reason, "Frame skipped");
        DrawOutcome::Skipped(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::PixelBuffer;

    fn frame(color_planes: usize, depth: bool, confidence: bool, calibration: bool) -> CapturedFrame {
        let color = if color_planes >= 2 {
            PixelBuffer::nv12(2, 2, &[0; 4], &[128; 2])
        } else {
            PixelBuffer::confidence(2, 2, &[0; 4])
        };
        CapturedFrame {
            color: Arc::new(color),
            depth: depth.then(|| Arc::new(PixelBuffer::depth(1, 1, &[0.5]))),
            confidence: confidence.then(|| Arc::new(PixelBuffer::confidence(1, 1, &[2]))),
            calibration_present: calibration,
        }
    }

    #[test]
    fn wide_mode_requires_confidence_but_not_calibration() {
        let mode = CaptureMode::DepthSensorWide;
        assert_eq!(check_frame(&frame(2, true, true, false), mode), Ok(()));
        assert_eq!(
            check_frame(&frame(2, true, false, false), mode),
            Err(SkipReason::MissingConfidence)
        );
        assert_eq!(
            check_frame(&frame(1, true, true, false), mode),
            Err(SkipReason::MissingColorPlanes)
        );
    }

    #[test]
    fn front_mode_requires_calibration_but_not_confidence() {
        let mode = CaptureMode::FrontDepthSensor;
        assert_eq!(check_frame(&frame(2, true, false, true), mode), Ok(()));
        assert_eq!(
            check_frame(&frame(2, true, false, false), mode),
            Err(SkipReason::MissingCalibration)
        );
        assert_eq!(
            check_frame(&frame(2, false, false, true), mode),
            Err(SkipReason::MissingDepth)
        );
    }
}
