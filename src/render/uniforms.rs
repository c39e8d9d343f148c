// SPDX-License-Identifier: GPL-3.0-only

//! Threshold state shared with the UI and its GPU uniform snapshot

use crate::backends::camera::{ConfidenceLevel, ViewportSize};
use crate::constants::thresholds::{
    DEFAULT_CONFIDENCE, DEFAULT_FAR, DEFAULT_NEAR, MAX_DEPTH, MIN_DEPTH,
};
use crate::render::Affine;
use std::sync::atomic::{AtomicU8, AtomicU32, AtomicU64, Ordering};
use tracing::{debug, warn};

/// Clipping thresholds in normalized depth units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdState {
    pub near: f32,
    pub far: f32,
    pub confidence: ConfidenceLevel,
}

impl Default for ThresholdState {
    fn default() -> Self {
        Self {
            near: DEFAULT_NEAR,
            far: DEFAULT_FAR,
            confidence: DEFAULT_CONFIDENCE,
        }
    }
}

impl ThresholdState {
    /// Clamp both depths into the accepted range without reordering them
    pub fn clamped(self) -> Self {
        Self {
            near: clamp_depth(self.near).unwrap_or(DEFAULT_NEAR),
            far: clamp_depth(self.far).unwrap_or(DEFAULT_FAR),
            confidence: self.confidence,
        }
    }
}

/// Clamp to `[MIN_DEPTH, MAX_DEPTH]`; NaN is rejected and `-0.0` becomes `0.0`
fn clamp_depth(value: f32) -> Option<f32> {
    if value.is_nan() {
        None
    } else {
        // Adding positive zero canonicalizes the sign of zero
        Some(value.clamp(MIN_DEPTH, MAX_DEPTH) + 0.0)
    }
}

/// Live renderer controls written by the UI thread and read per draw
///
/// Every field is an independent atomic: a reader may observe a new `near`
/// with an old `far`, but never a torn value. `f32`s are stored as bits.
#[derive(Debug)]
pub struct RenderControls {
    near: AtomicU32,
    far: AtomicU32,
    confidence: AtomicU8,
    /// Viewport width and height as two `f32` bit patterns
    viewport: AtomicU64,
}

impl Default for RenderControls {
    fn default() -> Self {
        Self::new(ThresholdState::default())
    }
}

impl RenderControls {
    pub fn new(initial: ThresholdState) -> Self {
        let initial = initial.clamped();
        Self {
            near: AtomicU32::new(initial.near.to_bits()),
            far: AtomicU32::new(initial.far.to_bits()),
            confidence: AtomicU8::new(initial.confidence.as_u8()),
            viewport: AtomicU64::new(pack_viewport(ViewportSize::default())),
        }
    }

    pub fn near(&self) -> f32 {
        f32::from_bits(self.near.load(Ordering::Acquire))
    }

    pub fn far(&self) -> f32 {
        f32::from_bits(self.far.load(Ordering::Acquire))
    }

    pub fn confidence(&self) -> ConfidenceLevel {
        ConfidenceLevel::try_from(self.confidence.load(Ordering::Acquire))
            .unwrap_or(DEFAULT_CONFIDENCE)
    }

    pub fn viewport(&self) -> ViewportSize {
        unpack_viewport(self.viewport.load(Ordering::Acquire))
    }

    /// Current thresholds, one atomic load per field
    pub fn snapshot(&self) -> ThresholdState {
        ThresholdState {
            near: self.near(),
            far: self.far(),
            confidence: self.confidence(),
        }
    }

    /// Returns `true` when the value changed
    pub fn set_confidence_threshold(&self, level: ConfidenceLevel) -> bool {
        let previous = self.confidence.swap(level.as_u8(), Ordering::AcqRel);
        let changed = previous != level.as_u8();
        if changed {
            debug!(?level, "Confidence threshold changed");
        }
        changed
    }

    /// Returns `true` when the value changed
    ///
    /// Values are clamped to the accepted depth range; NaN is ignored. The
    /// near/far ordering is the caller's responsibility.
    pub fn set_near_depth_threshold(&self, near: f32) -> bool {
        self.store_depth(&self.near, near, "near")
    }

    /// Returns `true` when the value changed
    pub fn set_far_depth_threshold(&self, far: f32) -> bool {
        self.store_depth(&self.far, far, "far")
    }

    /// Returns `true` when the size changed
    pub fn set_viewport(&self, size: ViewportSize) -> bool {
        let packed = pack_viewport(size);
        let changed = self.viewport.swap(packed, Ordering::AcqRel) != packed;
        if changed {
            debug!(width = size.width, height = size.height, "Viewport resized");
        }
        changed
    }

    fn store_depth(&self, slot: &AtomicU32, value: f32, which: &'static str) -> bool {
        let Some(value) = clamp_depth(value) else {
            warn!(threshold = which, "Ignoring NaN depth threshold");
            return false;
        };
        let bits = value.to_bits();
        let changed = slot.swap(bits, Ordering::AcqRel) != bits;
        if changed {
            debug!(threshold = which, value, "Depth threshold changed");
        }
        changed
    }
}

fn pack_viewport(size: ViewportSize) -> u64 {
    ((size.width.to_bits() as u64) << 32) | size.height.to_bits() as u64
}

fn unpack_viewport(packed: u64) -> ViewportSize {
    ViewportSize {
        width: f32::from_bits((packed >> 32) as u32),
        height: f32::from_bits(packed as u32),
    }
}

/// Uniform block read by both compositor stages
///
/// Layout matches `CompositeUniforms` in `composite.wgsl`: a `mat3x3<f32>`
/// (three 16-byte columns) followed by the thresholds, 64 bytes in total.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CompositeUniforms {
    pub view_to_camera: [[f32; 4]; 3],
    pub near_depth_threshold: f32,
    pub far_depth_threshold: f32,
    pub confidence_threshold: i32,
    pub _padding: u32,
}

impl CompositeUniforms {
    pub fn new(view_to_camera: &Affine, thresholds: ThresholdState) -> Self {
        Self {
            view_to_camera: view_to_camera.to_uniform_columns(),
            near_depth_threshold: thresholds.near,
            far_depth_threshold: thresholds.far,
            confidence_threshold: thresholds.confidence.as_u8() as i32,
            _padding: 0,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_block_is_64_bytes() {
        assert_eq!(std::mem::size_of::<CompositeUniforms>(), 64);
    }

    #[test]
    fn setting_the_current_value_is_a_no_op() {
        let controls = RenderControls::default();
        assert!(!controls.set_near_depth_threshold(DEFAULT_NEAR));
        assert!(!controls.set_far_depth_threshold(DEFAULT_FAR));
        assert!(!controls.set_confidence_threshold(DEFAULT_CONFIDENCE));

        assert!(controls.set_far_depth_threshold(0.8));
        assert!(!controls.set_far_depth_threshold(0.8));
        assert_eq!(controls.far(), 0.8);
    }

    #[test]
    fn negative_zero_equals_zero() {
        let controls = RenderControls::default();
        assert_eq!(controls.near(), 0.0);
        assert!(!controls.set_near_depth_threshold(-0.0));
        assert!(controls.near().is_sign_positive());

        // Clamped below the range lands on the same canonical zero
        assert!(!controls.set_near_depth_threshold(-0.5));
        assert_eq!(controls.near().to_bits(), 0.0f32.to_bits());
    }

    #[test]
    fn depth_thresholds_are_clamped_not_reordered() {
        let controls = RenderControls::default();
        controls.set_near_depth_threshold(1.7);
        controls.set_far_depth_threshold(-3.0);

        let snapshot = controls.snapshot();
        assert_eq!(snapshot.near, MAX_DEPTH);
        assert_eq!(snapshot.far, MIN_DEPTH);
    }

    #[test]
    fn nan_thresholds_are_ignored() {
        let controls = RenderControls::default();
        assert!(!controls.set_near_depth_threshold(f32::NAN));
        assert_eq!(controls.near(), DEFAULT_NEAR);
    }

    #[test]
    fn viewport_round_trips_through_the_atomic() {
        let controls = RenderControls::default();
        assert!(controls.viewport().is_empty());
        assert!(controls.set_viewport(ViewportSize::new(390.0, 844.0)));
        assert!(!controls.set_viewport(ViewportSize::new(390.0, 844.0)));
        assert_eq!(controls.viewport(), ViewportSize::new(390.0, 844.0));
    }

    #[test]
    fn uniforms_carry_thresholds() {
        let thresholds = ThresholdState {
            near: 0.2,
            far: 0.7,
            confidence: ConfidenceLevel::High,
        };
        let uniforms = CompositeUniforms::new(&Affine::IDENTITY, thresholds);
        assert_eq!(uniforms.near_depth_threshold, 0.2);
        assert_eq!(uniforms.far_depth_threshold, 0.7);
        assert_eq!(uniforms.confidence_threshold, 2);
        assert_eq!(uniforms.view_to_camera[2], [0.0, 0.0, 1.0, 0.0]);
    }
}
