// SPDX-License-Identifier: GPL-3.0-only

//! Frame sources feeding the compositor
//!
//! The compositor pulls one [`CapturedFrame`] per display tick from a
//! [`FrameSource`]. Session lifecycle (sensor configuration, interruptions,
//! tracking loss) stays inside the source; the compositor only sees frames
//! or their absence.

pub mod frame_loop;
pub mod synthetic;
pub mod types;

pub use frame_loop::{CaptureLoopController, LoopAction};
pub use synthetic::{SyntheticFrameSource, SyntheticOptions};
pub use types::{
    CaptureMode, CapturedFrame, ConfidenceLevel, Orientation, PixelBuffer, PixelFormat,
    PlaneLayout, PlaneView, ViewportSize,
};

use crate::render::Affine;

/// Pull-based access to the latest sensor output
pub trait FrameSource {
    /// Latest frame, or `None` while the session has nothing usable
    fn current_frame(&self) -> Option<CapturedFrame>;

    /// Mapping from normalized camera image coordinates to normalized view
    /// coordinates for the given orientation and viewport
    fn display_transform(&self, orientation: Orientation, viewport: ViewportSize) -> Affine;
}

impl<T: FrameSource + ?Sized> FrameSource for std::sync::Arc<T> {
    fn current_frame(&self) -> Option<CapturedFrame> {
        (**self).current_frame()
    }

    fn display_transform(&self, orientation: Orientation, viewport: ViewportSize) -> Affine {
        (**self).display_transform(orientation, viewport)
    }
}
