// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use std::time::Duration;

/// Maximum number of frames the CPU may queue ahead of the GPU
///
/// The uniform ring and the frame gate are both sized from this value so a
/// ring slot is never rewritten while a draw that reads it may still run.
pub const MAX_FRAMES_IN_FLIGHT: usize = 3;

/// Depth threshold limits and defaults, in normalized depth units
pub mod thresholds {
    use crate::backends::camera::ConfidenceLevel;

    /// Lower bound accepted by the near/far setters
    pub const MIN_DEPTH: f32 = 0.0;
    /// Upper bound accepted by the near/far setters
    pub const MAX_DEPTH: f32 = 1.0;

    pub const DEFAULT_NEAR: f32 = 0.0;
    pub const DEFAULT_FAR: f32 = 0.5;
    pub const DEFAULT_CONFIDENCE: ConfidenceLevel = ConfidenceLevel::Medium;
}

/// Bind group slots shared by the compositor shader and its layouts
///
/// Must match the `@binding` attributes in `composite.wgsl`.
pub mod bindings {
    pub const UNIFORMS: u32 = 0;
    pub const TEXTURE_Y: u32 = 1;
    pub const TEXTURE_CBCR: u32 = 2;
    pub const TEXTURE_DEPTH: u32 = 3;
    pub const SAMPLER: u32 = 4;
    pub const TEXTURE_CONFIDENCE: u32 = 5;
}

/// Display-loop timing
pub mod timing {
    use super::Duration;

    /// Default display tick (60 Hz)
    pub const FRAME_INTERVAL: Duration = Duration::from_micros(16_667);

    /// Sleep between non-blocking device polls on the completion thread
    pub const COMPLETION_POLL_INTERVAL: Duration = Duration::from_millis(1);
}

/// Synthetic frame source defaults
pub mod synthetic {
    /// Color plane size (landscape, like a phone camera sensor)
    pub const COLOR_WIDTH: u32 = 256;
    pub const COLOR_HEIGHT: u32 = 192;

    /// Depth/confidence plane size
    pub const DEPTH_WIDTH: u32 = 64;
    pub const DEPTH_HEIGHT: u32 = 48;
}

/// Default viewport for headless rendering (portrait)
pub const DEFAULT_VIEWPORT: (u32, u32) = (390, 844);

/// Application version for display
pub fn app_version() -> &'static str {
    env!("GIT_VERSION")
}
