// SPDX-License-Identifier: GPL-3.0-only

//! Depth Clipper - real-time depth-clipping compositor
//!
//! Composites a depth camera's color image so that only pixels whose depth
//! lies inside a user-controlled `[near, far]` window (and, for the wide
//! sensor, whose confidence is high enough) remain visible.
//!
//! # Architecture
//!
//! - [`backends`]: frame sources and the types describing captured frames
//! - [`render`]: the compositor (renderer state machine, GPU backend,
//!   uniform ring, frame gate, CPU reference)
//! - [`shaders`]: WGSL source and GPU helpers
//! - [`gpu`]: wgpu device creation
//! - [`config`]: persisted thresholds and capture mode
//!
//! # Example
//!
//! ```ignore
//! let (device, queue, _) = depth_clipper::gpu::create_headless_render_device("demo").await?;
//! let destination = OffscreenDestination::new(device.clone(), 390, 844)?;
//! let backend = WgpuBackend::new(device, queue, destination, CaptureMode::DepthSensorWide)?;
//! let mut renderer = Renderer::new(backend, CaptureMode::DepthSensorWide, ThresholdState::default())?;
//! renderer.on_viewport_resized(ViewportSize::new(390.0, 844.0));
//! renderer.draw(&source);
//! ```

pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod gpu;
pub mod render;
pub mod shaders;

// Re-export commonly used types
pub use backends::camera::{
    CaptureMode, CapturedFrame, ConfidenceLevel, FrameSource, Orientation, PixelBuffer,
    SyntheticFrameSource, ViewportSize,
};
pub use config::Config;
pub use errors::{AppError, AppResult, ConfigError, RendererError};
pub use render::{DrawOutcome, Renderer, SkipReason, ThresholdState, WgpuBackend};
