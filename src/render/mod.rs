// SPDX-License-Identifier: GPL-3.0-only

//! Depth-clipping compositor
//!
//! Draws the camera color image over a destination, keeping only pixels
//! whose depth falls inside `[near, far]` and (for the wide sensor) whose
//! confidence class meets the threshold.
//!
//! - [`Renderer`]: per-frame state machine, generic over a [`CompositorBackend`]
//! - [`WgpuBackend`]: wgpu implementation (textures, pipeline, submission)
//! - [`cpu`]: reference compositor producing the same image on the CPU
//!
//! At most [`MAX_FRAMES_IN_FLIGHT`](crate::constants::MAX_FRAMES_IN_FLIGHT)
//! frames are queued on the GPU; each owns one slot of the uniform ring
//! until its completion handler runs.

pub mod backend;
pub mod cpu;
pub mod destination;
pub mod gate;
pub mod pipeline;
pub mod renderer;
pub mod ring;
pub mod texture_cache;
pub mod transform;
pub mod uniforms;
pub mod wgpu_backend;

pub use backend::{CompositorBackend, FrameCompletion};
pub use destination::{OffscreenDestination, RenderDestination, RenderTarget};
pub use gate::{FrameGate, FramePermit};
pub use pipeline::{CompositorPipeline, DestinationFormats};
pub use renderer::{DrawOutcome, RenderStats, Renderer, SkipReason, check_frame};
pub use ring::{UniformRing, UniformSlot};
pub use texture_cache::{FrameTextures, PlaneRole, PlaneTexture, TextureCache};
pub use transform::{Affine, aspect_fill_display_transform};
pub use uniforms::{CompositeUniforms, RenderControls, ThresholdState};
pub use wgpu_backend::WgpuBackend;
