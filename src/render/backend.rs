// SPDX-License-Identifier: GPL-3.0-only

//! Seam between the draw state machine and the device that executes it

use crate::backends::camera::{CaptureMode, CapturedFrame};
use crate::errors::RendererError;
use crate::render::{CompositeUniforms, FramePermit};
use tracing::trace;

/// Completion token submitted alongside a frame's GPU work
///
/// Owns the frame's gate permit. Completing (or dropping) the token returns
/// the permit; backends drop their per-frame texture references next to it.
#[derive(Debug)]
pub struct FrameCompletion {
    frame: u64,
    slot: usize,
    permit: FramePermit,
}

impl FrameCompletion {
    pub(crate) fn new(frame: u64, slot: usize, permit: FramePermit) -> Self {
        Self {
            frame,
            slot,
            permit,
        }
    }

    /// Sequence number of the submitted frame, starting at 1
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Uniform ring slot the frame reads
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Signal that the GPU finished the frame
    pub fn complete(self) {
        trace!(frame = self.frame, slot = self.slot, "Frame completed on GPU");
        drop(self.permit);
    }
}

/// Device operations the renderer drives once per draw
///
/// The renderer owns ordering (gate, ring rotation, skip decisions); a
/// backend only allocates, uploads and encodes.
pub trait CompositorBackend {
    /// One uniform ring buffer
    type UniformBuffer;
    /// Acquired render target for one frame
    type Target;
    /// Per-frame texture handles, kept alive until GPU completion
    type Textures;

    /// Allocate the uniform buffer for ring slot `index`
    fn create_uniform_buffer(&mut self, index: usize) -> Result<Self::UniformBuffer, RendererError>;

    /// Current render target, or `None` when the destination has none to give
    fn acquire_target(&mut self) -> Option<Self::Target>;

    /// Wrap the frame's planes as sampleable textures
    ///
    /// Returns `None` if any plane required by `mode` cannot be used.
    fn upload_textures(&mut self, frame: &CapturedFrame, mode: CaptureMode)
    -> Option<Self::Textures>;

    /// Copy a uniform snapshot into a ring buffer
    fn write_uniforms(&mut self, buffer: &Self::UniformBuffer, uniforms: &CompositeUniforms);

    /// Encode the composite draw and submit it
    ///
    /// `completion` must be completed or dropped only after the GPU has
    /// finished reading `buffer` and `textures`. Returns `false` when nothing
    /// was submitted; the completion is dropped in that case.
    fn submit(
        &mut self,
        target: Self::Target,
        buffer: &Self::UniformBuffer,
        textures: Self::Textures,
        completion: FrameCompletion,
    ) -> bool;
}
