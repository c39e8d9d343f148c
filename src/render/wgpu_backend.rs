// SPDX-License-Identifier: GPL-3.0-only

//! wgpu implementation of [`CompositorBackend`]

use crate::backends::camera::frame_loop::{CaptureLoopController, LoopAction};
use crate::backends::camera::{CaptureMode, CapturedFrame};
use crate::constants::timing::COMPLETION_POLL_INTERVAL;
use crate::errors::RendererError;
use crate::render::{
    CompositeUniforms, CompositorBackend, CompositorPipeline, FrameCompletion, FrameTextures,
    RenderDestination, RenderTarget, TextureCache,
};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Drives the compositor on a wgpu device
///
/// A background thread polls the device so completion callbacks run
/// without the draw thread having to block on the GPU.
pub struct WgpuBackend<D: RenderDestination> {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    destination: D,
    mode: CaptureMode,
    pipeline: CompositorPipeline,
    textures: TextureCache,
    poller: CaptureLoopController,
}

impl<D: RenderDestination> WgpuBackend<D> {
    pub fn new(
        device: Arc<wgpu::Device>,
        queue: Arc<wgpu::Queue>,
        destination: D,
        mode: CaptureMode,
    ) -> Result<Self, RendererError> {
        let pipeline = CompositorPipeline::new(&device, mode, destination.formats())?;
        let textures = TextureCache::new(Arc::clone(&device), Arc::clone(&queue));

        let poll_device = Arc::clone(&device);
        let poller = CaptureLoopController::start("gpu-completion-poller", move || {
            if let Err(e) = poll_device.poll(wgpu::PollType::Poll) {
                warn!(error = %e, "Device poll failed");
            }
            std::thread::sleep(COMPLETION_POLL_INTERVAL);
            LoopAction::Continue
        });

        Ok(Self {
            device,
            queue,
            destination,
            mode,
            pipeline,
            textures,
            poller,
        })
    }

    pub fn device(&self) -> &Arc<wgpu::Device> {
        &self.device
    }

    pub fn queue(&self) -> &Arc<wgpu::Queue> {
        &self.queue
    }

    pub fn destination(&self) -> &D {
        &self.destination
    }

    /// Mutable access for resizing or changing destination formats; the
    /// pipeline is rebuilt on the next draw if the formats changed
    pub fn destination_mut(&mut self) -> &mut D {
        &mut self.destination
    }

    /// Block until all submitted work has finished
    pub fn wait_idle(&self) -> Result<(), RendererError> {
        self.device
            .poll(wgpu::PollType::wait_indefinitely())
            .map(|_| ())
            .map_err(|e| RendererError::DeviceRequest(format!("Device poll failed: {e}")))
    }

    fn ensure_pipeline(&mut self) -> bool {
        let formats = self.destination.formats();
        if self.pipeline.formats() == formats {
            return true;
        }
        debug!(?formats, "Destination formats changed, rebuilding pipeline");
        match CompositorPipeline::new(&self.device, self.mode, formats) {
            Ok(pipeline) => {
                self.pipeline = pipeline;
                true
            }
            Err(e) => {
                error!(error = %e, "Pipeline rebuild failed");
                false
            }
        }
    }
}

impl<D: RenderDestination> Drop for WgpuBackend<D> {
    fn drop(&mut self) {
        // Let pending completion callbacks run before the poller goes away
        if let Err(e) = self.wait_idle() {
            warn!(error = %e, "Failed to drain GPU work on shutdown");
        }
        self.poller.stop();
    }
}

impl<D: RenderDestination> CompositorBackend for WgpuBackend<D> {
    type UniformBuffer = wgpu::Buffer;
    type Target = RenderTarget;
    type Textures = FrameTextures;

    fn create_uniform_buffer(&mut self, index: usize) -> Result<wgpu::Buffer, RendererError> {
        Ok(self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!("depth-clipper uniforms {index}")),
            size: std::mem::size_of::<CompositeUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        }))
    }

    fn acquire_target(&mut self) -> Option<RenderTarget> {
        if !self.ensure_pipeline() {
            return None;
        }
        self.destination.acquire_target()
    }

    fn upload_textures(&mut self, frame: &CapturedFrame, mode: CaptureMode) -> Option<FrameTextures> {
        self.textures.prepare_frame(frame, mode)
    }

    fn write_uniforms(&mut self, buffer: &wgpu::Buffer, uniforms: &CompositeUniforms) {
        self.queue.write_buffer(buffer, 0, uniforms.as_bytes());
    }

    fn submit(
        &mut self,
        target: RenderTarget,
        buffer: &wgpu::Buffer,
        textures: FrameTextures,
        completion: FrameCompletion,
    ) -> bool {
        let Some(bind_group) = self.pipeline.bind_group(&self.device, buffer, &textures) else {
            // Dropping the completion returns its permit
            warn!(frame = completion.frame(), "Frame textures do not match pipeline");
            return false;
        };

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("depth-clipper composite encoder"),
            });
        self.pipeline.encode(&mut encoder, &target, &bind_group);
        self.queue.submit(Some(encoder.finish()));

        // Textures stay alive until the GPU is done with them
        self.queue.on_submitted_work_done(move || {
            drop(textures);
            completion.complete();
        });

        true
    }
}
