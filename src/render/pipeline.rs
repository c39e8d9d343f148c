// SPDX-License-Identifier: GPL-3.0-only

//! Compositor render pipeline and its bind group layout

use crate::backends::camera::CaptureMode;
use crate::constants::bindings;
use crate::errors::RendererError;
use crate::render::{FrameTextures, RenderTarget};
use crate::shaders::{COMPOSITE_SHADER, FRAGMENT_ENTRY_FRONT, FRAGMENT_ENTRY_WIDE, VERTEX_ENTRY};
use tracing::{debug, error};

/// Attachment formats the pipeline must match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DestinationFormats {
    pub color: wgpu::TextureFormat,
    pub depth_stencil: Option<wgpu::TextureFormat>,
    pub sample_count: u32,
}

impl DestinationFormats {
    pub fn color_only(color: wgpu::TextureFormat) -> Self {
        Self {
            color,
            depth_stencil: None,
            sample_count: 1,
        }
    }
}

/// Render pipeline compositing one capture mode into one destination format
pub struct CompositorPipeline {
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    mode: CaptureMode,
    formats: DestinationFormats,
}

impl CompositorPipeline {
    /// Build the pipeline, reporting shader or state validation failures
    pub fn new(
        device: &wgpu::Device,
        mode: CaptureMode,
        formats: DestinationFormats,
    ) -> Result<Self, RendererError> {
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let built = Self::build(device, mode, formats);
        if let Some(e) = pollster::block_on(device.pop_error_scope()) {
            error!(%mode, error = %e, "Failed to create compositor pipeline");
            return Err(RendererError::Pipeline(e.to_string()));
        }
        debug!(%mode, ?formats, "Compositor pipeline created");
        Ok(built)
    }

    fn build(device: &wgpu::Device, mode: CaptureMode, formats: DestinationFormats) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("depth-clipper composite shader"),
            source: wgpu::ShaderSource::Wgsl(COMPOSITE_SHADER.into()),
        });

        let texture_entry = |binding: u32, sample_type: wgpu::TextureSampleType| {
            wgpu::BindGroupLayoutEntry {
                binding,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            }
        };

        let mut entries = vec![
            // Uniforms: the vertex stage maps coordinates, the fragment stage clips
            wgpu::BindGroupLayoutEntry {
                binding: bindings::UNIFORMS,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            texture_entry(
                bindings::TEXTURE_Y,
                wgpu::TextureSampleType::Float { filterable: true },
            ),
            texture_entry(
                bindings::TEXTURE_CBCR,
                wgpu::TextureSampleType::Float { filterable: true },
            ),
            // r32float is only loadable
            texture_entry(
                bindings::TEXTURE_DEPTH,
                wgpu::TextureSampleType::Float { filterable: false },
            ),
            wgpu::BindGroupLayoutEntry {
                binding: bindings::SAMPLER,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ];
        if mode.uses_confidence() {
            entries.push(texture_entry(
                bindings::TEXTURE_CONFIDENCE,
                wgpu::TextureSampleType::Uint,
            ));
        }

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("depth-clipper composite bind group layout"),
            entries: &entries,
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("depth-clipper composite pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("depth-clipper composite pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some(VERTEX_ENTRY),
                buffers: &[],
                compilation_options: Default::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleStrip,
                ..Default::default()
            },
            depth_stencil: formats.depth_stencil.map(passthrough_depth_stencil),
            multisample: wgpu::MultisampleState {
                count: formats.sample_count,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some(fragment_entry_point(mode)),
                targets: &[Some(wgpu::ColorTargetState {
                    format: formats.color,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            multiview: None,
            cache: None,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("depth-clipper color sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Self {
            pipeline,
            bind_group_layout,
            sampler,
            mode,
            formats,
        }
    }

    pub fn mode(&self) -> CaptureMode {
        self.mode
    }

    pub fn formats(&self) -> DestinationFormats {
        self.formats
    }

    /// Bind group for one frame's uniforms and textures
    ///
    /// Returns `None` if the pipeline reads confidence and `textures` has none.
    pub fn bind_group(
        &self,
        device: &wgpu::Device,
        uniforms: &wgpu::Buffer,
        textures: &FrameTextures,
    ) -> Option<wgpu::BindGroup> {
        let mut entries = vec![
            wgpu::BindGroupEntry {
                binding: bindings::UNIFORMS,
                resource: uniforms.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: bindings::TEXTURE_Y,
                resource: wgpu::BindingResource::TextureView(&textures.luma.view),
            },
            wgpu::BindGroupEntry {
                binding: bindings::TEXTURE_CBCR,
                resource: wgpu::BindingResource::TextureView(&textures.chroma.view),
            },
            wgpu::BindGroupEntry {
                binding: bindings::TEXTURE_DEPTH,
                resource: wgpu::BindingResource::TextureView(&textures.depth.view),
            },
            wgpu::BindGroupEntry {
                binding: bindings::SAMPLER,
                resource: wgpu::BindingResource::Sampler(&self.sampler),
            },
        ];
        if self.mode.uses_confidence() {
            let confidence = textures.confidence.as_ref()?;
            entries.push(wgpu::BindGroupEntry {
                binding: bindings::TEXTURE_CONFIDENCE,
                resource: wgpu::BindingResource::TextureView(&confidence.view),
            });
        }

        Some(device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("depth-clipper composite bind group"),
            layout: &self.bind_group_layout,
            entries: &entries,
        }))
    }

    /// Record the full-screen composite pass into `encoder`
    pub fn encode(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        target: &RenderTarget,
        bind_group: &wgpu::BindGroup,
    ) {
        let depth_stencil_attachment =
            target
                .depth_view
                .as_ref()
                .map(|view| wgpu::RenderPassDepthStencilAttachment {
                    view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Discard,
                    }),
                    stencil_ops: None,
                });

        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("depth-clipper composite pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &target.view,
                depth_slice: None,
                resolve_target: target.resolve_view.as_ref(),
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        render_pass.set_pipeline(&self.pipeline);
        render_pass.set_bind_group(0, bind_group, &[]);
        render_pass.draw(0..4, 0..1);
    }
}

/// Fragment entry point for a capture mode
pub fn fragment_entry_point(mode: CaptureMode) -> &'static str {
    if mode.uses_confidence() {
        FRAGMENT_ENTRY_WIDE
    } else {
        FRAGMENT_ENTRY_FRONT
    }
}

/// Depth state that never rejects or records fragments
fn passthrough_depth_stencil(format: wgpu::TextureFormat) -> wgpu::DepthStencilState {
    wgpu::DepthStencilState {
        format,
        depth_write_enabled: false,
        depth_compare: wgpu::CompareFunction::Always,
        stencil: wgpu::StencilState::default(),
        bias: wgpu::DepthBiasState::default(),
    }
}
