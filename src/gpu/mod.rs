// SPDX-License-Identifier: GPL-3.0-only

//! wgpu instance and device creation for the compositor

use crate::errors::RendererError;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Information about the created GPU device
#[derive(Debug, Clone)]
pub struct GpuDeviceInfo {
    pub adapter_name: String,
    /// Vulkan, Metal, ...
    pub backend: wgpu::Backend,
    /// Software rasterizer picked because no hardware adapter was found
    pub fallback_adapter: bool,
}

fn create_instance() -> wgpu::Instance {
    wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::PRIMARY,
        ..Default::default()
    })
}

/// Device without a surface, for offscreen composition
pub async fn create_headless_render_device(
    label: &str,
) -> Result<(Arc<wgpu::Device>, Arc<wgpu::Queue>, GpuDeviceInfo), RendererError> {
    let instance = create_instance();
    request_render_device(&instance, label).await
}

/// Prefers a hardware adapter and retries with the fallback adapter, so
/// headless machines with a software rasterizer still work.
async fn request_render_device(
    instance: &wgpu::Instance,
    label: &str,
) -> Result<(Arc<wgpu::Device>, Arc<wgpu::Queue>, GpuDeviceInfo), RendererError> {
    info!(label = label, "Creating GPU device for compositing");

    let mut fallback_adapter = false;
    let adapter = match instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        })
        .await
    {
        Ok(adapter) => adapter,
        Err(e) => {
            warn!(error = %e, "No hardware adapter, trying fallback adapter");
            fallback_adapter = true;
            instance
                .request_adapter(&wgpu::RequestAdapterOptions {
                    power_preference: wgpu::PowerPreference::LowPower,
                    compatible_surface: None,
                    force_fallback_adapter: true,
                })
                .await
                .map_err(|e| RendererError::NoAdapter(e.to_string()))?
        }
    };

    let adapter_info = adapter.get_info();
    info!(
        adapter = %adapter_info.name,
        backend = ?adapter_info.backend,
        fallback = fallback_adapter,
        "GPU adapter selected"
    );

    // The compositor only needs downlevel limits; keep whatever the adapter
    // offers beyond that for texture sizes.
    let required_limits = wgpu::Limits::downlevel_defaults().using_resolution(adapter.limits());
    debug!(
        max_texture_dimension = required_limits.max_texture_dimension_2d,
        "Requesting device limits"
    );

    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: Some(label),
            required_features: wgpu::Features::empty(),
            required_limits,
            memory_hints: wgpu::MemoryHints::Performance,
            ..Default::default()
        })
        .await
        .map_err(|e| RendererError::DeviceRequest(e.to_string()))?;

    let info = GpuDeviceInfo {
        adapter_name: adapter_info.name.clone(),
        backend: adapter_info.backend,
        fallback_adapter,
    };

    Ok((Arc::new(device), Arc::new(queue), info))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_headless_device() {
        // Requires a GPU or software adapter; skipped otherwise
        match create_headless_render_device("test_device").await {
            Ok((device, queue, info)) => {
                println!("Created device: {:?}", info);
                assert!(!info.adapter_name.is_empty() || info.fallback_adapter);
                drop(queue);
                drop(device);
            }
            Err(e) => {
                println!("Skipping test (no GPU): {}", e);
            }
        }
    }
}
