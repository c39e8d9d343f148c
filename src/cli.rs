// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! - `snapshot`: composite one synthetic frame to a PNG (GPU, CPU fallback)
//! - `run`: display-rate draw loop with live threshold changes
//! - `config`: print the effective settings

use crate::ThresholdArgs;
use depth_clipper::backends::camera::{
    CaptureLoopController, CaptureMode, ConfidenceLevel, FrameSource, LoopAction, Orientation,
    SyntheticFrameSource,
};
use depth_clipper::constants::timing::FRAME_INTERVAL;
use depth_clipper::render::{
    Affine, DrawOutcome, OffscreenDestination, Renderer, ThresholdState, WgpuBackend, cpu,
};
use depth_clipper::{AppError, Config, gpu};
use image::RgbaImage;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(clap::ValueEnum, Debug, Clone, Copy)]
pub enum ModeArg {
    /// Rear depth sensor with confidence map
    Wide,
    /// Front depth sensor with calibration data
    Front,
}

impl From<ModeArg> for CaptureMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Wide => CaptureMode::DepthSensorWide,
            ModeArg::Front => CaptureMode::FrontDepthSensor,
        }
    }
}

#[derive(clap::ValueEnum, Debug, Clone, Copy)]
pub enum ConfidenceArg {
    Low,
    Medium,
    High,
}

impl From<ConfidenceArg> for ConfidenceLevel {
    fn from(arg: ConfidenceArg) -> Self {
        match arg {
            ConfidenceArg::Low => ConfidenceLevel::Low,
            ConfidenceArg::Medium => ConfidenceLevel::Medium,
            ConfidenceArg::High => ConfidenceLevel::High,
        }
    }
}

#[derive(clap::ValueEnum, Debug, Clone, Copy, Default)]
pub enum OrientationArg {
    #[default]
    Portrait,
    PortraitUpsideDown,
    LandscapeLeft,
    LandscapeRight,
}

impl From<OrientationArg> for Orientation {
    fn from(arg: OrientationArg) -> Self {
        match arg {
            OrientationArg::Portrait => Orientation::Portrait,
            OrientationArg::PortraitUpsideDown => Orientation::PortraitUpsideDown,
            OrientationArg::LandscapeLeft => Orientation::LandscapeLeft,
            OrientationArg::LandscapeRight => Orientation::LandscapeRight,
        }
    }
}

/// Saved config with command-line overrides applied
fn resolve_config(args: &ThresholdArgs) -> Config {
    let mut config = Config::load().unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load configuration, using defaults");
        Config::default()
    });
    if let Some(mode) = args.mode {
        config.capture_mode = mode.into();
    }
    if let Some(near) = args.near {
        config.near_depth_threshold = near;
    }
    if let Some(far) = args.far {
        config.far_depth_threshold = far;
    }
    if let Some(confidence) = args.confidence {
        config.confidence_threshold = confidence.into();
    }
    config
}

/// Composite one synthetic frame and save it
pub fn snapshot(
    args: &ThresholdArgs,
    output: PathBuf,
    width: Option<u32>,
    height: Option<u32>,
    force_cpu: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = resolve_config(args);
    if let Some(width) = width {
        config.viewport_width = width;
    }
    if let Some(height) = height {
        config.viewport_height = height;
    }
    if config.viewport_width == 0 || config.viewport_height == 0 {
        return Err("Viewport size must be non-zero".into());
    }

    let mode = config.capture_mode;
    let orientation: Orientation = args.orientation.into();
    let source = Arc::new(SyntheticFrameSource::new(mode));

    println!(
        "Compositing {}x{} ({mode}, near {:.2}, far {:.2}, confidence {:?})",
        config.viewport_width,
        config.viewport_height,
        config.thresholds().near,
        config.thresholds().far,
        config.thresholds().confidence,
    );

    let rt = tokio::runtime::Runtime::new()?;
    let image = rt.block_on(async {
        if !force_cpu {
            match render_gpu(&source, &config, orientation).await {
                Ok(image) => return Ok(image),
                Err(e) => warn!(error = %e, "GPU compositing failed, falling back to CPU"),
            }
        }
        render_cpu(Arc::clone(&source), config.clone(), orientation).await
    })?;

    image.save(&output)?;
    println!("Snapshot saved: {}", output.display());
    Ok(())
}

async fn render_gpu(
    source: &Arc<SyntheticFrameSource>,
    config: &Config,
    orientation: Orientation,
) -> Result<RgbaImage, AppError> {
    let (device, queue, info) = gpu::create_headless_render_device("depth-clipper snapshot").await?;
    info!(adapter = %info.adapter_name, "Compositing on GPU");

    let destination =
        OffscreenDestination::new(Arc::clone(&device), config.viewport_width, config.viewport_height)?;
    let backend = WgpuBackend::new(device, queue, destination, config.capture_mode)?;
    let mut renderer = Renderer::new(backend, config.capture_mode, config.thresholds())?
        .with_orientation(orientation);
    renderer.on_viewport_resized(config.viewport());

    if let DrawOutcome::Skipped(reason) = renderer.draw(source) {
        return Err(AppError::Other(format!("Frame skipped: {reason:?}")));
    }

    let backend = renderer.backend();
    Ok(backend.destination().read_rgba(backend.queue()).await?)
}

async fn render_cpu(
    source: Arc<SyntheticFrameSource>,
    config: Config,
    orientation: Orientation,
) -> Result<RgbaImage, AppError> {
    let frame = source
        .current_frame()
        .ok_or_else(|| AppError::Other("Source has no frame".into()))?;
    let view_to_camera = source
        .display_transform(orientation, config.viewport())
        .inverted()
        .unwrap_or(Affine::IDENTITY);

    tokio::task::spawn_blocking(move || {
        cpu::composite_frame(
            &frame,
            config.capture_mode,
            &config.thresholds(),
            &view_to_camera,
            config.viewport_width,
            config.viewport_height,
        )
    })
    .await
    .map_err(|e| AppError::Other(format!("CPU compositor task failed: {e}")))?
    .ok_or_else(|| AppError::Other("Frame is missing data for this capture mode".into()))
}

/// Run the display loop for `frames` ticks
pub fn run(args: &ThresholdArgs, frames: u64, sweep: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = resolve_config(args);
    let mode = config.capture_mode;
    let source = Arc::new(SyntheticFrameSource::new(mode));

    let rt = tokio::runtime::Runtime::new()?;
    let (device, queue, info) =
        rt.block_on(gpu::create_headless_render_device("depth-clipper run"))?;
    println!("Using GPU: {} ({:?})", info.adapter_name, info.backend);

    let destination =
        OffscreenDestination::new(Arc::clone(&device), config.viewport_width, config.viewport_height)?;
    let backend = WgpuBackend::new(device, queue, destination, mode)?;
    let mut renderer =
        Renderer::new(backend, mode, config.thresholds())?.with_orientation(args.orientation.into());
    renderer.on_viewport_resized(config.viewport());
    let controls = renderer.controls();

    let submitted = Arc::new(AtomicU64::new(0));
    let skipped = Arc::new(AtomicU64::new(0));

    let mut display = {
        let submitted = Arc::clone(&submitted);
        let skipped = Arc::clone(&skipped);
        let source = Arc::clone(&source);
        let mut ticks = 0u64;
        CaptureLoopController::start_paced("display", FRAME_INTERVAL, move || {
            match renderer.draw(&source) {
                DrawOutcome::Submitted { .. } => submitted.fetch_add(1, Ordering::Relaxed),
                DrawOutcome::Skipped(_) => skipped.fetch_add(1, Ordering::Relaxed),
            };
            ticks += 1;
            if ticks >= frames {
                LoopAction::Stop
            } else {
                LoopAction::Continue
            }
        })
    };

    let stop_flag = Arc::new(AtomicBool::new(false));
    let stop_flag_clone = Arc::clone(&stop_flag);
    ctrlc::set_handler(move || {
        stop_flag_clone.store(true, Ordering::SeqCst);
    })?;

    println!("Rendering {frames} frames... (press Ctrl+C to stop early)");
    let start = Instant::now();
    while display.is_running() {
        if stop_flag.load(Ordering::SeqCst) {
            println!();
            println!("Stopping early...");
            break;
        }

        if sweep {
            // Far threshold oscillates over [near, 1] with a 2 s period
            let phase = start.elapsed().as_secs_f32() * std::f32::consts::PI;
            let near = controls.near();
            controls.set_far_depth_threshold(near + (1.0 - near) * (0.5 + 0.5 * phase.sin()));
        }

        print!(
            "\rSubmitted: {:>6}  Skipped: {:>6}",
            submitted.load(Ordering::Relaxed),
            skipped.load(Ordering::Relaxed)
        );
        std::io::Write::flush(&mut std::io::stdout())?;
        std::thread::sleep(Duration::from_millis(50));
    }
    display.stop();
    println!();

    let elapsed = start.elapsed().as_secs_f64();
    let drawn = submitted.load(Ordering::Relaxed);
    println!(
        "Submitted {drawn} frames, skipped {} in {elapsed:.2}s ({:.1} fps)",
        skipped.load(Ordering::Relaxed),
        drawn as f64 / elapsed.max(f64::EPSILON)
    );
    println!("Thresholds at exit: {:?}", controls.snapshot());
    Ok(())
}

/// Print the effective configuration
pub fn show_config(args: &ThresholdArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = resolve_config(args);
    let normalized = Config {
        near_depth_threshold: config.thresholds().near,
        far_depth_threshold: config.thresholds().far,
        ..config
    };
    println!("{}", serde_json::to_string_pretty(&normalized)?);

    if let Ok(path) = Config::path() {
        println!("Config file: {}", path.display());
    }

    let defaults = ThresholdState::default();
    if normalized.thresholds() == defaults && normalized.capture_mode == CaptureMode::default() {
        println!("(defaults)");
    }
    Ok(())
}
