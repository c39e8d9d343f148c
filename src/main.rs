// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;

use cli::{ConfidenceArg, ModeArg, OrientationArg};

#[derive(Parser)]
#[command(name = "depth-clipper")]
#[command(about = "Real-time depth-clipping compositor")]
#[command(version = depth_clipper::constants::app_version())]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Threshold overrides shared by the rendering commands
#[derive(clap::Args, Debug, Clone, Default)]
pub struct ThresholdArgs {
    /// Capture mode (default: from config)
    #[arg(short, long, value_enum)]
    mode: Option<ModeArg>,

    /// Near depth threshold in [0, 1]
    #[arg(long)]
    near: Option<f32>,

    /// Far depth threshold in [0, 1]
    #[arg(long)]
    far: Option<f32>,

    /// Minimum confidence class (wide sensor only)
    #[arg(short, long, value_enum)]
    confidence: Option<ConfidenceArg>,

    /// Display orientation
    #[arg(long, value_enum, default_value = "portrait")]
    orientation: OrientationArg,
}

#[derive(Subcommand)]
enum Commands {
    /// Composite one synthetic frame and save it as PNG
    Snapshot {
        /// Output file path
        #[arg(short, long, default_value = "depth-clipper.png")]
        output: PathBuf,

        /// Viewport width (default: from config)
        #[arg(long)]
        width: Option<u32>,

        /// Viewport height (default: from config)
        #[arg(long)]
        height: Option<u32>,

        /// Skip the GPU and use the CPU compositor
        #[arg(long)]
        cpu: bool,

        #[command(flatten)]
        thresholds: ThresholdArgs,
    },

    /// Drive the compositor at display rate and report draw statistics
    Run {
        /// Number of display ticks to run
        #[arg(short, long, default_value = "180")]
        frames: u64,

        /// Sweep the far threshold while running
        #[arg(long)]
        sweep: bool,

        #[command(flatten)]
        thresholds: ThresholdArgs,
    },

    /// Show the effective configuration
    Config {
        #[command(flatten)]
        thresholds: ThresholdArgs,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set RUST_LOG to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=depth_clipper=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Snapshot {
            output,
            width,
            height,
            cpu,
            thresholds,
        } => cli::snapshot(&thresholds, output, width, height, cpu),
        Commands::Run {
            frames,
            sweep,
            thresholds,
        } => cli::run(&thresholds, frames, sweep),
        Commands::Config { thresholds } => cli::show_config(&thresholds),
    }
}
