// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use vcam::constants::{DESIRED_BUFFER_COUNT, DESIRED_HEIGHT, DESIRED_WIDTH};

mod cli;

#[derive(Parser)]
#[command(name = "vcam")]
#[command(about = "Virtual video capture device with a streaming capture client")]
#[command(version = env!("GIT_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture frames from the virtual device into numbered image files
    Stream {
        /// Number of buffers to request
        #[arg(short, long, default_value_t = DESIRED_BUFFER_COUNT)]
        buffers: u32,

        /// Proposed frame width (the device may clamp it)
        #[arg(long, default_value_t = DESIRED_WIDTH)]
        width: u32,

        /// Proposed frame height (the device may clamp it)
        #[arg(long, default_value_t = DESIRED_HEIGHT)]
        height: u32,

        /// Output directory (default: ~/Pictures/vcam/capture_TIMESTAMP)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Stop after capturing this many frames
        #[arg(short = 'n', long)]
        count: Option<u64>,

        /// Accept brightness adjustments on stdin (u = up, d = down)
        #[arg(short, long)]
        controls: bool,
    },

    /// List supported formats and frame sizes
    Formats,

    /// Show device capabilities
    Info,

    /// Query or adjust the brightness control
    Controls {
        /// Set an absolute value (clamped by the device)
        #[arg(long)]
        set: Option<i32>,

        /// Raise brightness by one step
        #[arg(long)]
        up: bool,

        /// Lower brightness by one step
        #[arg(long)]
        down: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=vcam=debug, RUST_LOG=info
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
        Commands::Stream {
            buffers,
            width,
            height,
            output,
            count,
            controls,
        } => cli::run_stream(buffers, width, height, output, count, controls)?,
        Commands::Formats => cli::list_formats()?,
        Commands::Info => cli::show_info()?,
        Commands::Controls { set, up, down } => cli::adjust_controls(set, up, down)?,
    }

    Ok(())
}
