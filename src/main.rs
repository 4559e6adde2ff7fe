// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "depthfuse")]
#[command(about = "Multi-camera depth capture, point cloud fusion and recording")]
#[command(version = env!("GIT_VERSION"))]
struct Cli {
    /// Recording root (default: from the configuration)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Add this many synthetic depth cameras
    #[arg(long, global = true, default_value = "0")]
    synthetic: usize,

    /// Render the point cloud on the GPU instead of headless
    #[arg(long, global = true)]
    gpu: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List connected depth cameras
    Cameras,

    /// List recorded sessions, newest first
    List,

    /// Stream the fused point cloud
    Stream {
        /// Streaming duration in seconds
        #[arg(short, long, default_value = "10")]
        seconds: u64,

        /// Save the last rendered frame as PNG (needs --gpu)
        #[arg(long)]
        snapshot: Option<PathBuf>,
    },

    /// Record a session
    Record {
        /// Stop after this many frames
        #[arg(short, long)]
        frames: Option<i64>,

        /// Stop after this many seconds
        #[arg(short, long)]
        seconds: Option<f64>,

        /// Countdown before capture starts, at most 10 seconds
        #[arg(short, long)]
        countdown: Option<u32>,

        /// Repetitions per exercise
        #[arg(short, long)]
        repeat: Option<u32>,

        /// Record skeletons alongside depth
        #[arg(long)]
        skeleton: bool,

        /// Keep updating the point cloud while recording
        #[arg(long)]
        stream: bool,
    },

    /// Play a recorded session
    Play {
        /// Catalog index or session name (from 'depthfuse list')
        recording: String,

        /// Step through the recorded skeletons and write the sidecar back
        #[arg(long)]
        review: bool,

        /// Save the last rendered frame as PNG (needs --gpu)
        #[arg(long)]
        snapshot: Option<PathBuf>,

        /// Directory for the reviewed color frames with joints drawn (with --review)
        #[arg(long, requires = "review")]
        overlays: Option<PathBuf>,
    },

    /// Detect skeletons for a recorded session
    Skeletons {
        /// Catalog index or session name (from 'depthfuse list')
        recording: String,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=depthfuse=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();
    let options = cli::GlobalOptions {
        root: cli.root,
        synthetic: cli.synthetic,
        gpu: cli.gpu,
    };
    tracing::info!(version = env!("GIT_VERSION"), "depthfuse starting");

    match cli.command {
        Commands::Cameras => cli::list_cameras(&options),
        Commands::List => cli::list_recordings(&options),
        Commands::Stream { seconds, snapshot } => cli::stream(&options, seconds, snapshot),
        Commands::Record {
            frames,
            seconds,
            countdown,
            repeat,
            skeleton,
            stream,
        } => cli::record(
            &options,
            cli::RecordOptions {
                frames,
                seconds,
                countdown,
                repeat,
                skeleton,
                stream,
            },
        ),
        Commands::Play {
            recording,
            review,
            snapshot,
            overlays,
        } => cli::play(&options, &recording, review, snapshot, overlays),
        Commands::Skeletons { recording } => cli::compute_skeletons(&options, &recording),
    }
}
