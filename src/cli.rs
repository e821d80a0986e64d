use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mediaforge")]
#[command(author, version, about = "Profile-driven media transformation orchestrator")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the loaded encoding profiles
    Profiles {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Solve a layout request (JSON file) and print the placed shapes
    Layout {
        /// Request file with `canvas` and `elements`
        #[arg(required = true)]
        request: PathBuf,
    },

    /// Encode one track with a profile
    Encode {
        #[arg(required = true)]
        input: PathBuf,

        /// Profile identifier
        #[arg(short, long)]
        profile: String,

        /// Output collection (defaults to storage.default_collection)
        #[arg(long)]
        collection: Option<String>,
    },

    /// Concatenate tracks onto a common canvas
    Concat {
        #[arg(required = true, num_args = 1..)]
        inputs: Vec<PathBuf>,

        #[arg(short, long)]
        profile: String,

        /// Canvas size as WIDTHxHEIGHT
        #[arg(long)]
        canvas: String,

        /// Output frame rate
        #[arg(long)]
        frame_rate: Option<f32>,

        #[arg(long)]
        collection: Option<String>,
    },

    /// Turn a still image into a video clip
    ImageToVideo {
        #[arg(required = true)]
        image: PathBuf,

        #[arg(short, long)]
        profile: String,

        /// Clip length in seconds
        #[arg(short, long)]
        duration: f64,

        #[arg(long)]
        collection: Option<String>,
    },

    /// Extract still images at the given times
    Still {
        #[arg(required = true)]
        input: PathBuf,

        #[arg(short, long)]
        profile: String,

        /// Time offsets in seconds (repeatable)
        #[arg(short, long = "time", required = true)]
        times: Vec<f64>,

        #[arg(long)]
        collection: Option<String>,
    },

    /// Check that required external tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
