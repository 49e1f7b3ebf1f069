//! CLI Module
//!
//! Command-line host for the granular engine.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::dsp::WindowType;

/// Granular - real-time granular playback from the command line
#[derive(Parser, Debug)]
#[command(name = "granular-cli")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print duration, channels and sample rate of an audio file
    #[command(name = "info")]
    Info {
        /// WAV file to inspect
        file: PathBuf,
    },

    /// Print the coefficients of a grain envelope
    #[command(name = "window")]
    Window {
        /// hann, hamming, triangular or rectangular
        window_type: String,

        /// Number of coefficients
        length: usize,
    },

    /// Play a file through the default output device
    #[command(name = "play")]
    Play(PlayArgs),
}

/// Options for `granular-cli play`
#[derive(clap::Args, Debug, Clone)]
pub struct PlayArgs {
    /// WAV file to play
    pub file: PathBuf,

    /// How long to play, in seconds
    #[arg(long, default_value_t = 10.0)]
    pub seconds: f64,

    /// Cursor speed (0-3)
    #[arg(long, default_value_t = 1.0)]
    pub rate: f64,

    /// Negative plays backwards
    #[arg(long, default_value_t = 1.0, allow_hyphen_values = true)]
    pub direction: f64,

    /// Master volume (0-1)
    #[arg(long, default_value_t = 1.0)]
    pub volume: f32,

    /// Grain size in milliseconds (10-500)
    #[arg(long)]
    pub grain_size: Option<f64>,

    /// Grain overlap in percent (0-95)
    #[arg(long)]
    pub overlap: Option<f64>,

    /// Grain envelope shape
    #[arg(long)]
    pub window: Option<WindowType>,

    /// Enable the high-pass filter at this cutoff (Hz)
    #[arg(long)]
    pub highpass: Option<f64>,

    /// Enable the low-pass filter at this cutoff (Hz)
    #[arg(long)]
    pub lowpass: Option<f64>,

    /// Engine configuration file (JSON)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Record the processed output to this WAV file
    #[arg(long)]
    pub capture: Option<PathBuf>,
}
