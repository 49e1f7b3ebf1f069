//! Audio Engine Module
//!
//! Core synthesis engine including:
//! - Audio buffer management and WAV I/O
//! - Granular parameters and playback state
//! - Grain scheduling and the render graph
//! - Audio sinks and the engine orchestrator

pub mod buffer;
pub mod graph;
pub mod io;
pub mod params;
pub mod scheduler;
pub mod sink;
pub mod synth;

pub use buffer::{AudioBuffer, ChannelLayout};
pub use graph::{RenderGraph, SharedGraph};
pub use io::{generate_test_tone, import_audio, write_wav, WavCapture};
pub use params::{Direction, GranularParameters, GranularUpdate, PlaybackState};
pub use scheduler::GrainScheduler;
pub use sink::{AudioSink, PullHandle, PullSink, SinkInfo};
pub use synth::GranularEngine;

#[cfg(feature = "cpal")]
pub use sink::CpalSink;
