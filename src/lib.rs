//! Granular - Real-time granular synthesis engine
//!
//! Replays a loaded recording as a stream of short overlapping grains,
//! each shaped by an amplitude envelope, for continuous time-stretched,
//! speed-varied and reversible playback driven by a live control signal.
//!
//! # Architecture
//!
//! - [`dsp::envelope`]: window shapes for grain envelopes
//! - [`dsp::ProcessingChain`]: high-pass → low-pass → master gain
//! - [`grain::GrainVoicePool`]: polyphony-bounded grain voices
//! - [`engine::GranularEngine`]: buffer, cursor and grain scheduler
//!
//! Grains sum into a stereo bus, the bus runs through the processing
//! chain, and the result is pulled by an [`engine::AudioSink`].

pub mod cli;
pub mod config;
pub mod dsp;
pub mod engine;
pub mod error;
pub mod grain;

pub use config::EngineConfig;
pub use dsp::{FilterConfig, FilterSettings, WindowType};
pub use engine::{
    AudioBuffer, AudioSink, Direction, GranularEngine, GranularParameters, GranularUpdate,
    PlaybackState, PullHandle, PullSink,
};
pub use error::{GranularError, Result};

#[cfg(feature = "cpal")]
pub use engine::CpalSink;
