//! DSP building blocks
//!
//! Envelope math for grains and the filter/gain slots of the processing
//! chain. All chain slots implement the `Effect` trait for uniform
//! processing.

pub mod envelope;

mod chain;
mod effect;
mod filter;
mod gain;

pub use chain::{
    ChainSlot, FilterConfig, FilterSettings, ProcessingChain, DEFAULT_HIGHPASS_HZ,
    DEFAULT_LOWPASS_HZ,
};
pub use effect::{Effect, SmoothedValue};
pub use envelope::WindowType;
pub use filter::{clamp_frequency, BiquadFilter, FilterKind, DEFAULT_Q, MIN_FREQUENCY_HZ, Q_RANGE};
pub use gain::MasterGain;
