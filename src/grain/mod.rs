//! Grain voices and the polyphony-bounded pool that plays them

pub mod pool;
pub mod voice;

pub use pool::{GrainVoicePool, DEFAULT_MAX_GRAINS, MAX_GRAINS_LIMIT};
pub use voice::{GrainEnvelope, GrainVoice, VoiceHandle, MAX_ENVELOPE_POINTS};
