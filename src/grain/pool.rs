//! Grain Voice Pool
//!
//! Owns every sounding grain in creation order. Voices are reaped once
//! they finish, and the oldest voices are evicted first whenever the
//! polyphony cap is exceeded.

use std::collections::VecDeque;
use std::sync::Arc;

use tracing::trace;

use crate::dsp::WindowType;
use crate::engine::AudioBuffer;
use crate::grain::voice::{GrainEnvelope, GrainVoice, VoiceHandle};

/// Default polyphony cap
pub const DEFAULT_MAX_GRAINS: usize = 50;
/// Largest configurable polyphony cap
pub const MAX_GRAINS_LIMIT: usize = 100;

/// Active grain voices for one engine
#[derive(Debug)]
pub struct GrainVoicePool {
    /// Oldest first
    voices: VecDeque<GrainVoice>,
    max_grains: usize,
    sample_rate: u32,
    /// Output frames rendered since creation
    clock: u64,
    next_id: u64,
}

impl GrainVoicePool {
    /// Create an empty pool rendering at `sample_rate`
    pub fn new(sample_rate: u32, max_grains: usize) -> Self {
        let max_grains = clamp_max_grains(max_grains);
        Self {
            voices: VecDeque::with_capacity(max_grains + 1),
            max_grains,
            sample_rate,
            clock: 0,
            next_id: 0,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Output frames rendered so far
    pub fn clock(&self) -> u64 {
        self.clock
    }

    pub fn max_grains(&self) -> usize {
        self.max_grains
    }

    /// Change the polyphony cap (clamped to `1..=100`), evicting immediately
    pub fn set_max_grains(&mut self, max_grains: usize) {
        self.max_grains = clamp_max_grains(max_grains);
        self.enforce_cap();
    }

    /// Start a grain reading `buffer`
    ///
    /// # Arguments
    /// * `buffer` - Shared source audio
    /// * `start_offset_secs` - Read start; clamped so the grain fits the buffer
    /// * `grain_duration_secs` - Grain length
    /// * `rate` - Read speed magnitude (sign is ignored)
    /// * `volume` - Peak gain of the envelope
    /// * `window` - Envelope shape
    ///
    /// # Returns
    /// Handle of the new voice. The voice starts on the next rendered frame
    /// and stops on its own `grain_duration_secs` later.
    pub fn play_grain(
        &mut self,
        buffer: &Arc<AudioBuffer>,
        start_offset_secs: f64,
        grain_duration_secs: f64,
        rate: f64,
        volume: f32,
        window: WindowType,
    ) -> VoiceHandle {
        self.reap();

        let grain_duration_secs = grain_duration_secs.max(0.0);
        // A grain at rate r consumes r times its duration of source audio
        let source_span_secs = grain_duration_secs * rate.abs();
        let latest_start = (buffer.duration_secs() - source_span_secs).max(0.0);
        let start = if start_offset_secs.is_finite() {
            start_offset_secs.clamp(0.0, latest_start)
        } else {
            0.0
        };

        let length = (grain_duration_secs * self.sample_rate as f64).round() as usize;
        let envelope = GrainEnvelope::new(window, length, volume);
        let step = if self.sample_rate == 0 {
            0.0
        } else {
            rate.abs() * buffer.sample_rate as f64 / self.sample_rate as f64
        };

        let handle = VoiceHandle(self.next_id);
        self.next_id += 1;

        self.voices.push_back(GrainVoice::new(
            handle,
            Arc::clone(buffer),
            envelope,
            start * buffer.sample_rate as f64,
            step,
            length as u64,
            self.clock,
        ));
        trace!(id = handle.id(), start, length, step, "grain started");

        self.enforce_cap();
        handle
    }

    /// Sum every active voice into `destination`, then retire finished ones
    pub fn render(&mut self, destination: &mut AudioBuffer) {
        for voice in self.voices.iter_mut() {
            voice.render(destination);
        }
        self.clock += destination.len() as u64;
        self.reap();
    }

    /// Drop voices that have finished playing
    pub fn reap(&mut self) {
        self.voices.retain(|voice| !voice.is_finished());
    }

    /// Force-stop and drop every voice
    pub fn stop_all(&mut self) {
        for voice in self.voices.iter_mut() {
            voice.stop();
        }
        self.voices.clear();
    }

    /// Number of voices still sounding
    pub fn active_count(&self) -> usize {
        self.voices.iter().filter(|voice| !voice.is_finished()).count()
    }

    pub fn is_active(&self, handle: VoiceHandle) -> bool {
        self.voices
            .iter()
            .any(|voice| voice.handle() == handle && !voice.is_finished())
    }

    fn enforce_cap(&mut self) {
        while self.voices.len() > self.max_grains {
            if let Some(mut oldest) = self.voices.pop_front() {
                oldest.stop();
                trace!(id = oldest.handle().id(), "grain evicted");
            }
        }
    }
}

fn clamp_max_grains(max_grains: usize) -> usize {
    max_grains.clamp(1, MAX_GRAINS_LIMIT)
}
