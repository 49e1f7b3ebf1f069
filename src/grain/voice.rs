//! Transient grain voices
//!
//! A voice reads a slice of the shared source buffer at a fixed speed and
//! shapes it with a piecewise-linear envelope. Voices never mutate the
//! source and never outlive their scheduled stop frame.

use std::sync::Arc;

use crate::dsp::envelope;
use crate::dsp::WindowType;
use crate::engine::AudioBuffer;

/// Upper bound on envelope breakpoints per grain
pub const MAX_ENVELOPE_POINTS: usize = 32;

/// Opaque identifier of a voice, unique per pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VoiceHandle(pub(crate) u64);

impl VoiceHandle {
    pub fn id(&self) -> u64 {
        self.0
    }
}

// ============================================================================
// Envelope
// ============================================================================

/// Breakpoint approximation of a window shape
///
/// At most [`MAX_ENVELOPE_POINTS`] points sampled from the full window, then
/// a ramp to zero at the grain's last frame. Gain between points is
/// linearly interpolated.
#[derive(Debug, Clone, PartialEq)]
pub struct GrainEnvelope {
    /// `(frame offset, gain)`, strictly increasing in frame offset
    points: Vec<(u64, f32)>,
}

impl GrainEnvelope {
    /// Build the envelope for a grain of `length` frames
    ///
    /// # Arguments
    /// * `window` - Window shape
    /// * `length` - Grain length in output frames
    /// * `gain` - Peak gain the window is scaled by
    pub fn new(window: WindowType, length: usize, gain: f32) -> Self {
        let curve = envelope::generate(window, length);
        if curve.is_empty() {
            return Self { points: Vec::new() };
        }

        let count = curve.len().min(MAX_ENVELOPE_POINTS);
        let last = curve.len() - 1;
        let mut points: Vec<(u64, f32)> = Vec::with_capacity(count + 1);
        for k in 0..count {
            let index = if count == 1 { 0 } else { k * last / (count - 1) };
            if points.last().map_or(true, |&(frame, _)| frame < index as u64) {
                points.push((index as u64, curve[index] * gain));
            }
        }
        points.push((curve.len() as u64, 0.0));

        Self { points }
    }

    pub fn points(&self) -> &[(u64, f32)] {
        &self.points
    }

    /// Gain at `frame` frames into the grain; zero outside the envelope
    pub fn gain_at(&self, frame: u64) -> f32 {
        let upper = self.points.partition_point(|&(f, _)| f <= frame);
        if upper == 0 || upper == self.points.len() {
            return 0.0;
        }

        let (f0, g0) = self.points[upper - 1];
        let (f1, g1) = self.points[upper];
        let t = (frame - f0) as f32 / (f1 - f0) as f32;
        g0 + (g1 - g0) * t
    }
}

// ============================================================================
// Voice
// ============================================================================

/// One sounding grain
#[derive(Debug)]
pub struct GrainVoice {
    handle: VoiceHandle,
    source: Arc<AudioBuffer>,
    envelope: GrainEnvelope,
    /// Read position in source frames
    read_pos: f64,
    /// Source frames advanced per output frame
    step: f64,
    /// Output frames rendered so far
    elapsed: u64,
    /// Total output frames
    length: u64,
    /// Pool clock frame at which the voice stops
    stop_frame: u64,
    stopped: bool,
}

impl GrainVoice {
    pub(crate) fn new(
        handle: VoiceHandle,
        source: Arc<AudioBuffer>,
        envelope: GrainEnvelope,
        read_pos: f64,
        step: f64,
        length: u64,
        start_frame: u64,
    ) -> Self {
        Self {
            handle,
            source,
            envelope,
            read_pos,
            step,
            elapsed: 0,
            length,
            stop_frame: start_frame + length,
            stopped: false,
        }
    }

    pub fn handle(&self) -> VoiceHandle {
        self.handle
    }

    /// Pool clock frame at which the voice stops on its own
    pub fn stop_frame(&self) -> u64 {
        self.stop_frame
    }

    pub fn is_finished(&self) -> bool {
        self.stopped || self.elapsed >= self.length
    }

    /// Force the voice silent immediately
    pub fn stop(&mut self) {
        self.stopped = true;
    }

    /// Sum this voice into `bus`, starting at the bus's first frame
    ///
    /// Mono sources feed every bus channel. Reads past the end of the
    /// source are silent.
    pub fn render(&mut self, bus: &mut AudioBuffer) {
        if self.is_finished() {
            return;
        }

        let source_channels = self.source.channels();
        let frames = (bus.len() as u64).min(self.length - self.elapsed) as usize;

        for frame in 0..frames {
            let gain = self.envelope.gain_at(self.elapsed);
            for (ch, out) in bus.samples.iter_mut().enumerate() {
                let src_ch = ch.min(source_channels - 1);
                out[frame] += self.source.sample_at(src_ch, self.read_pos) * gain;
            }
            self.read_pos += self.step;
            self.elapsed += 1;
        }
    }
}
