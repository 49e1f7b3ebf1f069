//! High-pass / low-pass biquad slots for the processing chain
//!
//! Coefficients follow the Audio EQ Cookbook. The cutoff frequency is
//! smoothed, and coefficients are recomputed every
//! [`COEFF_UPDATE_INTERVAL`] samples while it is still moving.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::dsp::effect::{Effect, SmoothedValue};
use crate::engine::AudioBuffer;

/// Lowest cutoff accepted, in Hz
pub const MIN_FREQUENCY_HZ: f64 = 20.0;
/// Q range accepted by [`BiquadFilter::set_q`]
pub const Q_RANGE: (f64, f64) = (0.1, 10.0);
/// Butterworth Q
pub const DEFAULT_Q: f64 = std::f64::consts::FRAC_1_SQRT_2;

/// Samples between coefficient refreshes while the cutoff glides
const COEFF_UPDATE_INTERVAL: usize = 32;

/// Response of a [`BiquadFilter`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    HighPass,
    LowPass,
}

/// Biquad filter coefficients, normalized by a0
#[derive(Debug, Clone, Copy, Default)]
struct BiquadCoeffs {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
}

impl BiquadCoeffs {
    /// Reference: https://www.w3.org/2011/audio/audio-eq-cookbook.html
    fn calculate(kind: FilterKind, sample_rate: f64, frequency: f64, q: f64) -> Self {
        let freq = clamp_frequency(frequency, sample_rate);
        let q = q.clamp(Q_RANGE.0, Q_RANGE.1);

        let w0 = 2.0 * PI * freq / sample_rate;
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / (2.0 * q);

        let (b0, b1, b2) = match kind {
            FilterKind::LowPass => ((1.0 - cos_w0) / 2.0, 1.0 - cos_w0, (1.0 - cos_w0) / 2.0),
            FilterKind::HighPass => ((1.0 + cos_w0) / 2.0, -(1.0 + cos_w0), (1.0 + cos_w0) / 2.0),
        };
        let a0 = 1.0 + alpha;
        let a1 = -2.0 * cos_w0;
        let a2 = 1.0 - alpha;

        BiquadCoeffs {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }
}

/// Biquad filter state for one channel
#[derive(Debug, Clone, Copy, Default)]
struct BiquadState {
    x1: f64,
    x2: f64,
    y1: f64,
    y2: f64,
}

impl BiquadState {
    #[inline]
    fn process(&mut self, input: f64, c: &BiquadCoeffs) -> f64 {
        let output = c.b0 * input + c.b1 * self.x1 + c.b2 * self.x2 - c.a1 * self.y1 - c.a2 * self.y2;

        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = output;

        output
    }
}

/// Clamp a cutoff into `[20 Hz, Nyquist - 1 Hz]`
pub fn clamp_frequency(frequency: f64, sample_rate: f64) -> f64 {
    let nyquist_limit = (sample_rate / 2.0 - 1.0).max(MIN_FREQUENCY_HZ);
    frequency.clamp(MIN_FREQUENCY_HZ, nyquist_limit)
}

// ============================================================================
// Biquad Filter
// ============================================================================

/// Second-order high-pass or low-pass filter with a smoothed cutoff
#[derive(Debug, Clone)]
pub struct BiquadFilter {
    kind: FilterKind,
    frequency: SmoothedValue,
    q: f64,
    sample_rate: u32,
    coeffs: BiquadCoeffs,
    states: Vec<BiquadState>,
}

impl BiquadFilter {
    pub fn new(
        kind: FilterKind,
        frequency_hz: f64,
        sample_rate: u32,
        smoothing_secs: f64,
    ) -> Self {
        let frequency = clamp_frequency(frequency_hz, sample_rate as f64);
        let mut filter = Self {
            kind,
            frequency: SmoothedValue::new(frequency, smoothing_secs, sample_rate),
            q: DEFAULT_Q,
            sample_rate,
            coeffs: BiquadCoeffs::default(),
            states: vec![BiquadState::default(); 2],
        };
        filter.refresh_coeffs();
        filter
    }

    pub fn kind(&self) -> FilterKind {
        self.kind
    }

    /// Target cutoff frequency in Hz
    pub fn frequency(&self) -> f64 {
        self.frequency.target()
    }

    pub fn q(&self) -> f64 {
        self.q
    }

    /// Glide the cutoff to `frequency_hz` (clamped to the valid band)
    pub fn set_frequency(&mut self, frequency_hz: f64) {
        if frequency_hz.is_finite() {
            self.frequency
                .set_target(clamp_frequency(frequency_hz, self.sample_rate as f64));
        }
    }

    /// Set resonance, clamped to `[0.1, 10]`
    pub fn set_q(&mut self, q: f64) {
        if q.is_finite() {
            self.q = q.clamp(Q_RANGE.0, Q_RANGE.1);
            self.refresh_coeffs();
        }
    }

    fn refresh_coeffs(&mut self) {
        self.coeffs = BiquadCoeffs::calculate(
            self.kind,
            self.sample_rate as f64,
            self.frequency.current(),
            self.q,
        );
    }
}

impl Effect for BiquadFilter {
    fn process(&mut self, buffer: &mut AudioBuffer) {
        let channels = buffer.channels();
        if self.states.len() < channels {
            self.states.resize(channels, BiquadState::default());
        }

        let frames = buffer.len();
        let mut start = 0;
        while start < frames {
            let end = (start + COEFF_UPDATE_INTERVAL).min(frames);
            if !self.frequency.is_settled() {
                self.frequency.advance(end - start);
                self.refresh_coeffs();
            }

            for (ch, state) in self.states.iter_mut().enumerate().take(channels) {
                for sample in &mut buffer.channel_mut(ch)[start..end] {
                    *sample = state.process(*sample as f64, &self.coeffs) as f32;
                }
            }
            start = end;
        }
    }

    fn prepare(&mut self, sample_rate: u32) {
        self.sample_rate = sample_rate;
        self.frequency.prepare(sample_rate);
        let target = clamp_frequency(self.frequency.target(), sample_rate as f64);
        self.frequency.set_target(target);
        self.frequency.snap();
        self.refresh_coeffs();
    }

    fn reset(&mut self) {
        self.states.fill(BiquadState::default());
        self.frequency.snap();
        self.refresh_coeffs();
    }

    fn effect_type(&self) -> &'static str {
        match self.kind {
            FilterKind::HighPass => "highpass",
            FilterKind::LowPass => "lowpass",
        }
    }

    fn get_params(&self) -> Value {
        json!({
            "frequency_hz": self.frequency.target(),
            "q": self.q,
        })
    }
}
