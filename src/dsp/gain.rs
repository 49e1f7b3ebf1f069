//! Master gain slot
//!
//! Linear volume in `[0, 1]`, smoothed per sample so volume changes coming
//! in at sensor rate do not zipper.

use serde_json::{json, Value};

use crate::dsp::effect::{Effect, SmoothedValue};
use crate::engine::AudioBuffer;

/// Smoothed master volume
#[derive(Debug, Clone)]
pub struct MasterGain {
    gain: SmoothedValue,
}

impl MasterGain {
    /// Create a master gain settled at `volume` (clamped to `[0, 1]`)
    pub fn new(volume: f32, sample_rate: u32, smoothing_secs: f64) -> Self {
        Self {
            gain: SmoothedValue::new(clamp_volume(volume) as f64, smoothing_secs, sample_rate),
        }
    }

    /// Glide toward `volume`, clamped to `[0, 1]`
    pub fn set_volume(&mut self, volume: f32) {
        if volume.is_finite() {
            self.gain.set_target(clamp_volume(volume) as f64);
        }
    }

    /// Target volume
    pub fn volume(&self) -> f32 {
        self.gain.target() as f32
    }
}

fn clamp_volume(volume: f32) -> f32 {
    volume.clamp(0.0, 1.0)
}

impl Effect for MasterGain {
    fn process(&mut self, buffer: &mut AudioBuffer) {
        if self.gain.is_settled() {
            let gain = self.gain.current() as f32;
            if (gain - 1.0).abs() < f32::EPSILON {
                return;
            }
            for channel in buffer.samples.iter_mut() {
                for sample in channel.iter_mut() {
                    *sample *= gain;
                }
            }
            return;
        }

        let channels = buffer.channels();
        for frame in 0..buffer.len() {
            let gain = self.gain.next_value() as f32;
            for ch in 0..channels {
                buffer.samples[ch][frame] *= gain;
            }
        }
    }

    fn prepare(&mut self, sample_rate: u32) {
        self.gain.prepare(sample_rate);
    }

    fn reset(&mut self) {
        self.gain.snap();
    }

    fn effect_type(&self) -> &'static str {
        "master_gain"
    }

    fn get_params(&self) -> Value {
        json!({ "volume": self.gain.target() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ChannelLayout;
    use approx::assert_relative_eq;

    fn ones(frames: usize) -> AudioBuffer {
        let mut buffer = AudioBuffer::new(frames, ChannelLayout::Stereo, 48000);
        for channel in buffer.samples.iter_mut() {
            channel.fill(1.0);
        }
        buffer
    }

    #[test]
    fn test_volume_clamped() {
        let mut gain = MasterGain::new(2.0, 48000, 0.02);
        assert_eq!(gain.volume(), 1.0);
        gain.set_volume(-1.0);
        assert_eq!(gain.volume(), 0.0);
        gain.set_volume(f32::NAN);
        assert_eq!(gain.volume(), 0.0);
    }

    #[test]
    fn test_settled_gain_scales() {
        let mut gain = MasterGain::new(0.5, 48000, 0.02);
        let mut buffer = ones(16);
        gain.process(&mut buffer);
        assert!(buffer.channel(1).iter().all(|&s| (s - 0.5).abs() < 1e-6));
    }

    #[test]
    fn test_volume_change_is_smoothed() {
        let mut gain = MasterGain::new(1.0, 48000, 0.02);
        gain.set_volume(0.0);
        let mut buffer = ones(480);
        gain.process(&mut buffer);

        let samples = buffer.channel(0);
        // No step: first sample barely moved, later samples keep falling
        assert!(samples[0] > 0.99);
        assert!(samples.windows(2).all(|w| w[1] <= w[0]));
        assert_relative_eq!(samples[479], (-0.5_f32).exp(), epsilon = 1e-2);
    }
}
