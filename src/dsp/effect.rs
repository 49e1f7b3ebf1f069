//! Effect trait definition
//!
//! Base trait for the processing-chain slots, plus the one-pole parameter
//! smoother they share so gain and cutoff changes never step audibly.

use serde_json::Value;

use crate::engine::AudioBuffer;

/// Base trait for all chain effects
///
/// Effects process audio buffers in-place, one block at a time.
pub trait Effect: Send {
    /// Process audio buffer in-place
    fn process(&mut self, buffer: &mut AudioBuffer);

    /// Prepare the effect for processing
    ///
    /// Called when the sample rate changes.
    fn prepare(&mut self, sample_rate: u32);

    /// Reset effect state
    ///
    /// Clears filter history and snaps smoothed parameters to their targets.
    fn reset(&mut self);

    /// Get the effect type identifier
    fn effect_type(&self) -> &'static str;

    /// Get all parameters as JSON (for UI inspection)
    fn get_params(&self) -> Value;
}

// ============================================================================
// Parameter smoothing
// ============================================================================

/// Exponential (one-pole) smoother toward a target value
#[derive(Debug, Clone)]
pub struct SmoothedValue {
    current: f64,
    target: f64,
    coeff: f64,
    time_constant_secs: f64,
}

impl SmoothedValue {
    /// Values closer than this to the target snap onto it
    const SETTLE_EPSILON: f64 = 1e-6;

    /// Create a smoother already settled on `value`
    ///
    /// # Arguments
    /// * `value` - Initial value
    /// * `time_constant_secs` - Time to cover ~63% of a step
    /// * `sample_rate` - Rate at which `next` is called
    pub fn new(value: f64, time_constant_secs: f64, sample_rate: u32) -> Self {
        let mut smoother = Self {
            current: value,
            target: value,
            coeff: 0.0,
            time_constant_secs,
        };
        smoother.prepare(sample_rate);
        smoother
    }

    /// Recompute the per-step coefficient for a new sample rate
    pub fn prepare(&mut self, sample_rate: u32) {
        let steps = self.time_constant_secs * sample_rate as f64;
        self.coeff = if steps > 0.0 { (-1.0 / steps).exp() } else { 0.0 };
    }

    pub fn set_target(&mut self, target: f64) {
        self.target = target;
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    pub fn current(&self) -> f64 {
        self.current
    }

    /// Jump straight to the target
    pub fn snap(&mut self) {
        self.current = self.target;
    }

    pub fn is_settled(&self) -> bool {
        self.current == self.target
    }

    /// Advance `steps` samples and return the new value
    #[inline]
    pub fn advance(&mut self, steps: usize) -> f64 {
        if self.is_settled() {
            return self.current;
        }

        let decay = self.coeff.powi(steps as i32);
        self.current = self.target + (self.current - self.target) * decay;
        if (self.current - self.target).abs() < Self::SETTLE_EPSILON {
            self.current = self.target;
        }
        self.current
    }

    /// Advance one sample and return the new value
    #[inline]
    pub fn next_value(&mut self) -> f64 {
        self.advance(1)
    }
}
