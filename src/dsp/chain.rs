//! Processing chain between the grain mix bus and the audio sink
//!
//! Three named slots processed in a fixed order:
//! 1. High-pass (optional)
//! 2. Low-pass (optional)
//! 3. Master gain (always present)
//!
//! The active path is rebuilt by [`ProcessingChain::reconnect`] after every
//! structural change. Disabled slots are left out of the path entirely.
//! The chain is only touched between blocks, so a reconnect never splits a
//! block.

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::dsp::effect::Effect;
use crate::dsp::filter::{BiquadFilter, FilterKind};
use crate::dsp::gain::MasterGain;
use crate::engine::AudioBuffer;

/// Default high-pass cutoff in Hz
pub const DEFAULT_HIGHPASS_HZ: f64 = 80.0;
/// Default low-pass cutoff in Hz
pub const DEFAULT_LOWPASS_HZ: f64 = 12000.0;

/// Slot identifiers, in processing order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainSlot {
    HighPass,
    LowPass,
    MasterGain,
}

impl ChainSlot {
    /// Fixed processing order
    pub const ORDER: [ChainSlot; 3] = [ChainSlot::HighPass, ChainSlot::LowPass, ChainSlot::MasterGain];
}

/// Partial settings for one filter slot
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSettings {
    pub enabled: Option<bool>,
    pub frequency_hz: Option<f64>,
    pub q: Option<f64>,
}

/// Partial chain configuration; absent fields keep their current value
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub highpass: Option<FilterSettings>,
    pub lowpass: Option<FilterSettings>,
    pub bypass: Option<bool>,
}

struct EffectSlot<E: Effect> {
    node: E,
    enabled: bool,
}

/// Reconfigurable high-pass → low-pass → master-gain chain
pub struct ProcessingChain {
    highpass: EffectSlot<BiquadFilter>,
    lowpass: EffectSlot<BiquadFilter>,
    master_gain: EffectSlot<MasterGain>,
    /// Active path, rebuilt by `reconnect`
    path: Vec<ChainSlot>,
    bypass: bool,
    sample_rate: u32,
}

impl ProcessingChain {
    /// Create a chain with both filters disabled and the master gain at `volume`
    pub fn new(sample_rate: u32, volume: f32, smoothing_secs: f64) -> Self {
        let mut chain = Self {
            highpass: EffectSlot {
                node: BiquadFilter::new(
                    FilterKind::HighPass,
                    DEFAULT_HIGHPASS_HZ,
                    sample_rate,
                    smoothing_secs,
                ),
                enabled: false,
            },
            lowpass: EffectSlot {
                node: BiquadFilter::new(
                    FilterKind::LowPass,
                    DEFAULT_LOWPASS_HZ,
                    sample_rate,
                    smoothing_secs,
                ),
                enabled: false,
            },
            master_gain: EffectSlot {
                node: MasterGain::new(volume, sample_rate, smoothing_secs),
                enabled: true,
            },
            path: Vec::with_capacity(ChainSlot::ORDER.len()),
            bypass: false,
            sample_rate,
        };
        chain.reconnect();
        chain
    }

    /// Apply a partial configuration, then reconnect once
    pub fn apply(&mut self, config: &FilterConfig) {
        if let Some(settings) = config.highpass {
            Self::apply_filter(&mut self.highpass, settings);
        }
        if let Some(settings) = config.lowpass {
            Self::apply_filter(&mut self.lowpass, settings);
        }
        if let Some(bypass) = config.bypass {
            self.bypass = bypass;
        }
        self.reconnect();
    }

    fn apply_filter(slot: &mut EffectSlot<BiquadFilter>, settings: FilterSettings) {
        if let Some(frequency) = settings.frequency_hz {
            slot.node.set_frequency(frequency);
        }
        if let Some(q) = settings.q {
            slot.node.set_q(q);
        }
        if let Some(enabled) = settings.enabled {
            if enabled && !slot.enabled {
                // Stale history from the last time the slot ran would click
                slot.node.reset();
            }
            slot.enabled = enabled;
        }
    }

    /// Set the master volume (clamped to `[0, 1]`, smoothed)
    pub fn set_master_volume(&mut self, volume: f32) {
        self.master_gain.node.set_volume(volume);
    }

    pub fn master_volume(&self) -> f32 {
        self.master_gain.node.volume()
    }

    /// Route input straight to output without discarding slot configuration
    pub fn set_bypass(&mut self, bypass: bool) {
        self.bypass = bypass;
        self.reconnect();
    }

    pub fn is_bypassed(&self) -> bool {
        self.bypass
    }

    pub fn is_enabled(&self, slot: ChainSlot) -> bool {
        match slot {
            ChainSlot::HighPass => self.highpass.enabled,
            ChainSlot::LowPass => self.lowpass.enabled,
            ChainSlot::MasterGain => self.master_gain.enabled,
        }
    }

    /// Tear down and rebuild the active path in fixed order
    pub fn reconnect(&mut self) {
        self.path.clear();
        if !self.bypass {
            for slot in ChainSlot::ORDER {
                if self.is_enabled(slot) {
                    self.path.push(slot);
                }
            }
        }
        debug!(path = ?self.path, bypass = self.bypass, "processing chain reconnected");
    }

    /// Slots audio currently flows through, in order (empty when bypassed)
    pub fn signal_path(&self) -> &[ChainSlot] {
        &self.path
    }

    fn node_mut(&mut self, slot: ChainSlot) -> &mut dyn Effect {
        match slot {
            ChainSlot::HighPass => &mut self.highpass.node,
            ChainSlot::LowPass => &mut self.lowpass.node,
            ChainSlot::MasterGain => &mut self.master_gain.node,
        }
    }

    /// Process one block in place through the active path
    pub fn process(&mut self, buffer: &mut AudioBuffer) {
        for i in 0..self.path.len() {
            let slot = self.path[i];
            self.node_mut(slot).process(buffer);
        }
    }

    /// Re-prepare every slot for a new sample rate
    pub fn prepare(&mut self, sample_rate: u32) {
        self.sample_rate = sample_rate;
        for slot in ChainSlot::ORDER {
            self.node_mut(slot).prepare(sample_rate);
        }
    }

    /// Clear filter history and settle all smoothed parameters
    pub fn reset(&mut self) {
        for slot in ChainSlot::ORDER {
            self.node_mut(slot).reset();
        }
    }

    /// Serialize chain state to JSON
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "sample_rate": self.sample_rate,
            "bypass": self.bypass,
            "path": self.path,
            "slots": [
                slot_json(&self.highpass.node, self.highpass.enabled),
                slot_json(&self.lowpass.node, self.lowpass.enabled),
                slot_json(&self.master_gain.node, self.master_gain.enabled),
            ],
        })
    }
}

fn slot_json(node: &dyn Effect, enabled: bool) -> serde_json::Value {
    json!({
        "type": node.effect_type(),
        "enabled": enabled,
        "params": node.get_params(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ChannelLayout;
    use pretty_assertions::assert_eq;

    fn chain() -> ProcessingChain {
        ProcessingChain::new(48000, 1.0, 0.02)
    }

    fn enable(slot_hp: Option<bool>, slot_lp: Option<bool>) -> FilterConfig {
        FilterConfig {
            highpass: slot_hp.map(|enabled| FilterSettings {
                enabled: Some(enabled),
                ..Default::default()
            }),
            lowpass: slot_lp.map(|enabled| FilterSettings {
                enabled: Some(enabled),
                ..Default::default()
            }),
            bypass: None,
        }
    }

    #[test]
    fn test_default_path_is_master_gain_only() {
        assert_eq!(chain().signal_path(), &[ChainSlot::MasterGain]);
    }

    #[test]
    fn test_path_follows_fixed_order() {
        let mut chain = chain();
        chain.apply(&enable(None, Some(true)));
        assert_eq!(chain.signal_path(), &[ChainSlot::LowPass, ChainSlot::MasterGain]);

        chain.apply(&enable(Some(true), None));
        assert_eq!(
            chain.signal_path(),
            &[ChainSlot::HighPass, ChainSlot::LowPass, ChainSlot::MasterGain]
        );

        chain.apply(&enable(None, Some(false)));
        assert_eq!(chain.signal_path(), &[ChainSlot::HighPass, ChainSlot::MasterGain]);
    }

    #[test]
    fn test_bypass_restores_configured_chain() {
        let mut chain = chain();
        chain.apply(&enable(Some(true), Some(true)));
        chain.set_bypass(true);
        assert!(chain.signal_path().is_empty());

        chain.set_bypass(false);
        assert_eq!(
            chain.signal_path(),
            &[ChainSlot::HighPass, ChainSlot::LowPass, ChainSlot::MasterGain]
        );
    }

    #[test]
    fn test_bypass_passes_audio_untouched() {
        let mut chain = ProcessingChain::new(48000, 0.25, 0.02);
        chain.set_bypass(true);

        let mut buffer = AudioBuffer::new(32, ChannelLayout::Stereo, 48000);
        buffer.channel_mut(0).fill(0.8);
        let original = buffer.clone();
        chain.process(&mut buffer);
        assert_eq!(buffer, original);
    }

    #[test]
    fn test_partial_filter_update_keeps_other_fields() {
        let mut chain = chain();
        let config: FilterConfig =
            serde_json::from_str(r#"{"lowpass": {"frequency_hz": 2000}}"#).unwrap();
        chain.apply(&config);

        assert!(!chain.is_enabled(ChainSlot::LowPass));
        let json = chain.to_json();
        assert_eq!(json["slots"][1]["params"]["frequency_hz"], 2000.0);
        assert_eq!(json["slots"][0]["params"]["frequency_hz"], DEFAULT_HIGHPASS_HZ);
    }

    #[test]
    fn test_master_volume() {
        let mut chain = chain();
        chain.set_master_volume(0.3);
        assert!((chain.master_volume() - 0.3).abs() < 1e-6);
        chain.set_master_volume(4.0);
        assert_eq!(chain.master_volume(), 1.0);
    }
}
