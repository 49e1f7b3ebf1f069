//! Render graph
//!
//! Grain voices sum into a stereo bus, the bus runs through the processing
//! chain, and the result goes to the output taps and the sink. The graph is
//! shared between the scheduler and the sink behind one mutex, so voice
//! insertion, eviction and chain reconnects all land between blocks.

use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use tracing::{debug, error};

use crate::config::EngineConfig;
use crate::dsp::ProcessingChain;
use crate::engine::buffer::{AudioBuffer, ChannelLayout};
use crate::grain::GrainVoicePool;

/// Graph handle shared by the engine, its scheduler and the audio sink
pub type SharedGraph = Arc<Mutex<RenderGraph>>;

/// Number of channels on the mix bus and on every tap
pub const BUS_CHANNELS: usize = 2;

/// Pool → chain → taps, rendered one block at a time
pub struct RenderGraph {
    pool: GrainVoicePool,
    chain: ProcessingChain,
    bus: AudioBuffer,
    block_size: usize,
    taps: Vec<Sender<Vec<f32>>>,
    fault: Option<String>,
}

impl RenderGraph {
    pub fn new(sample_rate: u32, config: &EngineConfig) -> Self {
        Self {
            pool: GrainVoicePool::new(sample_rate, config.max_grains),
            chain: ProcessingChain::new(sample_rate, config.volume, config.smoothing_secs()),
            bus: AudioBuffer::new(config.block_size, ChannelLayout::Stereo, sample_rate),
            block_size: config.block_size.max(1),
            taps: Vec::new(),
            fault: None,
        }
    }

    /// Wrap in the shared handle
    pub fn shared(self) -> SharedGraph {
        Arc::new(Mutex::new(self))
    }

    pub fn sample_rate(&self) -> u32 {
        self.pool.sample_rate()
    }

    pub fn pool(&self) -> &GrainVoicePool {
        &self.pool
    }

    pub fn pool_mut(&mut self) -> &mut GrainVoicePool {
        &mut self.pool
    }

    pub fn chain(&self) -> &ProcessingChain {
        &self.chain
    }

    pub fn chain_mut(&mut self) -> &mut ProcessingChain {
        &mut self.chain
    }

    /// Render `frames` frames and return the processed stereo bus
    pub fn render(&mut self, frames: usize) -> &AudioBuffer {
        self.bus.clear_to(frames);
        self.pool.render(&mut self.bus);
        self.chain.process(&mut self.bus);
        self.feed_taps();
        &self.bus
    }

    /// Fill an interleaved device buffer with `channels` channels
    ///
    /// Mono devices get the average of left and right; channels beyond the
    /// second are left silent. Rendering happens in blocks of at most
    /// `block_size` frames.
    pub fn render_interleaved(&mut self, out: &mut [f32], channels: usize) {
        if channels == 0 {
            return;
        }

        let block_samples = self.block_size * channels;
        for chunk in out.chunks_mut(block_samples) {
            let frames = chunk.len() / channels;
            let bus = self.render(frames);
            let (left, right) = (bus.channel(0), bus.channel(1));

            for (i, frame) in chunk.chunks_exact_mut(channels).enumerate() {
                match channels {
                    1 => frame[0] = 0.5 * (left[i] + right[i]),
                    _ => {
                        frame[0] = left[i];
                        frame[1] = right[i];
                        frame[2..].fill(0.0);
                    }
                }
            }
        }
    }

    /// Attach a new output tap
    ///
    /// The receiver gets every processed block as interleaved stereo. When
    /// it falls `capacity` blocks behind, new blocks are dropped for it.
    pub fn add_tap(&mut self, capacity: usize) -> Receiver<Vec<f32>> {
        let (tx, rx) = crossbeam_channel::bounded(capacity.max(1));
        self.taps.push(tx);
        debug!(taps = self.taps.len(), "output tap attached");
        rx
    }

    pub fn tap_count(&self) -> usize {
        self.taps.len()
    }

    fn feed_taps(&mut self) {
        if self.taps.is_empty() {
            return;
        }

        let block = self.bus.to_interleaved();
        self.taps.retain(|tap| match tap.try_send(block.clone()) {
            Ok(()) | Err(TrySendError::Full(_)) => true,
            Err(TrySendError::Disconnected(_)) => false,
        });
    }

    /// Record a failure from the audio side; the engine stops on its next tick
    pub fn report_fault(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        error!(%reason, "render graph fault");
        if self.fault.is_none() {
            self.fault = Some(reason);
        }
    }

    pub fn fault(&self) -> Option<&str> {
        self.fault.as_deref()
    }

    pub fn take_fault(&mut self) -> Option<String> {
        self.fault.take()
    }
}
