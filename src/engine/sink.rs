//! Audio sinks
//!
//! A sink is whatever pulls rendered audio out of the [`RenderGraph`]:
//! a real output device, or a host application that drives rendering
//! itself. The engine only talks to sinks through [`AudioSink`].

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::engine::buffer::AudioBuffer;
use crate::engine::graph::SharedGraph;
use crate::error::{GranularError, Result};

#[cfg(feature = "cpal")]
pub use self::device::CpalSink;

/// Output format reported by a sink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkInfo {
    pub sample_rate: u32,
    pub channels: u16,
}

/// Destination for rendered audio
pub trait AudioSink: Send {
    /// Check that output is possible and report its format
    ///
    /// # Errors
    /// * `UnsupportedEnvironment` - If there is no usable output
    fn probe(&mut self) -> Result<SinkInfo>;

    /// Start pulling audio from `graph`
    fn open(&mut self, graph: SharedGraph) -> Result<()>;

    /// Stop pulling audio and release the graph
    fn close(&mut self);

    fn is_open(&self) -> bool;
}

// ============================================================================
// Pull Sink
// ============================================================================

/// Sink driven by the host: nothing is rendered until a [`PullHandle`]
/// asks for frames
pub struct PullSink {
    sample_rate: u32,
    graph: Arc<Mutex<Option<SharedGraph>>>,
}

/// Cloneable handle used by the host to render blocks from a [`PullSink`]
#[derive(Clone)]
pub struct PullHandle {
    graph: Arc<Mutex<Option<SharedGraph>>>,
}

impl PullSink {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            graph: Arc::new(Mutex::new(None)),
        }
    }

    pub fn handle(&self) -> PullHandle {
        PullHandle {
            graph: Arc::clone(&self.graph),
        }
    }
}

impl AudioSink for PullSink {
    fn probe(&mut self) -> Result<SinkInfo> {
        if self.sample_rate == 0 {
            return Err(GranularError::UnsupportedEnvironment {
                reason: "pull sink has a sample rate of 0 Hz".to_string(),
            });
        }
        Ok(SinkInfo {
            sample_rate: self.sample_rate,
            channels: 2,
        })
    }

    fn open(&mut self, graph: SharedGraph) -> Result<()> {
        *self.graph.lock() = Some(graph);
        debug!(sample_rate = self.sample_rate, "pull sink opened");
        Ok(())
    }

    fn close(&mut self) {
        self.graph.lock().take();
    }

    fn is_open(&self) -> bool {
        self.graph.lock().is_some()
    }
}

impl PullHandle {
    fn graph(&self) -> Result<SharedGraph> {
        self.graph.lock().clone().ok_or(GranularError::NotInitialized)
    }

    /// Render `frames` frames of processed stereo audio
    ///
    /// # Errors
    /// * `NotInitialized` - If the sink is not open
    pub fn render(&self, frames: usize) -> Result<AudioBuffer> {
        let graph = self.graph()?;
        let mut graph = graph.lock();
        Ok(graph.render(frames).clone())
    }

    /// Fill an interleaved buffer with `channels` channels
    ///
    /// # Errors
    /// * `NotInitialized` - If the sink is not open
    pub fn render_interleaved(&self, out: &mut [f32], channels: usize) -> Result<()> {
        let graph = self.graph()?;
        graph.lock().render_interleaved(out, channels);
        Ok(())
    }
}

// ============================================================================
// Device Sink
// ============================================================================

#[cfg(feature = "cpal")]
mod device {
    use std::thread::JoinHandle;

    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
    use cpal::{FromSample, Sample, SizedSample};
    use crossbeam_channel::{Receiver, Sender};
    use tracing::{error, info, warn};

    use super::*;

    /// Default system output device through cpal
    ///
    /// cpal streams are not `Send`, so the stream is built and owned by a
    /// dedicated thread that lives until [`AudioSink::close`].
    pub struct CpalSink {
        info: Option<SinkInfo>,
        quit: Option<Sender<()>>,
        thread: Option<JoinHandle<()>>,
    }

    impl CpalSink {
        pub fn new() -> Self {
            Self {
                info: None,
                quit: None,
                thread: None,
            }
        }

        fn default_device() -> Result<(cpal::Device, cpal::SupportedStreamConfig)> {
            let host = cpal::default_host();
            let device = host.default_output_device().ok_or_else(|| {
                GranularError::UnsupportedEnvironment {
                    reason: "no default output device".to_string(),
                }
            })?;
            let config = device.default_output_config().map_err(|e| {
                GranularError::UnsupportedEnvironment {
                    reason: format!("no usable output config: {}", e),
                }
            })?;
            Ok((device, config))
        }

        fn build_stream(
            device: &cpal::Device,
            supported: &cpal::SupportedStreamConfig,
            graph: SharedGraph,
        ) -> Result<cpal::Stream> {
            let config: cpal::StreamConfig = supported.config();
            match supported.sample_format() {
                cpal::SampleFormat::F32 => Self::build_typed::<f32>(device, &config, graph),
                cpal::SampleFormat::I16 => Self::build_typed::<i16>(device, &config, graph),
                cpal::SampleFormat::U16 => Self::build_typed::<u16>(device, &config, graph),
                cpal::SampleFormat::I32 => Self::build_typed::<i32>(device, &config, graph),
                other => Err(GranularError::SinkError {
                    reason: format!("unsupported sample format {:?}", other),
                }),
            }
        }

        fn build_typed<T>(
            device: &cpal::Device,
            config: &cpal::StreamConfig,
            graph: SharedGraph,
        ) -> Result<cpal::Stream>
        where
            T: SizedSample + FromSample<f32>,
        {
            let channels = config.channels as usize;
            let error_graph = Arc::clone(&graph);
            let mut scratch: Vec<f32> = Vec::new();

            device
                .build_output_stream(
                    config,
                    move |output: &mut [T], _: &cpal::OutputCallbackInfo| {
                        scratch.resize(output.len(), 0.0);
                        graph.lock().render_interleaved(&mut scratch, channels);
                        for (out, &sample) in output.iter_mut().zip(scratch.iter()) {
                            *out = <T as Sample>::from_sample(sample);
                        }
                    },
                    move |err| error_graph.lock().report_fault(format!("output stream: {}", err)),
                    None,
                )
                .map_err(|e| GranularError::SinkError {
                    reason: format!("failed to build output stream: {}", e),
                })
        }

        /// Thread body: build the stream, report readiness, park until quit
        fn run(graph: SharedGraph, ready: Sender<Result<()>>, quit: Receiver<()>) {
            let stream = Self::default_device()
                .and_then(|(device, config)| Self::build_stream(&device, &config, graph));
            let stream = match stream {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = ready.send(Err(e));
                    return;
                }
            };

            if let Err(e) = stream.play() {
                let _ = ready.send(Err(GranularError::SinkError {
                    reason: format!("failed to start output stream: {}", e),
                }));
                return;
            }
            let _ = ready.send(Ok(()));

            // Blocks until close() sends or drops the quit sender
            let _ = quit.recv();
            if let Err(e) = stream.pause() {
                warn!(error = %e, "failed to pause output stream");
            }
        }
    }

    impl Default for CpalSink {
        fn default() -> Self {
            Self::new()
        }
    }

    impl AudioSink for CpalSink {
        fn probe(&mut self) -> Result<SinkInfo> {
            let (_, config) = Self::default_device()?;
            let info = SinkInfo {
                sample_rate: config.sample_rate().0,
                channels: config.channels(),
            };
            self.info = Some(info);
            Ok(info)
        }

        fn open(&mut self, graph: SharedGraph) -> Result<()> {
            if self.is_open() {
                return Ok(());
            }

            let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);
            let (quit_tx, quit_rx) = crossbeam_channel::bounded(1);
            let thread = std::thread::Builder::new()
                .name("granular-output".to_string())
                .spawn(move || Self::run(graph, ready_tx, quit_rx))?;

            match ready_rx.recv() {
                Ok(Ok(())) => {
                    self.quit = Some(quit_tx);
                    self.thread = Some(thread);
                    info!(info = ?self.info, "output device opened");
                    Ok(())
                }
                Ok(Err(e)) => {
                    let _ = thread.join();
                    Err(e)
                }
                Err(_) => {
                    let _ = thread.join();
                    Err(GranularError::SinkError {
                        reason: "output thread exited during setup".to_string(),
                    })
                }
            }
        }

        fn close(&mut self) {
            if let Some(quit) = self.quit.take() {
                let _ = quit.send(());
            }
            if let Some(thread) = self.thread.take() {
                if thread.join().is_err() {
                    error!("output thread panicked");
                }
            }
        }

        fn is_open(&self) -> bool {
            self.thread.is_some()
        }
    }

    impl Drop for CpalSink {
        fn drop(&mut self) {
            self.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::engine::graph::RenderGraph;

    #[test]
    fn test_pull_sink_probe() {
        let mut sink = PullSink::new(44100);
        let info = sink.probe().unwrap();
        assert_eq!(info.sample_rate, 44100);
        assert_eq!(info.channels, 2);

        let err = PullSink::new(0).probe().unwrap_err();
        assert_eq!(err.error_code(), "UNSUPPORTED_ENVIRONMENT");
    }

    #[test]
    fn test_pull_handle_requires_open_sink() {
        let sink = PullSink::new(48000);
        let handle = sink.handle();
        assert!(matches!(
            handle.render(64),
            Err(GranularError::NotInitialized)
        ));
    }

    #[test]
    fn test_pull_handle_renders_after_open() {
        let mut sink = PullSink::new(48000);
        let handle = sink.handle();
        let graph = RenderGraph::new(48000, &EngineConfig::default()).shared();

        sink.open(graph).unwrap();
        assert!(sink.is_open());
        let block = handle.render(128).unwrap();
        assert_eq!(block.len(), 128);
        assert_eq!(block.channels(), 2);

        sink.close();
        assert!(!sink.is_open());
        assert!(handle.render(128).is_err());
    }
}
