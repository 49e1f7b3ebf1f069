//! Granular synthesis engine
//!
//! Owns the loaded buffer, the playback cursor and the live parameters, and
//! runs the grain scheduler on a worker thread while playing.
//!
//! # Threading
//!
//! Two locks exist: the engine state (shared with the scheduler thread) and
//! the render graph (shared with the audio sink). When both are needed the
//! state lock is always taken first. The audio thread only ever takes the
//! graph lock.

use std::path::Path;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, info, trace, warn};

use crate::config::EngineConfig;
use crate::dsp::FilterConfig;
use crate::engine::buffer::AudioBuffer;
use crate::engine::graph::{RenderGraph, SharedGraph};
use crate::engine::io::import_audio;
use crate::engine::params::{
    Direction, GranularParameters, GranularUpdate, PlaybackState, MAX_PLAYBACK_RATE,
};
use crate::engine::scheduler::{advance_cursor, interval_duration, GrainScheduler};
use crate::engine::sink::AudioSink;
use crate::error::{GranularError, Result};
use crate::grain::MAX_GRAINS_LIMIT;

// ============================================================================
// Shared state
// ============================================================================

/// Live engine state, guarded by [`Shared::state`]
#[derive(Debug)]
struct EngineState {
    initialized: bool,
    buffer: Option<Arc<AudioBuffer>>,
    position: f64,
    rate: f64,
    direction: Direction,
    volume: f32,
    params: GranularParameters,
    playing: bool,
    scheduler: GrainScheduler,
    grains_emitted: u64,
    error: Option<String>,
}

impl EngineState {
    fn new(params: GranularParameters, volume: f32) -> Self {
        Self {
            initialized: false,
            buffer: None,
            position: 0.0,
            rate: 1.0,
            direction: Direction::Forward,
            volume,
            params,
            playing: false,
            scheduler: GrainScheduler::new(),
            grains_emitted: 0,
            error: None,
        }
    }

    fn duration(&self) -> f64 {
        self.buffer.as_ref().map_or(0.0, |b| b.duration_secs())
    }
}

struct Shared {
    state: Mutex<EngineState>,
    /// Signalled on stop and on parameter changes so the scheduler re-plans
    wake: Condvar,
}

// ============================================================================
// Engine
// ============================================================================

/// Real-time granular synthesizer
///
/// # Example
/// ```no_run
/// use granular::{EngineConfig, GranularEngine, PullSink};
///
/// let sink = PullSink::new(48000);
/// let mut engine = GranularEngine::new(EngineConfig::default(), sink).unwrap();
/// engine.initialize().unwrap();
/// engine.load_file("loop.wav".as_ref()).unwrap();
/// engine.set_playback_rate(0.5, -1.0);
/// assert!(engine.start_playback());
/// ```
pub struct GranularEngine {
    config: EngineConfig,
    sink: Box<dyn AudioSink>,
    shared: Arc<Shared>,
    graph: Option<SharedGraph>,
    worker: Option<JoinHandle<()>>,
    /// Reason the first `initialize` failed; repeated calls report it again
    init_failure: Option<String>,
}

impl GranularEngine {
    /// Create an engine that will play through `sink`
    ///
    /// # Errors
    /// * `InvalidParameterRange` / `InvalidConfig` - If `config` is invalid
    pub fn new(config: EngineConfig, sink: impl AudioSink + 'static) -> Result<Self> {
        config.validate()?;
        let params = config.initial_params()?;

        Ok(Self {
            shared: Arc::new(Shared {
                state: Mutex::new(EngineState::new(params, config.volume)),
                wake: Condvar::new(),
            }),
            config,
            sink: Box::new(sink),
            graph: None,
            worker: None,
            init_failure: None,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Output sample rate, once initialized
    pub fn sample_rate(&self) -> Option<u32> {
        self.graph.as_ref().map(|g| g.lock().sample_rate())
    }

    /// Probe the sink, build the render graph and open the sink
    ///
    /// Succeeds immediately if already initialized.
    ///
    /// # Errors
    /// * `UnsupportedEnvironment` - If the sink cannot produce audio. The
    ///   failure is remembered and returned again on later calls.
    pub fn initialize(&mut self) -> Result<()> {
        if self.shared.state.lock().initialized {
            return Ok(());
        }
        if let Some(reason) = &self.init_failure {
            return Err(GranularError::UnsupportedEnvironment {
                reason: reason.clone(),
            });
        }

        match self.open_sink() {
            Ok(graph) => {
                self.graph = Some(graph);
                self.shared.state.lock().initialized = true;
                info!(sample_rate = ?self.sample_rate(), "granular engine initialized");
                Ok(())
            }
            Err(e) => {
                let reason = match e {
                    GranularError::UnsupportedEnvironment { reason } => reason,
                    other => other.to_string(),
                };
                error!(%reason, "granular engine initialization failed");
                self.init_failure = Some(reason.clone());
                Err(GranularError::UnsupportedEnvironment { reason })
            }
        }
    }

    fn open_sink(&mut self) -> Result<SharedGraph> {
        let info = self.sink.probe()?;
        let volume = self.shared.state.lock().volume;

        let mut graph = RenderGraph::new(info.sample_rate, &self.config);
        graph.chain_mut().set_master_volume(volume);
        let graph = graph.shared();

        self.sink.open(Arc::clone(&graph))?;
        Ok(graph)
    }

    fn require_graph(&self) -> Result<&SharedGraph> {
        self.graph.as_ref().ok_or(GranularError::NotInitialized)
    }

    // ========================================================================
    // Loading
    // ========================================================================

    /// Decode `path` and make it the playback source
    ///
    /// Resets the cursor to 0. On failure the previous buffer stays loaded.
    ///
    /// # Errors
    /// * `NotInitialized` - If `initialize` has not succeeded
    /// * `FileNotFound` / `DecodeError` - If the file cannot be decoded
    pub fn load_file(&mut self, path: &Path) -> Result<()> {
        self.require_graph()?;
        let buffer = import_audio(path).map_err(|e| {
            warn!(path = %path.display(), error = %e, "failed to load audio file");
            e
        })?;
        self.install_buffer(buffer);
        info!(path = %path.display(), "audio file loaded");
        Ok(())
    }

    /// Make already-decoded audio the playback source
    ///
    /// Same replacement semantics as [`GranularEngine::load_file`].
    ///
    /// # Errors
    /// * `NotInitialized` - If `initialize` has not succeeded
    /// * `DecodeError` - If the buffer is empty, has a sample rate of 0, or
    ///   is not mono/stereo with equal-length channels
    pub fn load_buffer(&mut self, buffer: AudioBuffer) -> Result<()> {
        self.require_graph()?;
        let buffer = AudioBuffer::from_channels(buffer.samples, buffer.sample_rate)?;
        if buffer.is_empty() || buffer.sample_rate == 0 {
            return Err(GranularError::DecodeError {
                reason: "audio contains no samples".to_string(),
                source: None,
            });
        }
        self.install_buffer(buffer);
        Ok(())
    }

    fn install_buffer(&mut self, buffer: AudioBuffer) {
        let mut state = self.shared.state.lock();
        info!(
            duration_secs = buffer.duration_secs(),
            channels = buffer.channels(),
            sample_rate = buffer.sample_rate,
            "audio buffer replaced"
        );
        state.buffer = Some(Arc::new(buffer));
        state.position = 0.0;
    }

    pub fn is_audio_buffer_loaded(&self) -> bool {
        self.shared.state.lock().buffer.is_some()
    }

    // ========================================================================
    // Transport
    // ========================================================================

    /// Start the grain scheduler
    ///
    /// # Returns
    /// `false`, with no state change, if the engine is not initialized, no
    /// buffer is loaded, or playback is already running.
    pub fn start_playback(&mut self) -> bool {
        if self.is_playback_active() {
            debug!("start_playback while already playing");
            return false;
        }
        // Not playing: a remaining worker stopped itself after a fault and
        // has exited or is about to
        if let Some(stale) = self.worker.take() {
            let _ = stale.join();
        }

        let graph = match &self.graph {
            Some(graph) => Arc::clone(graph),
            None => {
                warn!("start_playback before initialize");
                return false;
            }
        };
        if !self.begin_session(&graph) {
            return false;
        }

        let shared = Arc::clone(&self.shared);
        let spawned = std::thread::Builder::new()
            .name("granular-scheduler".to_string())
            .spawn(move || run_scheduler(shared, graph));

        match spawned {
            Ok(worker) => {
                self.worker = Some(worker);
                info!("playback started");
                true
            }
            Err(e) => {
                error!(error = %e, "failed to spawn scheduler thread");
                self.shared.state.lock().playing = false;
                false
            }
        }
    }

    /// Mark a new playing session without spawning the worker
    fn begin_session(&self, graph: &SharedGraph) -> bool {
        let mut state = self.shared.state.lock();
        if state.buffer.is_none() {
            warn!("start_playback without a loaded buffer");
            return false;
        }
        if state.playing {
            debug!("start_playback while already playing");
            return false;
        }

        graph.lock().take_fault();
        state.playing = true;
        state.error = None;
        state.scheduler.reset();
        true
    }

    /// Stop the scheduler and silence every grain
    ///
    /// Idempotent. When this returns no grain is sounding and the scheduler
    /// thread has exited.
    pub fn stop_playback(&mut self) {
        {
            let mut state = self.shared.state.lock();
            let was_playing = state.playing;
            state.playing = false;
            if let Some(graph) = &self.graph {
                graph.lock().pool_mut().stop_all();
            }
            self.shared.wake.notify_all();
            if was_playing {
                info!(position_secs = state.position, "playback stopped");
            }
        }

        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("scheduler thread panicked");
            }
        }
    }

    pub fn is_playback_active(&self) -> bool {
        self.shared.state.lock().playing
    }

    // ========================================================================
    // Parameters
    // ========================================================================

    /// Set cursor speed and direction
    ///
    /// # Arguments
    /// * `rate` - Speed magnitude; the sign is ignored and the value is
    ///   clamped to `[0, 3]`
    /// * `direction` - Negative for reverse, anything else forward
    pub fn set_playback_rate(&self, rate: f64, direction: f64) {
        let mut state = self.shared.state.lock();
        if !rate.is_nan() {
            state.rate = rate.abs().min(MAX_PLAYBACK_RATE);
        }
        state.direction = Direction::from_value(direction);
        trace!(rate = state.rate, direction = ?state.direction, "playback rate set");
    }

    /// Set master volume, clamped to `[0, 1]`
    pub fn set_volume(&self, volume: f32) {
        if volume.is_nan() {
            return;
        }
        let mut state = self.shared.state.lock();
        state.volume = volume.clamp(0.0, 1.0);
        if let Some(graph) = &self.graph {
            graph.lock().chain_mut().set_master_volume(state.volume);
        }
    }

    /// Move the cursor, clamped to `[0, duration]`
    pub fn set_playback_position(&self, position_secs: f64) {
        if position_secs.is_nan() {
            return;
        }
        let mut state = self.shared.state.lock();
        state.position = position_secs.clamp(0.0, state.duration());
        debug!(position_secs = state.position, "playback position set");
    }

    pub fn get_playback_position(&self) -> f64 {
        self.shared.state.lock().position
    }

    /// Merge a partial parameter update, clamping each field
    ///
    /// # Returns
    /// The parameters now in effect.
    pub fn set_granular_params(&self, update: GranularUpdate) -> GranularParameters {
        let mut state = self.shared.state.lock();
        state.params = state.params.with(update);
        self.shared.wake.notify_all();
        debug!(params = ?state.params, "granular parameters updated");
        state.params
    }

    pub fn granular_params(&self) -> GranularParameters {
        self.shared.state.lock().params
    }

    /// Reconfigure the processing chain
    ///
    /// # Errors
    /// * `NotInitialized` - If `initialize` has not succeeded
    pub fn set_audio_filters(&self, config: &FilterConfig) -> Result<()> {
        let graph = self.require_graph()?;
        graph.lock().chain_mut().apply(config);
        Ok(())
    }

    /// Change the polyphony cap (clamped to `1..=100`), evicting immediately
    pub fn set_max_grains(&mut self, max_grains: usize) {
        self.config.max_grains = max_grains.clamp(1, MAX_GRAINS_LIMIT);
        if let Some(graph) = &self.graph {
            graph.lock().pool_mut().set_max_grains(self.config.max_grains);
        }
    }

    // ========================================================================
    // Queries and taps
    // ========================================================================

    /// Fresh snapshot of the engine
    pub fn get_state(&self) -> PlaybackState {
        let state = self.shared.state.lock();
        let (active_grain_count, fault) = match &self.graph {
            Some(graph) => {
                let graph = graph.lock();
                (
                    graph.pool().active_count(),
                    graph.fault().map(str::to_string),
                )
            }
            None => (0, None),
        };

        PlaybackState {
            initialized: state.initialized,
            playing: state.playing,
            has_buffer: state.buffer.is_some(),
            position_secs: state.position,
            duration_secs: state.duration(),
            rate: state.rate,
            direction: state.direction,
            volume: state.volume,
            active_grain_count,
            grains_emitted: state.grains_emitted,
            params: state.params,
            error: state.error.clone().or(fault),
        }
    }

    /// Processing chain configuration as JSON
    ///
    /// # Errors
    /// * `NotInitialized` - If `initialize` has not succeeded
    pub fn chain_snapshot(&self) -> Result<serde_json::Value> {
        Ok(self.require_graph()?.lock().chain().to_json())
    }

    /// Tap the processed output
    ///
    /// The receiver gets interleaved stereo blocks after the processing
    /// chain. Dropping it detaches the tap.
    ///
    /// # Errors
    /// * `NotInitialized` - If `initialize` has not succeeded
    pub fn add_output_tap(&self) -> Result<Receiver<Vec<f32>>> {
        Ok(self.require_graph()?.lock().add_tap(self.config.tap_capacity))
    }

    // ========================================================================
    // Teardown
    // ========================================================================

    /// Stop playback, close the sink and release the graph and buffer
    ///
    /// The engine returns to the uninitialized state.
    pub fn dispose(&mut self) {
        self.stop_playback();
        self.sink.close();
        self.graph = None;
        self.init_failure = None;

        let mut state = self.shared.state.lock();
        if state.initialized {
            info!("granular engine disposed");
        }
        state.initialized = false;
        state.buffer = None;
        state.position = 0.0;
    }

    /// Run a playing session against simulated time instead of a worker
    ///
    /// Returns the number of grains emitted in the first `span` of the
    /// session, or `None` if the session could not start.
    #[cfg(test)]
    pub(crate) fn simulate_session(&mut self, span: Duration) -> Option<u64> {
        let graph = Arc::clone(self.graph.as_ref()?);
        if !self.begin_session(&graph) {
            return None;
        }
        Some(self.run_ticks(Duration::ZERO, span))
    }

    /// Tick the current session from `from` until `until` (simulated)
    #[cfg(test)]
    pub(crate) fn run_ticks(&mut self, from: Duration, until: Duration) -> u64 {
        let Some(graph) = self.graph.as_ref().map(Arc::clone) else {
            return 0;
        };

        let mut state = self.shared.state.lock();
        let before = state.grains_emitted;
        let mut now = from;
        while now < until {
            match tick(&mut state, &graph, now) {
                Some(next) => now = next,
                None => break,
            }
        }
        state.grains_emitted - before
    }
}

impl Drop for GranularEngine {
    fn drop(&mut self) {
        self.dispose();
    }
}

// ============================================================================
// Scheduler loop
// ============================================================================

/// Worker thread body: tick, then sleep until the next wake or a notify
fn run_scheduler(shared: Arc<Shared>, graph: SharedGraph) {
    let origin = Instant::now();
    let mut state = shared.state.lock();

    while state.playing {
        let Some(next_wake) = tick(&mut state, &graph, origin.elapsed()) else {
            break;
        };
        let _ = shared.wake.wait_until(&mut state, origin + next_wake);
    }
    debug!("scheduler thread exiting");
}

/// One scheduler step at time `now` since the session started
///
/// # Returns
/// When to tick next, or `None` once the session is over.
fn tick(state: &mut EngineState, graph: &SharedGraph, now: Duration) -> Option<Duration> {
    if !state.playing {
        return None;
    }

    let mut graph = graph.lock();
    if let Some(fault) = graph.take_fault() {
        error!(%fault, "stopping playback after audio fault");
        graph.pool_mut().stop_all();
        state.error = Some(fault);
        state.playing = false;
        return None;
    }

    let buffer = match &state.buffer {
        Some(buffer) => Arc::clone(buffer),
        None => {
            state.playing = false;
            return None;
        }
    };

    let interval_secs = state.params.grain_interval_secs();
    let tick = state.scheduler.tick(now, interval_duration(interval_secs));
    if tick.emit {
        let duration = buffer.duration_secs();
        let start = state.position.clamp(0.0, duration);
        let handle = graph.pool_mut().play_grain(
            &buffer,
            start,
            state.params.grain_duration_secs(),
            state.rate,
            state.params.overlap_compensation(),
            state.params.window_type(),
        );
        state.grains_emitted += 1;

        let delta = interval_secs * state.rate * state.direction.sign();
        state.position = advance_cursor(state.position, delta, duration);
        trace!(id = handle.id(), start, next = state.position, "grain emitted");
    }

    Some(tick.next_wake)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::WindowType;
    use crate::engine::sink::PullSink;
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;

    /// Mono low sine at 8 kHz
    fn test_buffer(seconds: f32) -> AudioBuffer {
        crate::engine::io::generate_test_tone(220.0, seconds, 8000)
    }

    fn engine() -> GranularEngine {
        let mut engine = GranularEngine::new(EngineConfig::default(), PullSink::new(48000)).unwrap();
        engine.initialize().unwrap();
        engine
    }

    fn loaded(seconds: f32) -> GranularEngine {
        let mut engine = engine();
        engine.load_buffer(test_buffer(seconds)).unwrap();
        engine
    }

    #[test]
    fn test_one_second_of_scheduling() {
        let mut engine = loaded(10.0);
        engine.set_granular_params(GranularUpdate {
            grain_size_ms: Some(100.0),
            overlap_percent: Some(50.0),
            window_type: Some(WindowType::Hann),
        });
        engine.set_playback_rate(1.0, 1.0);

        let emitted = engine.simulate_session(Duration::from_secs(1)).unwrap();
        assert!((19..=21).contains(&emitted), "emitted {emitted} grains");
        assert_relative_eq!(engine.get_playback_position(), 1.0, epsilon = 0.06);
        assert_eq!(engine.get_state().active_grain_count as u64, emitted);
    }

    #[test]
    fn test_reverse_playback_wraps_to_end() {
        let mut engine = loaded(10.0);
        engine.set_granular_params(GranularUpdate {
            grain_size_ms: Some(500.0),
            overlap_percent: Some(0.0),
            window_type: None,
        });
        engine.set_playback_rate(1.0, -1.0);
        engine.set_playback_position(0.2);

        // A single tick emits one grain and steps back 0.5 s
        engine.simulate_session(Duration::from_nanos(1)).unwrap();
        assert_relative_eq!(engine.get_playback_position(), 9.7, epsilon = 1e-6);
    }

    #[test]
    fn test_forward_playback_wraps_to_zero() {
        let mut engine = loaded(10.0);
        engine.set_granular_params(GranularUpdate {
            grain_size_ms: Some(500.0),
            overlap_percent: Some(0.0),
            window_type: None,
        });
        engine.set_playback_position(9.5);
        engine.simulate_session(Duration::from_nanos(1)).unwrap();
        assert_eq!(engine.get_playback_position(), 0.0);
    }

    #[test]
    fn test_zero_rate_freezes_cursor() {
        let mut engine = loaded(2.0);
        engine.set_playback_position(1.0);
        engine.set_playback_rate(0.0, 1.0);
        engine.simulate_session(Duration::from_millis(500)).unwrap();
        assert_eq!(engine.get_playback_position(), 1.0);
    }

    #[test]
    fn test_polyphony_cap_during_playback() {
        let mut engine = loaded(10.0);
        engine.set_max_grains(50);
        // 25 ms interval: 60 grains in 1.5 simulated seconds, none rendered
        engine.set_granular_params(GranularUpdate {
            grain_size_ms: Some(500.0),
            overlap_percent: Some(95.0),
            window_type: None,
        });

        let emitted = engine.simulate_session(Duration::from_millis(1500)).unwrap();
        assert_eq!(emitted, 60);
        assert_eq!(engine.get_state().active_grain_count, 50);
    }

    #[test]
    fn test_rate_clamped() {
        let engine = engine();
        engine.set_playback_rate(10.0, 1.0);
        assert_eq!(engine.get_state().rate, 3.0);
        engine.set_playback_rate(-2.0, 0.0);
        let state = engine.get_state();
        assert_eq!(state.rate, 2.0);
        assert_eq!(state.direction, Direction::Forward);
    }

    #[test]
    fn test_overlap_clamped() {
        let engine = engine();
        let params = engine.set_granular_params(GranularUpdate::overlap(150.0));
        assert_eq!(params.overlap_percent(), 95.0);
        assert_eq!(engine.granular_params().overlap_percent(), 95.0);
    }

    #[test]
    fn test_volume_clamped_and_applied() {
        let engine = engine();
        engine.set_volume(1.5);
        assert_eq!(engine.get_state().volume, 1.0);
        engine.set_volume(0.25);
        let snapshot = engine.chain_snapshot().unwrap();
        assert_eq!(snapshot["slots"][2]["params"]["volume"], 0.25);
    }

    #[test]
    fn test_position_clamped() {
        let engine = loaded(2.0);
        engine.set_playback_position(5.0);
        assert_eq!(engine.get_playback_position(), 2.0);
        engine.set_playback_position(-1.0);
        assert_eq!(engine.get_playback_position(), 0.0);
    }

    #[test]
    fn test_start_requires_buffer() {
        let mut engine = engine();
        let before = engine.get_state();
        assert!(!engine.start_playback());
        assert_eq!(engine.get_state(), before);
    }

    #[test]
    fn test_start_twice_fails() {
        let mut engine = loaded(1.0);
        assert!(engine.start_playback());
        assert!(!engine.start_playback());
        engine.stop_playback();
    }

    #[test]
    fn test_start_while_running_returns_promptly() {
        let mut engine = loaded(1.0);
        assert!(engine.start_playback());

        let (tx, rx) = crossbeam_channel::bounded(1);
        let runner = std::thread::spawn(move || {
            let started = engine.start_playback();
            tx.send(started).unwrap();
            engine
        });

        let started = rx
            .recv_timeout(Duration::from_secs(2))
            .expect("second start_playback blocked");
        assert!(!started);

        let mut engine = runner.join().unwrap();
        assert!(engine.is_playback_active());
        assert_eq!(engine.get_state().error, None);
        engine.stop_playback();
        assert!(!engine.is_playback_active());
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut engine = loaded(1.0);
        assert!(engine.start_playback());
        std::thread::sleep(Duration::from_millis(20));

        engine.stop_playback();
        let once = engine.get_state();
        engine.stop_playback();
        let twice = engine.get_state();

        assert_eq!(once, twice);
        assert!(!twice.playing);
        assert_eq!(twice.active_grain_count, 0);
    }

    #[test]
    fn test_restart_after_stop() {
        let mut engine = loaded(1.0);
        assert!(engine.start_playback());
        engine.stop_playback();
        assert!(engine.start_playback());
        assert!(engine.is_playback_active());
        engine.stop_playback();
    }

    #[test]
    fn test_operations_before_initialize() {
        let mut engine =
            GranularEngine::new(EngineConfig::default(), PullSink::new(48000)).unwrap();
        assert!(matches!(
            engine.load_buffer(test_buffer(1.0)),
            Err(GranularError::NotInitialized)
        ));
        assert!(!engine.start_playback());
        assert!(engine.add_output_tap().is_err());
        assert!(!engine.get_state().initialized);
    }

    #[test]
    fn test_initialize_failure_is_remembered() {
        let mut engine = GranularEngine::new(EngineConfig::default(), PullSink::new(0)).unwrap();
        let first = engine.initialize().unwrap_err();
        let second = engine.initialize().unwrap_err();
        assert_eq!(first.error_code(), "UNSUPPORTED_ENVIRONMENT");
        assert_eq!(first.to_string(), second.to_string());
    }

    #[test]
    fn test_failed_load_keeps_previous_buffer() {
        let mut engine = loaded(2.0);
        engine.set_playback_position(1.5);

        let err = engine
            .load_file(Path::new("/nonexistent/missing.wav"))
            .unwrap_err();
        assert!(err.is_recoverable());

        let state = engine.get_state();
        assert!(state.has_buffer);
        assert_relative_eq!(state.duration_secs, 2.0);
        assert_eq!(state.position_secs, 1.5);
    }

    #[test]
    fn test_load_rejects_multichannel_buffer() {
        let mut engine = engine();
        let buffer = AudioBuffer {
            samples: vec![vec![0.0; 100]; 4],
            sample_rate: 48000,
        };
        assert!(matches!(
            engine.load_buffer(buffer),
            Err(GranularError::DecodeError { .. })
        ));
        assert!(!engine.is_audio_buffer_loaded());
    }

    #[test]
    fn test_load_resets_cursor() {
        let mut engine = loaded(2.0);
        engine.set_playback_position(1.0);
        engine.load_buffer(test_buffer(3.0)).unwrap();
        assert_eq!(engine.get_playback_position(), 0.0);
        assert_relative_eq!(engine.get_state().duration_secs, 3.0);
    }

    #[test]
    fn test_sink_fault_stops_playback() {
        let mut engine = loaded(2.0);
        assert_eq!(engine.simulate_session(Duration::from_nanos(1)), Some(1));
        engine
            .graph
            .as_ref()
            .unwrap()
            .lock()
            .report_fault("device unplugged");

        let emitted = engine.run_ticks(Duration::from_millis(1), Duration::from_secs(1));
        assert_eq!(emitted, 0);

        let state = engine.get_state();
        assert!(!state.playing);
        assert_eq!(state.active_grain_count, 0);
        assert_eq!(state.error.as_deref(), Some("device unplugged"));
    }

    #[test]
    fn test_dispose_returns_to_uninitialized() {
        let mut engine = loaded(1.0);
        assert!(engine.start_playback());
        engine.dispose();

        let state = engine.get_state();
        assert!(!state.initialized);
        assert!(!state.playing);
        assert!(!state.has_buffer);
        assert!(engine.chain_snapshot().is_err());

        engine.initialize().unwrap();
        assert!(engine.get_state().initialized);
    }

    #[test]
    fn test_max_grains_clamped() {
        let mut engine = engine();
        engine.set_max_grains(500);
        assert_eq!(engine.config().max_grains, MAX_GRAINS_LIMIT);
        engine.set_max_grains(0);
        assert_eq!(engine.config().max_grains, 1);
    }

    #[test]
    fn test_state_serializes_to_json() {
        let engine = loaded(1.0);
        let json = serde_json::to_value(engine.get_state()).unwrap();
        assert_eq!(json["has_buffer"], true);
        assert_eq!(json["direction"], 1);
        assert_eq!(json["params"]["window_type"], "hann");
    }
}
