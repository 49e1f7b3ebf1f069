//! Integration Tests
//!
//! End-to-end tests for the granular engine: file loading, the scheduler
//! thread, the render graph and the output tap, driven through a pull sink.

use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use granular::dsp::envelope;
use granular::engine::buffer::calculate_rms;
use granular::engine::io::{generate_test_tone, write_wav};
use granular::{
    EngineConfig, FilterConfig, FilterSettings, GranularEngine, GranularError, GranularUpdate,
    PullHandle, PullSink, WindowType,
};

/// Engine initialized on a 48 kHz pull sink
fn pull_engine(config: EngineConfig) -> (GranularEngine, PullHandle) {
    let sink = PullSink::new(48000);
    let handle = sink.handle();
    let mut engine = GranularEngine::new(config, sink).unwrap();
    engine.initialize().unwrap();
    (engine, handle)
}

/// Write a mono sine WAV and return its path inside `dir`
fn write_tone(dir: &Path, seconds: f32) -> std::path::PathBuf {
    let path = dir.join("tone.wav");
    write_wav(&generate_test_tone(440.0, seconds, 48000), &path).unwrap();
    path
}

/// Wait until the scheduler has emitted at least `count` grains
fn wait_for_grains(engine: &GranularEngine, count: u64) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while engine.get_state().grains_emitted < count {
        assert!(Instant::now() < deadline, "scheduler emitted no grains");
        thread::sleep(Duration::from_millis(2));
    }
}

// === Loading ===

#[test]
fn test_load_file_and_report_state() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_tone(dir.path(), 2.0);
    let (mut engine, _) = pull_engine(EngineConfig::default());

    engine.load_file(&path).unwrap();

    let state = engine.get_state();
    assert!(state.initialized);
    assert!(state.has_buffer);
    assert!(!state.playing);
    assert!((state.duration_secs - 2.0).abs() < 1e-6);
    assert_eq!(state.position_secs, 0.0);
}

#[test]
fn test_load_missing_file() {
    let (mut engine, _) = pull_engine(EngineConfig::default());
    let err = engine.load_file(Path::new("/nonexistent/tone.wav")).unwrap_err();
    assert_eq!(err.error_code(), "FILE_NOT_FOUND");
    assert!(!engine.is_audio_buffer_loaded());
}

#[test]
fn test_load_garbage_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("garbage.wav");
    std::fs::write(&path, b"definitely not a wav file").unwrap();

    let (mut engine, _) = pull_engine(EngineConfig::default());
    let err = engine.load_file(&path).unwrap_err();
    assert!(matches!(err, GranularError::DecodeError { .. }));
}

// === Playback ===

#[test]
fn test_playback_produces_audio() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_tone(dir.path(), 2.0);
    let (mut engine, handle) = pull_engine(EngineConfig::default());
    engine.load_file(&path).unwrap();

    assert!(engine.start_playback());
    wait_for_grains(&engine, 1);

    let block = handle.render(4800).unwrap();
    assert!(block.peak() > 0.1);
    assert!(block.is_finite());
    assert_eq!(block.channel(0), block.channel(1));

    engine.stop_playback();
    assert!(!engine.is_playback_active());
}

#[test]
fn test_stop_silences_immediately() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_tone(dir.path(), 2.0);
    let (mut engine, handle) = pull_engine(EngineConfig::default());
    engine.load_file(&path).unwrap();

    assert!(engine.start_playback());
    wait_for_grains(&engine, 3);
    engine.stop_playback();

    assert_eq!(engine.get_state().active_grain_count, 0);
    assert_eq!(handle.render(4800).unwrap().peak(), 0.0);
}

#[test]
fn test_cursor_advances_while_playing() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_tone(dir.path(), 5.0);
    let (mut engine, _) = pull_engine(EngineConfig::default());
    engine.load_file(&path).unwrap();
    engine.set_playback_position(1.0);

    assert!(engine.start_playback());
    wait_for_grains(&engine, 4);
    engine.stop_playback();

    // Each grain moves the cursor one interval (50 ms) forward
    let state = engine.get_state();
    let expected = 1.0 + state.grains_emitted as f64 * 0.05;
    assert!((state.position_secs - expected).abs() < 1e-6);
}

#[test]
fn test_reverse_playback_moves_cursor_backwards() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_tone(dir.path(), 5.0);
    let (mut engine, _) = pull_engine(EngineConfig::default());
    engine.load_file(&path).unwrap();
    engine.set_playback_position(3.0);
    engine.set_playback_rate(2.0, -1.0);

    assert!(engine.start_playback());
    wait_for_grains(&engine, 2);
    engine.stop_playback();

    assert!(engine.get_playback_position() < 3.0);
}

#[test]
fn test_parameter_changes_during_playback() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_tone(dir.path(), 2.0);
    let (mut engine, handle) = pull_engine(EngineConfig::default());
    engine.load_file(&path).unwrap();
    assert!(engine.start_playback());

    for i in 0..20 {
        engine.set_playback_rate(i as f64 * 0.2, if i % 2 == 0 { 1.0 } else { -1.0 });
        engine.set_volume(i as f32 / 20.0);
        engine.set_granular_params(GranularUpdate::grain_size(10.0 + i as f64 * 20.0));
        handle.render(256).unwrap();
    }

    let state = engine.get_state();
    assert!(state.playing);
    assert!(state.position_secs >= 0.0 && state.position_secs <= state.duration_secs);
    assert!(state.rate <= 3.0);
    engine.stop_playback();
}

// === Processing chain and tap ===

#[test]
fn test_output_tap_matches_rendered_audio() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_tone(dir.path(), 2.0);
    let (mut engine, handle) = pull_engine(EngineConfig::default());
    engine.load_file(&path).unwrap();
    let tap = engine.add_output_tap().unwrap();

    assert!(engine.start_playback());
    wait_for_grains(&engine, 1);
    let block = handle.render(512).unwrap();
    engine.stop_playback();

    let tapped = tap.try_recv().unwrap();
    assert_eq!(tapped, block.to_interleaved());
}

#[test]
fn test_lowpass_darkens_output() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bright.wav");
    write_wav(&generate_test_tone(8000.0, 2.0, 48000), &path).unwrap();

    let render_rms = |filters: Option<FilterConfig>| {
        let (mut engine, handle) = pull_engine(EngineConfig::default());
        engine.load_file(&path).unwrap();
        if let Some(filters) = filters {
            engine.set_audio_filters(&filters).unwrap();
        }
        assert!(engine.start_playback());
        wait_for_grains(&engine, 1);
        let block = handle.render(4800).unwrap();
        engine.stop_playback();
        calculate_rms(block.channel(0))
    };

    let open = render_rms(None);
    let filtered = render_rms(Some(FilterConfig {
        lowpass: Some(FilterSettings {
            enabled: Some(true),
            frequency_hz: Some(500.0),
            q: None,
        }),
        ..Default::default()
    }));
    assert!(filtered < open - 20.0, "open {open} dB, filtered {filtered} dB");
}

#[test]
fn test_chain_snapshot_reflects_filters() {
    let (engine, _) = pull_engine(EngineConfig::default());
    let config: FilterConfig = serde_json::from_str(
        r#"{"highpass": {"enabled": true, "frequency_hz": 200, "q": 2.0}, "bypass": false}"#,
    )
    .unwrap();
    engine.set_audio_filters(&config).unwrap();

    let snapshot = engine.chain_snapshot().unwrap();
    assert_eq!(snapshot["path"], serde_json::json!(["high_pass", "master_gain"]));
    assert_eq!(snapshot["slots"][0]["params"]["q"], 2.0);
}

// === Lifecycle ===

#[test]
fn test_dispose_releases_sink() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_tone(dir.path(), 1.0);
    let (mut engine, handle) = pull_engine(EngineConfig::default());
    engine.load_file(&path).unwrap();
    assert!(engine.start_playback());

    engine.dispose();
    assert!(!engine.get_state().initialized);
    assert!(matches!(
        handle.render(64),
        Err(GranularError::NotInitialized)
    ));
}

#[test]
fn test_config_applies_initial_parameters() {
    let config = EngineConfig {
        grain_size_ms: 40.0,
        overlap_percent: 75.0,
        window_type: WindowType::Triangular,
        volume: 0.5,
        ..Default::default()
    };
    let (engine, _) = pull_engine(config);

    let state = engine.get_state();
    assert_eq!(state.params.grain_size_ms(), 40.0);
    assert_eq!(state.params.window_type(), WindowType::Triangular);
    assert_eq!(state.volume, 0.5);
}

#[test]
fn test_invalid_config_rejected() {
    let config = EngineConfig {
        overlap_percent: 99.0,
        ..Default::default()
    };
    let result = GranularEngine::new(config, PullSink::new(48000));
    assert!(matches!(
        result,
        Err(GranularError::InvalidParameterRange { .. })
    ));
}

// === Envelope library ===

#[test]
fn test_envelopes_stay_normalized() {
    for window in WindowType::ALL {
        for length in [0, 1, 2, 3, 64, 4801] {
            let curve = envelope::generate(window, length);
            assert_eq!(curve.len(), length);
            assert!(curve.iter().all(|&v| (0.0..=1.0).contains(&v)));
        }
    }
}
