//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use std::path::Path;

use serde_json::json;
use tracing::info;

use crate::cli::PlayArgs;
use crate::dsp::{envelope, FilterConfig, FilterSettings};
use crate::engine::buffer::linear_to_db;
use crate::engine::io::import_audio;
use crate::engine::GranularUpdate;
use crate::error::Result;

/// Print basic facts about an audio file as JSON.
pub fn info(path: &Path) -> Result<()> {
    info!("Inspecting: {}", path.display());

    let buffer = import_audio(path)?;
    let summary = json!({
        "path": path.display().to_string(),
        "duration_secs": buffer.duration_secs(),
        "channels": buffer.channels(),
        "sample_rate": buffer.sample_rate,
        "frames": buffer.len(),
        "peak_db": linear_to_db(buffer.peak()),
    });

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

/// Print the coefficients of a grain envelope as a JSON array.
pub fn window(window_type: &str, length: usize) -> Result<()> {
    let coefficients = envelope::generate_named(window_type, length)?;
    println!("{}", serde_json::to_string(&coefficients)?);
    Ok(())
}

/// Partial parameter update built from the command line
pub fn granular_update(args: &PlayArgs) -> GranularUpdate {
    GranularUpdate {
        grain_size_ms: args.grain_size,
        overlap_percent: args.overlap,
        window_type: args.window,
    }
}

/// Filter configuration built from the command line
///
/// A cutoff given on the command line enables that filter.
pub fn filter_config(args: &PlayArgs) -> FilterConfig {
    let enable_at = |frequency_hz: f64| FilterSettings {
        enabled: Some(true),
        frequency_hz: Some(frequency_hz),
        q: None,
    };

    FilterConfig {
        highpass: args.highpass.map(enable_at),
        lowpass: args.lowpass.map(enable_at),
        bypass: None,
    }
}

/// Play a file through the default output device.
#[cfg(feature = "cpal")]
pub fn play(args: &PlayArgs) -> Result<()> {
    use std::time::{Duration, Instant};

    use crate::config::EngineConfig;
    use crate::engine::io::WavCapture;
    use crate::engine::sink::CpalSink;
    use crate::engine::GranularEngine;
    use crate::error::GranularError;

    let config = match &args.config {
        Some(path) => EngineConfig::from_json_file(path)?,
        None => EngineConfig::default(),
    };

    let mut engine = GranularEngine::new(config, CpalSink::new())?;
    engine.initialize()?;
    engine.load_file(&args.file)?;
    engine.set_granular_params(granular_update(args));
    engine.set_playback_rate(args.rate, args.direction);
    engine.set_volume(args.volume);
    engine.set_audio_filters(&filter_config(args))?;

    let mut capture = match &args.capture {
        Some(path) => {
            let sample_rate = engine.sample_rate().ok_or(GranularError::NotInitialized)?;
            let tap = engine.add_output_tap()?;
            let writer = WavCapture::create(path, 2, sample_rate)?;
            info!("Capturing output to: {}", path.display());
            Some((tap, writer))
        }
        None => None,
    };

    if !engine.start_playback() {
        return Err(GranularError::SinkError {
            reason: "playback did not start".to_string(),
        });
    }
    println!("Playing {} for {:.1}s", args.file.display(), args.seconds);

    let deadline = Instant::now() + Duration::from_secs_f64(args.seconds.max(0.0));
    let mut last_report = Instant::now();
    while Instant::now() < deadline && engine.is_playback_active() {
        match &mut capture {
            Some((tap, writer)) => {
                if let Ok(block) = tap.recv_timeout(Duration::from_millis(100)) {
                    writer.write_interleaved(&block)?;
                }
            }
            None => std::thread::sleep(Duration::from_millis(100)),
        }

        if last_report.elapsed() >= Duration::from_secs(1) {
            let state = engine.get_state();
            info!(
                position_secs = state.position_secs,
                active_grains = state.active_grain_count,
                "playing"
            );
            last_report = Instant::now();
        }
    }

    engine.stop_playback();
    let state = engine.get_state();

    if let Some((tap, mut writer)) = capture {
        for block in tap.try_iter() {
            writer.write_interleaved(&block)?;
        }
        println!("Captured {} frames", writer.frames_written());
        writer.finalize()?;
    }

    engine.dispose();
    println!("{}", serde_json::to_string_pretty(&state)?);

    match state.error {
        Some(reason) => Err(GranularError::SinkError { reason }),
        None => Ok(()),
    }
}

/// Play a file through the default output device.
#[cfg(not(feature = "cpal"))]
pub fn play(_args: &PlayArgs) -> Result<()> {
    Err(crate::error::GranularError::UnsupportedEnvironment {
        reason: "granular-cli was built without the `cpal` feature".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    fn play_args(extra: &[&str]) -> PlayArgs {
        let mut argv = vec!["granular-cli", "play", "loop.wav"];
        argv.extend_from_slice(extra);
        match Cli::parse_from(argv).command {
            Some(crate::cli::Commands::Play(args)) => args,
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_play_args_defaults() {
        let args = play_args(&[]);
        assert_eq!(args.seconds, 10.0);
        assert_eq!(granular_update(&args), GranularUpdate::default());
        assert_eq!(filter_config(&args), FilterConfig::default());
    }

    #[test]
    fn test_play_args_reverse_and_window() {
        let args = play_args(&["--direction", "-1", "--window", "triangular", "--overlap", "80"]);
        assert_eq!(args.direction, -1.0);
        let update = granular_update(&args);
        assert_eq!(update.window_type, Some(crate::dsp::WindowType::Triangular));
        assert_eq!(update.overlap_percent, Some(80.0));
    }

    #[test]
    fn test_cutoff_enables_filter() {
        let args = play_args(&["--lowpass", "2000"]);
        let config = filter_config(&args);
        assert!(config.highpass.is_none());
        let lowpass = config.lowpass.unwrap();
        assert_eq!(lowpass.enabled, Some(true));
        assert_eq!(lowpass.frequency_hz, Some(2000.0));
    }

    #[test]
    fn test_window_command_rejects_unknown_type() {
        let err = window("gaussian", 16).unwrap_err();
        assert_eq!(err.error_code(), "UNKNOWN_WINDOW_TYPE");
        assert!(window("hann", 16).is_ok());
    }
}
