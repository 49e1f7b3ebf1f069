//! Engine configuration
//!
//! Everything fixed for the lifetime of an engine instance, plus the
//! initial values of the live parameters. Loaded from JSON; any field left
//! out takes its default.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::dsp::WindowType;
use crate::engine::params::{
    check_range, GranularParameters, MAX_GRAIN_SIZE_MS, MAX_OVERLAP_PERCENT, MIN_GRAIN_SIZE_MS,
    MIN_OVERLAP_PERCENT,
};
use crate::error::{GranularError, Result};
use crate::grain::{DEFAULT_MAX_GRAINS, MAX_GRAINS_LIMIT};

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Polyphony cap (1-100)
    pub max_grains: usize,
    /// Time constant for volume and cutoff smoothing (1-500 ms)
    pub smoothing_time_ms: f64,
    /// Frames rendered per block when the host does not dictate one
    pub block_size: usize,
    /// Blocks buffered per output tap before new blocks are dropped
    pub tap_capacity: usize,
    /// Initial grain size (10-500 ms)
    pub grain_size_ms: f64,
    /// Initial overlap (0-95 %)
    pub overlap_percent: f64,
    /// Initial window shape
    pub window_type: WindowType,
    /// Initial master volume (0-1)
    pub volume: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_grains: DEFAULT_MAX_GRAINS,
            smoothing_time_ms: 20.0,
            block_size: 512,
            tap_capacity: 64,
            grain_size_ms: 100.0,
            overlap_percent: 50.0,
            window_type: WindowType::Hann,
            volume: 1.0,
        }
    }
}

impl EngineConfig {
    /// Load and validate a JSON configuration file
    ///
    /// # Errors
    /// * `FileNotFound` - If the file does not exist
    /// * `Serialization` - If the file is not valid JSON for this type
    /// * `InvalidParameterRange` / `InvalidConfig` - If validation fails
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                GranularError::FileNotFound {
                    path: path.display().to_string(),
                    source: Some(e),
                }
            } else {
                GranularError::Io(e)
            }
        })?;

        let config: EngineConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate every field against its range
    pub fn validate(&self) -> Result<()> {
        check_range(
            "max_grains",
            self.max_grains as f64,
            1.0,
            MAX_GRAINS_LIMIT as f64,
        )?;
        check_range("smoothing_time_ms", self.smoothing_time_ms, 1.0, 500.0)?;
        check_range(
            "grain_size_ms",
            self.grain_size_ms,
            MIN_GRAIN_SIZE_MS,
            MAX_GRAIN_SIZE_MS,
        )?;
        check_range(
            "overlap_percent",
            self.overlap_percent,
            MIN_OVERLAP_PERCENT,
            MAX_OVERLAP_PERCENT,
        )?;
        check_range("volume", self.volume as f64, 0.0, 1.0)?;

        if self.block_size == 0 {
            return Err(GranularError::InvalidConfig {
                reason: "block_size must be at least 1".to_string(),
            });
        }
        if self.tap_capacity == 0 {
            return Err(GranularError::InvalidConfig {
                reason: "tap_capacity must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Smoothing time constant in seconds
    pub fn smoothing_secs(&self) -> f64 {
        self.smoothing_time_ms / 1000.0
    }

    /// Initial granular parameters
    pub fn initial_params(&self) -> Result<GranularParameters> {
        GranularParameters::new(self.grain_size_ms, self.overlap_percent, self.window_type)
    }
}
