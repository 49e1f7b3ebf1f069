//! Granular parameter and playback state value types
//!
//! Both types are immutable snapshots: a parameter change produces a new
//! [`GranularParameters`], and every state query produces a fresh
//! [`PlaybackState`].

use serde::{Deserialize, Serialize};

use crate::dsp::WindowType;
use crate::error::{GranularError, Result};

// ============================================================================
// Ranges
// ============================================================================

/// Smallest grain, in milliseconds
pub const MIN_GRAIN_SIZE_MS: f64 = 10.0;
/// Largest grain, in milliseconds
pub const MAX_GRAIN_SIZE_MS: f64 = 500.0;
/// Smallest overlap, in percent
pub const MIN_OVERLAP_PERCENT: f64 = 0.0;
/// Largest overlap, in percent
pub const MAX_OVERLAP_PERCENT: f64 = 95.0;
/// Fastest cursor speed multiplier
pub const MAX_PLAYBACK_RATE: f64 = 3.0;

// ============================================================================
// Granular Parameters
// ============================================================================

/// Grain size, overlap and window shape
///
/// Fields are private so the ranges always hold: [`GranularParameters::new`]
/// rejects out-of-range values, [`GranularParameters::with`] clamps them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GranularParameters {
    grain_size_ms: f64,
    overlap_percent: f64,
    window_type: WindowType,
}

/// Partial update merged by [`GranularParameters::with`]
///
/// Absent fields keep their current value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GranularUpdate {
    pub grain_size_ms: Option<f64>,
    pub overlap_percent: Option<f64>,
    pub window_type: Option<WindowType>,
}

impl GranularUpdate {
    pub fn grain_size(ms: f64) -> Self {
        Self {
            grain_size_ms: Some(ms),
            ..Self::default()
        }
    }

    pub fn overlap(percent: f64) -> Self {
        Self {
            overlap_percent: Some(percent),
            ..Self::default()
        }
    }

    pub fn window(window_type: WindowType) -> Self {
        Self {
            window_type: Some(window_type),
            ..Self::default()
        }
    }
}

impl GranularParameters {
    /// Create validated parameters
    ///
    /// # Errors
    /// * `InvalidParameterRange` - If grain size is outside `[10, 500]` ms or
    ///   overlap is outside `[0, 95]` percent
    pub fn new(grain_size_ms: f64, overlap_percent: f64, window_type: WindowType) -> Result<Self> {
        check_range(
            "grain_size_ms",
            grain_size_ms,
            MIN_GRAIN_SIZE_MS,
            MAX_GRAIN_SIZE_MS,
        )?;
        check_range(
            "overlap_percent",
            overlap_percent,
            MIN_OVERLAP_PERCENT,
            MAX_OVERLAP_PERCENT,
        )?;

        Ok(Self {
            grain_size_ms,
            overlap_percent,
            window_type,
        })
    }

    /// Merge a partial update, clamping each field independently
    ///
    /// Non-finite values are ignored and keep the current field.
    pub fn with(&self, update: GranularUpdate) -> Self {
        let mut next = *self;
        if let Some(ms) = update.grain_size_ms.filter(|v| v.is_finite()) {
            next.grain_size_ms = ms.clamp(MIN_GRAIN_SIZE_MS, MAX_GRAIN_SIZE_MS);
        }
        if let Some(pct) = update.overlap_percent.filter(|v| v.is_finite()) {
            next.overlap_percent = pct.clamp(MIN_OVERLAP_PERCENT, MAX_OVERLAP_PERCENT);
        }
        if let Some(window) = update.window_type {
            next.window_type = window;
        }
        next
    }

    pub fn grain_size_ms(&self) -> f64 {
        self.grain_size_ms
    }

    pub fn overlap_percent(&self) -> f64 {
        self.overlap_percent
    }

    pub fn window_type(&self) -> WindowType {
        self.window_type
    }

    /// Grain length in seconds
    pub fn grain_duration_secs(&self) -> f64 {
        self.grain_size_ms / 1000.0
    }

    /// Time between consecutive grain onsets, always positive
    ///
    /// `grain_size_ms / 1000 * (1 - overlap_percent / 100)`
    pub fn grain_interval_secs(&self) -> f64 {
        self.grain_duration_secs() * (1.0 - self.overlap_percent / 100.0)
    }

    /// Per-grain gain that keeps dense clouds near unity level
    pub fn overlap_compensation(&self) -> f32 {
        (2.0 * (1.0 - self.overlap_percent / 100.0)).min(1.0) as f32
    }
}

impl Default for GranularParameters {
    fn default() -> Self {
        Self {
            grain_size_ms: 100.0,
            overlap_percent: 50.0,
            window_type: WindowType::Hann,
        }
    }
}

impl<'de> Deserialize<'de> for GranularParameters {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            grain_size_ms: f64,
            overlap_percent: f64,
            #[serde(default)]
            window_type: WindowType,
        }

        let raw = Raw::deserialize(deserializer)?;
        GranularParameters::new(raw.grain_size_ms, raw.overlap_percent, raw.window_type)
            .map_err(serde::de::Error::custom)
    }
}

pub(crate) fn check_range(name: &'static str, value: f64, min: f64, max: f64) -> Result<()> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(GranularError::InvalidParameterRange {
            name,
            value,
            min,
            max,
        })
    }
}

// ============================================================================
// Direction
// ============================================================================

/// Cursor travel direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Forward,
    Reverse,
}

impl Direction {
    /// Normalize any number: negative values are reverse, everything else
    /// (zero and NaN included) is forward
    pub fn from_value(value: f64) -> Self {
        if value < 0.0 {
            Direction::Reverse
        } else {
            Direction::Forward
        }
    }

    /// `+1.0` or `-1.0`
    pub fn sign(&self) -> f64 {
        match self {
            Direction::Forward => 1.0,
            Direction::Reverse => -1.0,
        }
    }
}

impl Serialize for Direction {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_i8(self.sign() as i8)
    }
}

// ============================================================================
// Playback State
// ============================================================================

/// Snapshot of the engine, produced fresh on every query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaybackState {
    pub initialized: bool,
    pub playing: bool,
    pub has_buffer: bool,
    /// Cursor position, within `[0, duration_secs]`
    pub position_secs: f64,
    pub duration_secs: f64,
    /// Cursor speed magnitude, within `[0, 3]`
    pub rate: f64,
    pub direction: Direction,
    /// Master volume, within `[0, 1]`
    pub volume: f32,
    pub active_grain_count: usize,
    pub grains_emitted: u64,
    pub params: GranularParameters,
    /// Scheduler or sink fault that stopped playback, if any
    pub error: Option<String>,
}
