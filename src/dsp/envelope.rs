//! Grain envelope (window) library
//!
//! Pure functions producing normalized amplitude curves. Every window
//! shares the same signature, so selection is a lookup into a table of
//! shape functions indexed by [`WindowType`].

use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{GranularError, Result};

/// Amplitude envelope shape applied to each grain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowType {
    /// Raised cosine, zero at both ends
    #[default]
    Hann = 0,
    /// Raised cosine on a 0.08 pedestal
    Hamming = 1,
    /// Linear rise to the midpoint, linear fall
    Triangular = 2,
    /// Constant 1.0. Clicks audibly at grain boundaries; meant for debugging.
    Rectangular = 3,
}

impl WindowType {
    /// All supported window types
    pub const ALL: [WindowType; 4] = [
        WindowType::Hann,
        WindowType::Hamming,
        WindowType::Triangular,
        WindowType::Rectangular,
    ];

    /// Stable lowercase name (matches the serde representation)
    pub fn as_str(&self) -> &'static str {
        match self {
            WindowType::Hann => "hann",
            WindowType::Hamming => "hamming",
            WindowType::Triangular => "triangular",
            WindowType::Rectangular => "rectangular",
        }
    }

    /// Evaluate the window at a normalized position `phase` in `[0, 1]`
    #[inline]
    pub fn value_at(&self, phase: f64) -> f32 {
        let shape = WINDOW_SHAPES[*self as usize];
        shape(phase.clamp(0.0, 1.0)).clamp(0.0, 1.0) as f32
    }
}

impl fmt::Display for WindowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WindowType {
    type Err = GranularError;

    fn from_str(s: &str) -> Result<Self> {
        WindowType::ALL
            .into_iter()
            .find(|w| w.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| GranularError::UnknownWindowType {
                name: s.to_string(),
            })
    }
}

// ============================================================================
// Shape table
// ============================================================================

/// Window shape over a normalized phase `i / (N - 1)`
type WindowShape = fn(f64) -> f64;

/// Indexed by `WindowType as usize`
const WINDOW_SHAPES: [WindowShape; 4] = [hann, hamming, triangular, rectangular];

fn hann(phase: f64) -> f64 {
    0.5 * (1.0 - (2.0 * PI * phase).cos())
}

fn hamming(phase: f64) -> f64 {
    0.54 - 0.46 * (2.0 * PI * phase).cos()
}

fn triangular(phase: f64) -> f64 {
    1.0 - (2.0 * phase - 1.0).abs()
}

fn rectangular(_phase: f64) -> f64 {
    1.0
}

// ============================================================================
// Generation
// ============================================================================

/// Generate `length` amplitude coefficients for the given window
///
/// # Arguments
/// * `window` - Window shape
/// * `length` - Number of coefficients
///
/// # Returns
/// Exactly `length` values in `[0, 1]`. A length of 0 yields an empty
/// vector and a length of 1 yields `[1.0]`, since the `N - 1` denominator
/// is undefined there.
pub fn generate(window: WindowType, length: usize) -> Vec<f32> {
    match length {
        0 => Vec::new(),
        1 => vec![1.0],
        _ => {
            let denom = (length - 1) as f64;
            (0..length)
                .map(|i| window.value_at(i as f64 / denom))
                .collect()
        }
    }
}

/// Generate a window selected by name
///
/// # Errors
/// * `UnknownWindowType` - If `name` is not one of the supported windows
pub fn generate_named(name: &str, length: usize) -> Result<Vec<f32>> {
    let window: WindowType = name.parse()?;
    Ok(generate(window, length))
}
