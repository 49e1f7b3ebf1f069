//! Error handling for the granular engine
//!
//! Every failure the engine can report is a variant of [`GranularError`].
//! Parameter setters clamp instead of failing, so most of these only
//! surface from `initialize`, `load_file` and configuration loading.

use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, GranularError>;

/// Main error type for engine operations
#[derive(Error, Debug)]
pub enum GranularError {
    // Environment Errors
    #[error("Audio output unavailable: {reason}")]
    UnsupportedEnvironment { reason: String },

    #[error("Engine is not initialized")]
    NotInitialized,

    #[error("Audio sink error: {reason}")]
    SinkError { reason: String },

    // File Errors
    #[error("File not found: {path}")]
    FileNotFound {
        path: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Could not decode audio: {reason}")]
    DecodeError {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    // Parameter Errors
    #[error("Unknown window type: {name}")]
    UnknownWindowType { name: String },

    #[error("{name} out of range: {value} (expected {min}..={max})")]
    InvalidParameterRange {
        name: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    // I/O Errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl GranularError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            GranularError::UnsupportedEnvironment { .. } => "UNSUPPORTED_ENVIRONMENT",
            GranularError::NotInitialized => "NOT_INITIALIZED",
            GranularError::SinkError { .. } => "SINK_ERROR",
            GranularError::FileNotFound { .. } => "FILE_NOT_FOUND",
            GranularError::DecodeError { .. } => "DECODE_ERROR",
            GranularError::UnknownWindowType { .. } => "UNKNOWN_WINDOW_TYPE",
            GranularError::InvalidParameterRange { .. } => "INVALID_PARAMETER_RANGE",
            GranularError::InvalidConfig { .. } => "INVALID_CONFIG",
            GranularError::Io(_) => "IO_ERROR",
            GranularError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Check if this error is recoverable
    ///
    /// Recoverable errors leave the engine fully usable: a failed load keeps
    /// the previous buffer, a rejected parameter keeps the previous value.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            GranularError::FileNotFound { .. }
                | GranularError::DecodeError { .. }
                | GranularError::UnknownWindowType { .. }
                | GranularError::InvalidParameterRange { .. }
                | GranularError::InvalidConfig { .. }
                | GranularError::NotInitialized
        )
    }

    pub(crate) fn decode(reason: impl Into<String>, source: hound::Error) -> Self {
        GranularError::DecodeError {
            reason: reason.into(),
            source: Some(Box::new(source)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = GranularError::FileNotFound {
            path: "test.wav".to_string(),
            source: None,
        };
        assert_eq!(err.error_code(), "FILE_NOT_FOUND");
        assert_eq!(
            GranularError::UnsupportedEnvironment {
                reason: "no device".into()
            }
            .error_code(),
            "UNSUPPORTED_ENVIRONMENT"
        );
    }

    #[test]
    fn test_recoverability() {
        let load = GranularError::DecodeError {
            reason: "truncated".into(),
            source: None,
        };
        assert!(load.is_recoverable());

        let env = GranularError::UnsupportedEnvironment {
            reason: "no device".into(),
        };
        assert!(!env.is_recoverable());
    }

    #[test]
    fn test_range_message() {
        let err = GranularError::InvalidParameterRange {
            name: "grain_size_ms",
            value: 600.0,
            min: 10.0,
            max: 500.0,
        };
        assert_eq!(
            err.to_string(),
            "grain_size_ms out of range: 600 (expected 10..=500)"
        );
    }
}
