//! Pipeline error types.

use thiserror::Error;

use vigil_detector::DetectError;
use vigil_media::MediaError;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The submitted frame could not be decoded. Nothing else ran.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// No admission slot freed up in time. No detector ran.
    #[error("Overloaded: no inference slot available after {waited_ms} ms")]
    Overloaded { waited_ms: u64 },

    /// The annotated frame could not be encoded.
    #[error("Encoding failed: {0}")]
    Encode(String),

    #[error("Detector setup failed: {0}")]
    Detector(#[from] DetectError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl PipelineError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Whether the caller may retry the same frame later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PipelineError::Overloaded { .. })
    }
}

impl From<MediaError> for PipelineError {
    fn from(err: MediaError) -> Self {
        if err.is_invalid_input() {
            PipelineError::InvalidInput(err.to_string())
        } else {
            PipelineError::Encode(err.to_string())
        }
    }
}

/// Startup configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var}: {message}")]
    Invalid { var: String, message: String },

    #[error("{var}: threshold {value} is outside [0, 1]")]
    ThresholdOutOfRange { var: String, value: f32 },

    #[error("No detector models configured")]
    NoDetectors,
}

impl ConfigError {
    pub fn invalid(var: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            var: var.into(),
            message: message.into(),
        }
    }
}
