//! Error types for frame operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for frame operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur while decoding, annotating or encoding a frame.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Invalid data URI: {0}")]
    InvalidDataUri(String),

    #[error("Invalid base64 payload: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    #[error("Could not decode frame: {0}")]
    Decode(String),

    #[error("Frame is empty")]
    EmptyFrame,

    #[error("Could not encode frame: {0}")]
    Encode(String),

    #[error("Font not found: {0}")]
    FontNotFound(PathBuf),

    #[error("Invalid font: {0}")]
    InvalidFont(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MediaError {
    /// Create a decode error.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }

    /// Create an encode error.
    pub fn encode(message: impl Into<String>) -> Self {
        Self::Encode(message.into())
    }

    /// True for errors caused by the submitted payload rather than the server.
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            MediaError::InvalidDataUri(_)
                | MediaError::InvalidBase64(_)
                | MediaError::Decode(_)
                | MediaError::EmptyFrame
        )
    }
}
