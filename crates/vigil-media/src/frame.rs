//! Decoded frames.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::RgbImage;
use tracing::debug;

use crate::encode::{encode_jpeg, DEFAULT_JPEG_QUALITY};
use crate::error::{MediaError, MediaResult};

/// A submitted frame.
///
/// Holds both the decoded pixels and the compressed bytes it arrived as, so
/// detectors that want the original encoding do not pay for a re-encode. The
/// capture is shared and never mutated; annotation works on a copy.
#[derive(Debug, Clone)]
pub struct Frame {
    image: Arc<RgbImage>,
    encoded: Arc<[u8]>,
}

impl Frame {
    /// Decode a compressed image (JPEG, PNG).
    pub fn from_bytes(bytes: Vec<u8>) -> MediaResult<Self> {
        if bytes.is_empty() {
            return Err(MediaError::EmptyFrame);
        }

        let image = image::load_from_memory(&bytes)
            .map_err(|e| MediaError::decode(e.to_string()))?
            .to_rgb8();

        if image.width() == 0 || image.height() == 0 {
            return Err(MediaError::EmptyFrame);
        }

        debug!(width = image.width(), height = image.height(), bytes = bytes.len(), "Decoded frame");

        Ok(Self {
            image: Arc::new(image),
            encoded: bytes.into(),
        })
    }

    /// Decode a `data:image/...;base64,` URI or a bare base64 string.
    pub fn from_payload(payload: &str) -> MediaResult<Self> {
        let encoded = base64_part(payload)?;
        let bytes = STANDARD.decode(encoded)?;
        Self::from_bytes(bytes)
    }

    /// Wrap already-decoded pixels, producing a JPEG encoding for detectors.
    pub fn from_image(image: RgbImage) -> MediaResult<Self> {
        let encoded = encode_jpeg(&image, DEFAULT_JPEG_QUALITY)?;
        Ok(Self {
            image: Arc::new(image),
            encoded: encoded.into(),
        })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Decoded pixels of the original capture.
    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    /// Compressed bytes the frame was built from.
    pub fn encoded(&self) -> &[u8] {
        &self.encoded
    }

    /// Mutable copy of the pixels for drawing on.
    pub fn working_copy(&self) -> RgbImage {
        (*self.image).clone()
    }
}

/// Extract the base64 body of a payload.
///
/// Data URIs must declare `;base64`; anything without a `data:` scheme is
/// taken to be bare base64.
fn base64_part(payload: &str) -> MediaResult<&str> {
    let payload = payload.trim();
    if payload.is_empty() {
        return Err(MediaError::EmptyFrame);
    }

    let Some(rest) = payload.strip_prefix("data:") else {
        return Ok(payload);
    };

    let (header, body) = rest
        .split_once(',')
        .ok_or_else(|| MediaError::InvalidDataUri("missing ',' separator".to_string()))?;

    if !header.ends_with(";base64") {
        return Err(MediaError::InvalidDataUri(format!(
            "unsupported encoding in header '{}'",
            header
        )));
    }

    Ok(body)
}
