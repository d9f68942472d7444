//! JPEG encoding for transmission to subscribers.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;

use crate::error::{MediaError, MediaResult};

/// Prefix that lets browsers render the payload inline.
pub const JPEG_DATA_URI_PREFIX: &str = "data:image/jpeg;base64,";

/// JPEG quality used for alert images.
pub const DEFAULT_JPEG_QUALITY: u8 = 85;

/// Compress an image to JPEG.
pub fn encode_jpeg(image: &RgbImage, quality: u8) -> MediaResult<Vec<u8>> {
    if image.width() == 0 || image.height() == 0 {
        return Err(MediaError::EmptyFrame);
    }

    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100))
        .encode_image(image)
        .map_err(|e| MediaError::encode(e.to_string()))?;

    if buf.is_empty() {
        return Err(MediaError::encode("encoder produced no output"));
    }

    Ok(buf)
}

/// Base64-embed JPEG bytes in a data URI.
pub fn to_data_uri(jpeg: &[u8]) -> String {
    let mut uri = String::with_capacity(JPEG_DATA_URI_PREFIX.len() + jpeg.len() * 4 / 3 + 4);
    uri.push_str(JPEG_DATA_URI_PREFIX);
    STANDARD.encode_string(jpeg, &mut uri);
    uri
}

/// Encode an image straight to a JPEG data URI.
pub fn encode_data_uri(image: &RgbImage) -> MediaResult<String> {
    let jpeg = encode_jpeg(image, DEFAULT_JPEG_QUALITY)?;
    Ok(to_data_uri(&jpeg))
}
