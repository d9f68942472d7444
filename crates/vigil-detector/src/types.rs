//! Model server request/response types.

use serde::{Deserialize, Serialize};
use vigil_models::{BoundingBox, RawDetection};

use crate::error::{DetectError, DetectResult};

/// Request for one frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectRequest {
    /// Base64 of the compressed frame
    pub image: String,
}

/// One detection as the model server reports it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireDetection {
    pub label: String,
    pub confidence: f32,
    /// `[x1, y1, x2, y2]` in frame pixels
    pub bbox: [i32; 4],
}

impl WireDetection {
    /// Validate and tag with the producing model.
    ///
    /// Confidence is clamped to `[0, 1]`; non-finite confidences and
    /// degenerate boxes are protocol errors.
    pub fn into_raw(self, model_id: &str) -> DetectResult<RawDetection> {
        if !self.confidence.is_finite() {
            return Err(DetectError::invalid_response(format!(
                "non-finite confidence for label '{}'",
                self.label
            )));
        }
        let bbox = BoundingBox::try_from(self.bbox)
            .map_err(|e| DetectError::invalid_response(e.to_string()))?;

        Ok(RawDetection::new(
            model_id,
            self.label,
            self.confidence.clamp(0.0, 1.0),
            bbox,
        ))
    }
}

/// Response for one frame.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetectorReply {
    #[serde(default)]
    pub detections: Vec<WireDetection>,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: Option<String>,
}
