//! The detector port.

use async_trait::async_trait;
use vigil_media::Frame;
use vigil_models::RawDetection;

use crate::error::DetectResult;

/// One object-detection model.
///
/// Implementations wrap a single, possibly stateful, model context. Whether
/// that context tolerates concurrent calls is a property of the model, so
/// callers wrap ports in a [`GatedDetector`](crate::GatedDetector) rather than
/// assume it.
#[async_trait]
pub trait DetectorPort: Send + Sync {
    /// Model identifier, used for threshold lookup and logging.
    fn model_id(&self) -> &str;

    /// Run the model on one frame. An empty vector is a normal result.
    async fn detect(&self, frame: &Frame) -> DetectResult<Vec<RawDetection>>;

    /// Whether the model is reachable and ready.
    async fn health_check(&self) -> DetectResult<bool> {
        Ok(true)
    }
}
