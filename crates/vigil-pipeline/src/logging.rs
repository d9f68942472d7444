//! Structured per-frame logging.
//!
//! Every log line about a frame carries its `frame_id`, so one frame can be
//! followed from decode through broadcast.

use tracing::{error, info, warn, Span};
use vigil_models::{AlertTier, FrameId};

/// Logger bound to one frame.
#[derive(Debug, Clone)]
pub struct FrameLogger {
    frame_id: String,
}

impl FrameLogger {
    pub fn new(frame_id: &FrameId) -> Self {
        Self {
            frame_id: frame_id.to_string(),
        }
    }

    pub fn from_string(frame_id: &str) -> Self {
        Self {
            frame_id: frame_id.to_string(),
        }
    }

    pub fn log_start(&self, width: u32, height: u32) {
        info!(frame_id = %self.frame_id, width, height, "Frame processing started");
    }

    pub fn log_detector_failure(&self, model: &str, message: &str) {
        warn!(frame_id = %self.frame_id, model = %model, "Detector failed: {}", message);
    }

    pub fn log_rejected(&self, reason: &str) {
        warn!(frame_id = %self.frame_id, "Frame rejected: {}", reason);
    }

    pub fn log_error(&self, message: &str) {
        error!(frame_id = %self.frame_id, "Frame error: {}", message);
    }

    /// Log the final decision for the frame.
    pub fn log_outcome(&self, tier: AlertTier, objects: usize, processing_secs: f64) {
        info!(
            frame_id = %self.frame_id,
            tier = %tier,
            objects,
            processing_secs,
            "Frame processed"
        );
    }

    /// Log the alert text pushed to subscribers.
    pub fn log_alert(&self, tier: AlertTier, log_text: &str) {
        warn!(frame_id = %self.frame_id, tier = %tier, "Alert: {}", log_text);
    }

    pub fn frame_id(&self) -> &str {
        &self.frame_id
    }

    /// Span that encloses all work on this frame.
    pub fn create_span(&self) -> Span {
        tracing::info_span!("frame", frame_id = %self.frame_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_logger_creation() {
        let frame_id = FrameId::new();
        let logger = FrameLogger::new(&frame_id);
        assert_eq!(logger.frame_id(), frame_id.as_str());
    }

    #[test]
    fn test_frame_logger_from_string() {
        let logger = FrameLogger::from_string("frame-1");
        assert_eq!(logger.frame_id(), "frame-1");
        let _span = logger.create_span();
    }
}
