//! Scripted in-process detector.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use vigil_media::Frame;
use vigil_models::{BoundingBox, RawDetection};

use crate::error::{DetectError, DetectResult};
use crate::port::DetectorPort;

/// Detector that returns a fixed script regardless of the frame.
///
/// Used for tests and for running the service without model servers.
pub struct StaticDetector {
    model_id: String,
    detections: Vec<RawDetection>,
    failure: Option<String>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl StaticDetector {
    /// Detector that never finds anything.
    pub fn empty(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            detections: Vec::new(),
            failure: None,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Detector that always fails with `ServiceUnavailable`.
    pub fn failing(model_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::empty(model_id)
        }
    }

    /// Add a detection to the script.
    ///
    /// # Panics
    /// If `bbox` is degenerate.
    pub fn with(mut self, label: &str, confidence: f32, bbox: [i32; 4]) -> Self {
        let bbox = BoundingBox::try_from(bbox).expect("scripted bbox must be valid");
        self.detections
            .push(RawDetection::new(self.model_id.clone(), label, confidence, bbox));
        self
    }

    /// Sleep before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of `detect` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DetectorPort for StaticDetector {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn detect(&self, _frame: &Frame) -> DetectResult<Vec<RawDetection>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match &self.failure {
            Some(message) => Err(DetectError::ServiceUnavailable(message.clone())),
            None => Ok(self.detections.clone()),
        }
    }
}
