//! Per-model concurrency gate.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tracing::debug;

use vigil_media::Frame;
use vigil_models::RawDetection;

use crate::error::{DetectError, DetectResult};
use crate::port::DetectorPort;

/// Wraps a detector so that at most `concurrency` calls run inside its model
/// context at once, each bounded by `call_timeout`.
///
/// A concurrency of 1 serializes the model, which is the safe default when
/// the model's own thread-safety is unknown.
pub struct GatedDetector {
    inner: Arc<dyn DetectorPort>,
    gate: Arc<Semaphore>,
    concurrency: usize,
    call_timeout: Duration,
}

impl GatedDetector {
    pub fn new(inner: Arc<dyn DetectorPort>, concurrency: usize, call_timeout: Duration) -> Self {
        let concurrency = concurrency.max(1);
        Self {
            inner,
            gate: Arc::new(Semaphore::new(concurrency)),
            concurrency,
            call_timeout,
        }
    }

    /// Serialized gate with the given per-call timeout.
    pub fn serialized(inner: Arc<dyn DetectorPort>, call_timeout: Duration) -> Self {
        Self::new(inner, 1, call_timeout)
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Calls currently inside the model.
    pub fn in_flight(&self) -> usize {
        self.concurrency - self.gate.available_permits()
    }
}

#[async_trait]
impl DetectorPort for GatedDetector {
    fn model_id(&self) -> &str {
        self.inner.model_id()
    }

    async fn detect(&self, frame: &Frame) -> DetectResult<Vec<RawDetection>> {
        let _permit = self.gate.acquire().await.map_err(|_| DetectError::GateClosed)?;

        debug!(model = %self.model_id(), "Model gate entered");

        match tokio::time::timeout(self.call_timeout, self.inner.detect(frame)).await {
            Ok(result) => result,
            Err(_) => Err(DetectError::Timeout(self.call_timeout.as_millis() as u64)),
        }
    }

    async fn health_check(&self) -> DetectResult<bool> {
        self.inner.health_check().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stub::StaticDetector;
    use image::{Rgb, RgbImage};

    fn frame() -> Frame {
        Frame::from_image(RgbImage::from_pixel(8, 8, Rgb([0, 0, 0]))).unwrap()
    }

    #[tokio::test]
    async fn test_gate_times_out_slow_model() {
        let slow = StaticDetector::empty("slow").with_delay(Duration::from_millis(200));
        let gated = GatedDetector::serialized(Arc::new(slow), Duration::from_millis(20));

        let err = gated.detect(&frame()).await.unwrap_err();
        assert!(matches!(err, DetectError::Timeout(20)));
        assert_eq!(gated.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_gate_serializes_calls() {
        let slow = StaticDetector::empty("slow").with_delay(Duration::from_millis(50));
        let gated = Arc::new(GatedDetector::serialized(Arc::new(slow), Duration::from_secs(1)));
        let frame = frame();

        let start = std::time::Instant::now();
        let (a, b) = tokio::join!(gated.detect(&frame), gated.detect(&frame));
        assert!(a.is_ok() && b.is_ok());
        assert!(start.elapsed() >= Duration::from_millis(100));
    }
}
