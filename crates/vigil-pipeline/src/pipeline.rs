//! Frame pipeline orchestration.
//!
//! decode → admission → detectors (concurrently) → aggregation → escalation
//! → annotation and broadcast.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures_util::future::join_all;
use tracing::Instrument;
use vigil_detector::{DetectorPort, GatedDetector, HttpDetector, HttpDetectorConfig};
use vigil_media::{encode_data_uri, Annotator, Frame};
use vigil_models::{AlertMessage, AlertTier, DetectResponse, FrameId, RawDetection};

use crate::admission::AdmissionController;
use crate::aggregator::{raw_count, ModelDetections};
use crate::config::PipelineConfig;
use crate::error::{ConfigError, PipelineError, PipelineResult};
use crate::hub::BroadcastHub;
use crate::logging::FrameLogger;
use crate::metrics;
use crate::policy::{Classification, DetectionStage, EscalationPolicy, PolicyConfig};
use crate::thresholds::ThresholdTable;

/// Result of processing one frame.
#[derive(Debug, Clone)]
pub struct FrameOutcome {
    pub frame_id: FrameId,
    /// Reply for the submitting client
    pub response: DetectResponse,
    pub tier: AlertTier,
    /// The alert handed to the hub, if any
    pub alert: Option<Arc<AlertMessage>>,
}

/// Runs submitted frames through every configured detector.
pub struct FramePipeline {
    detectors: Vec<Arc<GatedDetector>>,
    detection: DetectionStage,
    policy: EscalationPolicy,
    annotator: Annotator,
    admission: AdmissionController,
    hub: Arc<BroadcastHub>,
}

impl FramePipeline {
    pub fn builder() -> FramePipelineBuilder {
        FramePipelineBuilder::default()
    }

    /// Build the pipeline with one HTTP detector per configured model.
    pub fn from_config(config: &PipelineConfig) -> PipelineResult<Self> {
        let mut builder = Self::builder()
            .thresholds(config.thresholds.clone())
            .policy(config.policy.clone())
            .admission(AdmissionController::new(
                config.admission_pool_size,
                config.admission_timeout,
            ))
            .hub(Arc::new(BroadcastHub::new(
                config.subscriber_send_timeout,
                config.subscriber_buffer,
            )))
            .model_concurrency(config.model_concurrency)
            .detector_timeout(config.detector_timeout);

        for spec in &config.detectors {
            let client = HttpDetector::new(
                HttpDetectorConfig::new(&spec.model_id, &spec.base_url)
                    .with_timeout(config.detector_timeout)
                    .with_retries(config.detector_retries),
            )?;
            builder = builder.detector(Arc::new(client));
        }

        if let Some(path) = &config.font_path {
            let annotator = Annotator::default()
                .with_font_file(path)
                .map_err(|e| ConfigError::invalid("ANNOTATION_FONT_PATH", e.to_string()))?;
            builder = builder.annotator(annotator);
        }

        builder.build()
    }

    pub fn hub(&self) -> &Arc<BroadcastHub> {
        &self.hub
    }

    pub fn admission(&self) -> &AdmissionController {
        &self.admission
    }

    pub fn thresholds(&self) -> &ThresholdTable {
        self.detection.thresholds()
    }

    /// Configured model ids, in invocation order.
    pub fn model_ids(&self) -> Vec<String> {
        self.detectors.iter().map(|d| d.model_id().to_string()).collect()
    }

    /// Health of every detector, in invocation order.
    pub async fn detector_health(&self) -> Vec<(String, bool)> {
        join_all(self.detectors.iter().map(|detector| async move {
            let healthy = detector.health_check().await.unwrap_or(false);
            (detector.model_id().to_string(), healthy)
        }))
        .await
    }

    /// Process one submitted frame (data URI or bare base64).
    pub async fn process(&self, payload: &str) -> PipelineResult<FrameOutcome> {
        let frame_id = FrameId::new();
        let logger = FrameLogger::new(&frame_id);
        let span = logger.create_span();

        let decoded = {
            let _enter = span.enter();
            Frame::from_payload(payload).map_err(|e| {
                logger.log_rejected(&e.to_string());
                metrics::record_frame_rejected("invalid_input");
                PipelineError::from(e)
            })
        };

        self.run(decoded?, frame_id, &logger).instrument(span).await
    }

    /// Process an already decoded frame.
    pub async fn process_frame(&self, frame: Frame) -> PipelineResult<FrameOutcome> {
        let frame_id = FrameId::new();
        let logger = FrameLogger::new(&frame_id);
        let span = logger.create_span();
        self.run(frame, frame_id, &logger).instrument(span).await
    }

    async fn run(&self, frame: Frame, frame_id: FrameId, logger: &FrameLogger) -> PipelineResult<FrameOutcome> {
        let started = Instant::now();
        logger.log_start(frame.width(), frame.height());

        let (results, processing_time) = {
            let slot = self.admission.acquire().await.map_err(|e| {
                logger.log_rejected(&e.to_string());
                metrics::record_frame_rejected("overloaded");
                e
            })?;
            metrics::record_admission_wait(slot.waited().as_secs_f64());
            metrics::set_admission_in_flight(self.admission.in_flight());

            let detect_started = Instant::now();
            let results = self.run_detectors(&frame).await;
            (results, detect_started.elapsed().as_secs_f64())
        };
        metrics::set_admission_in_flight(self.admission.in_flight());

        let mut per_model: Vec<ModelDetections> = Vec::with_capacity(results.len());
        let mut failed_models = Vec::new();
        for (model_id, result) in results {
            match result {
                Ok(detections) => per_model.push((model_id, detections)),
                Err(message) => {
                    logger.log_detector_failure(&model_id, &message);
                    failed_models.push(model_id);
                }
            }
        }

        let timestamp = Utc::now().timestamp();

        if per_model.is_empty() {
            logger.log_error("Every detector failed; returning degraded result");
            let response = DetectResponse::no_alert(processing_time, timestamp).with_failures(failed_models);
            return Ok(self.finish(logger, frame_id, started, response, Classification::none(), None, processing_time));
        }

        if raw_count(&per_model) == 0 {
            let response = DetectResponse::empty().with_failures(failed_models);
            return Ok(self.finish(logger, frame_id, started, response, Classification::none(), None, processing_time));
        }

        let aggregated = self.detection.apply(&per_model);
        let classification = self.policy.classify(&aggregated);

        if !classification.is_alert() {
            let response = DetectResponse::no_alert(processing_time, timestamp).with_failures(failed_models);
            return Ok(self.finish(logger, frame_id, started, response, classification, None, processing_time));
        }

        let log_text = EscalationPolicy::log_text(&classification, processing_time);
        // Every object that passed its threshold is drawn; the alert reports the relevant subset
        let annotated = self.annotator.annotate(&frame, &aggregated);
        let image = encode_data_uri(&annotated).map_err(|e| {
            logger.log_error(&e.to_string());
            PipelineError::Encode(e.to_string())
        })?;

        let alert = Arc::new(AlertMessage::new(log_text, image, &classification.relevant, timestamp));
        logger.log_alert(classification.tier, &alert.log_text);
        self.hub.publish_detached(Arc::clone(&alert));

        let response = DetectResponse::alert(&alert, processing_time).with_failures(failed_models);
        Ok(self.finish(logger, frame_id, started, response, classification, Some(alert), processing_time))
    }

    /// Run every detector concurrently, keeping configuration order.
    async fn run_detectors(&self, frame: &Frame) -> Vec<(String, Result<Vec<RawDetection>, String>)> {
        join_all(self.detectors.iter().map(|detector| async move {
            let model_id = detector.model_id().to_string();
            let started = Instant::now();
            let result = detector.detect(frame).await;
            metrics::record_detector_call(&model_id, started.elapsed().as_secs_f64());

            let result = result.map_err(|e| {
                metrics::record_detector_failure(&model_id);
                e.to_string()
            });
            (model_id, result)
        }))
        .await
    }

    #[allow(clippy::too_many_arguments)]
    fn finish(
        &self,
        logger: &FrameLogger,
        frame_id: FrameId,
        started: Instant,
        response: DetectResponse,
        classification: Classification,
        alert: Option<Arc<AlertMessage>>,
        processing_time: f64,
    ) -> FrameOutcome {
        logger.log_outcome(classification.tier, classification.relevant.len(), processing_time);
        metrics::record_frame(classification.tier.as_str(), started.elapsed().as_secs_f64());

        FrameOutcome {
            frame_id,
            response,
            tier: classification.tier,
            alert,
        }
    }
}

/// Builder for [`FramePipeline`].
pub struct FramePipelineBuilder {
    detectors: Vec<Arc<dyn DetectorPort>>,
    thresholds: ThresholdTable,
    policy: PolicyConfig,
    annotator: Annotator,
    admission: Option<AdmissionController>,
    hub: Option<Arc<BroadcastHub>>,
    model_concurrency: usize,
    detector_timeout: Duration,
}

impl Default for FramePipelineBuilder {
    fn default() -> Self {
        let defaults = PipelineConfig::default();
        Self {
            detectors: Vec::new(),
            thresholds: ThresholdTable::default(),
            policy: PolicyConfig::default(),
            annotator: Annotator::default(),
            admission: None,
            hub: None,
            model_concurrency: defaults.model_concurrency,
            detector_timeout: defaults.detector_timeout,
        }
    }
}

impl FramePipelineBuilder {
    /// Add a detector. Models run in the order they are added.
    pub fn detector(mut self, detector: Arc<dyn DetectorPort>) -> Self {
        self.detectors.push(detector);
        self
    }

    pub fn thresholds(mut self, thresholds: ThresholdTable) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn policy(mut self, policy: PolicyConfig) -> Self {
        self.policy = policy;
        self
    }

    pub fn annotator(mut self, annotator: Annotator) -> Self {
        self.annotator = annotator;
        self
    }

    pub fn admission(mut self, admission: AdmissionController) -> Self {
        self.admission = Some(admission);
        self
    }

    pub fn hub(mut self, hub: Arc<BroadcastHub>) -> Self {
        self.hub = Some(hub);
        self
    }

    pub fn model_concurrency(mut self, concurrency: usize) -> Self {
        self.model_concurrency = concurrency;
        self
    }

    pub fn detector_timeout(mut self, timeout: Duration) -> Self {
        self.detector_timeout = timeout;
        self
    }

    pub fn build(self) -> PipelineResult<FramePipeline> {
        if self.detectors.is_empty() {
            return Err(ConfigError::NoDetectors.into());
        }

        let detectors = self
            .detectors
            .into_iter()
            .map(|d| Arc::new(GatedDetector::new(d, self.model_concurrency, self.detector_timeout)))
            .collect();

        Ok(FramePipeline {
            detectors,
            detection: DetectionStage::new(Arc::new(self.thresholds)),
            policy: EscalationPolicy::new(&self.policy),
            annotator: self.annotator,
            admission: self
                .admission
                .unwrap_or_else(|| AdmissionController::new(1, Duration::from_millis(2000))),
            hub: self.hub.unwrap_or_default(),
        })
    }
}
