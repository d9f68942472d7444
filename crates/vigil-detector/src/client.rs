//! Model server HTTP client.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use vigil_media::Frame;
use vigil_models::RawDetection;

use crate::error::{DetectError, DetectResult};
use crate::port::DetectorPort;
use crate::types::{DetectRequest, DetectorReply, HealthResponse};

/// Configuration for one model server.
#[derive(Debug, Clone)]
pub struct HttpDetectorConfig {
    /// Model identifier (e.g. "firesmoke")
    pub model_id: String,
    /// Base URL of the model server
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
    /// Max retries on retryable failures
    pub max_retries: u32,
}

impl HttpDetectorConfig {
    pub fn new(model_id: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(10),
            max_retries: 0,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

/// Client for one model server.
pub struct HttpDetector {
    http: Client,
    config: HttpDetectorConfig,
}

impl HttpDetector {
    /// Create a new detector client.
    pub fn new(config: HttpDetectorConfig) -> DetectResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(DetectError::Network)?;

        Ok(Self { http, config })
    }

    pub fn config(&self) -> &HttpDetectorConfig {
        &self.config
    }

    async fn post_detect(&self, body: &DetectRequest) -> DetectResult<DetectorReply> {
        let url = format!("{}/detect", self.config.base_url);

        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DetectError::Timeout(self.config.timeout.as_millis() as u64)
                } else {
                    DetectError::Network(e)
                }
            })?;

        let status = response.status();
        if status == StatusCode::SERVICE_UNAVAILABLE || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(DetectError::ServiceUnavailable(format!(
                "model server returned {}",
                status
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DetectError::RequestFailed(format!(
                "model server returned {}: {}",
                status, body
            )));
        }

        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Execute with retry logic.
    async fn with_retry<F, Fut, T>(&self, operation: F) -> DetectResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = DetectResult<T>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    let delay = Duration::from_millis(100 * 2u64.pow(attempt));
                    warn!(
                        model = %self.config.model_id,
                        "Detector request failed (attempt {}), retrying in {:?}: {}",
                        attempt + 1,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl DetectorPort for HttpDetector {
    fn model_id(&self) -> &str {
        &self.config.model_id
    }

    async fn detect(&self, frame: &Frame) -> DetectResult<Vec<RawDetection>> {
        let request = DetectRequest {
            image: STANDARD.encode(frame.encoded()),
        };

        debug!(model = %self.config.model_id, "Sending frame to model server");

        let reply = self.with_retry(|| self.post_detect(&request)).await?;

        reply
            .detections
            .into_iter()
            .map(|d| d.into_raw(&self.config.model_id))
            .collect()
    }

    async fn health_check(&self) -> DetectResult<bool> {
        let url = format!("{}/health", self.config.base_url);

        match self.http.get(&url).send().await {
            Ok(response) if response.status().is_success() => {
                let health: HealthResponse = response.json().await?;
                Ok(health.status == "healthy" || health.status == "ok")
            }
            Ok(response) => {
                warn!(model = %self.config.model_id, "Model health check failed: {}", response.status());
                Ok(false)
            }
            Err(e) => {
                warn!(model = %self.config.model_id, "Model health check error: {}", e);
                Ok(false)
            }
        }
    }
}
