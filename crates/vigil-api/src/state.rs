//! Application state.

use std::sync::Arc;

use vigil_pipeline::{BroadcastHub, FramePipeline, PipelineConfig, PipelineResult};

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub pipeline: Arc<FramePipeline>,
}

impl AppState {
    /// Create new application state with HTTP detectors from `pipeline_config`.
    pub fn new(config: ApiConfig, pipeline_config: &PipelineConfig) -> PipelineResult<Self> {
        let pipeline = FramePipeline::from_config(pipeline_config)?;
        Ok(Self::with_pipeline(config, Arc::new(pipeline)))
    }

    /// Create state around an already built pipeline.
    pub fn with_pipeline(config: ApiConfig, pipeline: Arc<FramePipeline>) -> Self {
        Self { config, pipeline }
    }

    pub fn hub(&self) -> &Arc<BroadcastHub> {
        self.pipeline.hub()
    }
}
