//! Frame detection pipeline.
//!
//! This crate provides:
//! - Threshold table and multi-model aggregation
//! - Staged escalation policy
//! - Admission control for detector runs
//! - Broadcast hub for alert fan-out
//! - `FramePipeline`, which ties them together per frame

pub mod admission;
pub mod aggregator;
pub mod config;
pub mod error;
pub mod hub;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod policy;
pub mod thresholds;

pub use admission::{AdmissionController, InFlightSlot};
pub use aggregator::{aggregate, ModelDetections};
pub use config::{DetectorSpec, PipelineConfig};
pub use error::{ConfigError, PipelineError, PipelineResult};
pub use hub::{BroadcastHub, PublishReport, SubscriberId, Subscription};
pub use logging::FrameLogger;
pub use pipeline::{FrameOutcome, FramePipeline, FramePipelineBuilder};
pub use policy::{
    Classification, CriticalStage, DetectionStage, EscalationPolicy, ImmediateStage, PolicyConfig,
    ReportableStage,
};
pub use thresholds::ThresholdTable;
