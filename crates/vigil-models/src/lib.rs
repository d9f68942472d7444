//! Shared data models for the Vigil alert pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Bounding boxes and raw per-model detections
//! - Aggregated per-label objects
//! - Alert tiers produced by the escalation policy
//! - Alert messages pushed to subscribers and frame submission replies

pub mod alert;
pub mod alert_tier;
pub mod bbox;
pub mod detection;
pub mod frame;

// Re-export common types
pub use alert::{AlertMessage, DetectResponse, FrameStats, LabelCounts};
pub use alert_tier::{AlertTier, AlertTierParseError};
pub use bbox::{BoundingBox, BoundingBoxError};
pub use detection::{normalize_label, AggregatedObject, RawDetection};
pub use frame::FrameId;
