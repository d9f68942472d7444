//! Detection models.
//!
//! A [`RawDetection`] is what a single detector emits for one frame. The
//! aggregator collapses raw detections from every model into at most one
//! [`AggregatedObject`] per label.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::bbox::BoundingBox;

/// Canonical form of a class label: trimmed and lowercased.
///
/// All label comparisons (thresholds, policy label sets, grouping) go through
/// this so that `" Fire"` and `"fire"` are the same class.
pub fn normalize_label(label: &str) -> String {
    label.trim().to_lowercase()
}

/// One bounding box emitted by one detector for one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RawDetection {
    /// Identifier of the model that produced the detection
    pub model_id: String,
    /// Class label as reported by the model
    pub label: String,
    /// Confidence in `[0, 1]`
    pub confidence: f32,
    /// Box in source frame pixels
    pub bbox: BoundingBox,
}

impl RawDetection {
    pub fn new(
        model_id: impl Into<String>,
        label: impl Into<String>,
        confidence: f32,
        bbox: BoundingBox,
    ) -> Self {
        Self {
            model_id: model_id.into(),
            label: label.into(),
            confidence,
            bbox,
        }
    }

    /// Label in canonical form.
    pub fn normalized_label(&self) -> String {
        normalize_label(&self.label)
    }
}

/// Best detection of one label across all models for a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AggregatedObject {
    /// Normalized label
    pub label: String,
    /// Highest confidence among qualifying detections of this label
    pub best_confidence: f32,
    /// Bounding box of the highest-confidence detection
    pub bbox: BoundingBox,
    /// Number of qualifying detections of this label, across all models
    pub occurrence_count: u32,
}

impl AggregatedObject {
    /// Label with the first character upper-cased, for human-readable logs.
    pub fn display_label(&self) -> String {
        let mut chars = self.label.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}
