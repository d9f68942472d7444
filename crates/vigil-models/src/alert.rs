//! Alert and frame-submission reply messages.
//!
//! [`AlertMessage`] is pushed verbatim to every live subscriber, so its field
//! names are the subscriber wire format: `log`, `image`, `counts`, `timestamp`.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::detection::AggregatedObject;

/// Per-label occurrence counts, ordered by label.
pub type LabelCounts = BTreeMap<String, u32>;

/// An alert broadcast to subscribers.
///
/// Immutable once built; the hub shares it behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AlertMessage {
    /// Human-readable summary line
    #[serde(rename = "log")]
    pub log_text: String,
    /// Annotated frame as a `data:image/jpeg;base64,...` URI
    #[serde(rename = "image")]
    pub encoded_image: String,
    /// Occurrence count per reported label
    #[serde(rename = "counts")]
    pub label_counts: LabelCounts,
    /// Unix seconds
    pub timestamp: i64,
}

impl AlertMessage {
    pub fn new(
        log_text: impl Into<String>,
        encoded_image: impl Into<String>,
        objects: &[AggregatedObject],
        timestamp: i64,
    ) -> Self {
        Self {
            log_text: log_text.into(),
            encoded_image: encoded_image.into(),
            label_counts: label_counts(objects),
            timestamp,
        }
    }
}

/// Count map for a set of aggregated objects.
pub fn label_counts(objects: &[AggregatedObject]) -> LabelCounts {
    objects
        .iter()
        .map(|obj| (obj.label.clone(), obj.occurrence_count))
        .collect()
}

/// Statistics returned to the submitting client.
///
/// Every field is omitted when no detector produced anything, which yields
/// the `{}` payload clients expect for an empty frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FrameStats {
    /// Total detector time in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counts: Option<LabelCounts>,
    /// Unix seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

/// Reply to a frame submission.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DetectResponse {
    /// Annotated frame as a data URI, only present when an alert fired
    pub image: Option<String>,
    pub stats: FrameStats,
    /// Set when at least one detector failed for this frame
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub degraded: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_models: Vec<String>,
}

impl DetectResponse {
    /// Reply for a frame on which no detector found anything.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Reply for a frame that was processed but raised no alert.
    pub fn no_alert(processing_time: f64, timestamp: i64) -> Self {
        Self {
            image: None,
            stats: FrameStats {
                processing_time: Some(processing_time),
                counts: Some(LabelCounts::new()),
                timestamp: Some(timestamp),
            },
            ..Self::default()
        }
    }

    /// Reply carrying the alert that was broadcast.
    pub fn alert(message: &AlertMessage, processing_time: f64) -> Self {
        Self {
            image: Some(message.encoded_image.clone()),
            stats: FrameStats {
                processing_time: Some(processing_time),
                counts: Some(message.label_counts.clone()),
                timestamp: Some(message.timestamp),
            },
            ..Self::default()
        }
    }

    /// Mark the reply as degraded by the given failed models.
    pub fn with_failures(mut self, failed_models: Vec<String>) -> Self {
        self.degraded = !failed_models.is_empty();
        self.failed_models = failed_models;
        self
    }
}
