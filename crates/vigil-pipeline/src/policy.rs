//! Escalation policy.
//!
//! A frame's aggregated objects pass through named stages:
//!
//! - [`DetectionStage`]: per-model thresholds applied by the aggregator
//! - [`ImmediateStage`]: a weapon above the hard floor short-circuits to
//!   [`AlertTier::Immediate`] with only that object
//! - [`ReportableStage`]: reportable labels above the reportable floor, best
//!   per label
//! - [`CriticalStage`]: final floor; anything left is a [`AlertTier::Batch`]
//!   alert
//!
//! Each stage can be tuned and tested on its own.

use std::sync::Arc;

use tracing::debug;
use vigil_models::{normalize_label, AggregatedObject, AlertTier};

use crate::aggregator::{aggregate, ModelDetections};
use crate::thresholds::ThresholdTable;

pub const DEFAULT_IMMEDIATE_THRESHOLD: f32 = 0.83;
pub const DEFAULT_REPORTABLE_THRESHOLD: f32 = 0.80;
pub const DEFAULT_CRITICAL_THRESHOLD: f32 = 0.70;

/// Label sets and floors used by the policy.
#[derive(Debug, Clone)]
pub struct PolicyConfig {
    /// Labels that take the immediate path
    pub weapon_labels: Vec<String>,
    /// Labels eligible for batch alerts, in report order
    pub reportable_labels: Vec<String>,
    pub immediate_threshold: f32,
    pub reportable_threshold: f32,
    pub critical_threshold: f32,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            weapon_labels: vec!["pistol".into(), "gun".into()],
            reportable_labels: vec!["fire".into(), "pistol".into(), "gun".into()],
            immediate_threshold: DEFAULT_IMMEDIATE_THRESHOLD,
            reportable_threshold: DEFAULT_REPORTABLE_THRESHOLD,
            critical_threshold: DEFAULT_CRITICAL_THRESHOLD,
        }
    }
}

/// Aggregator thresholds, as a policy stage.
#[derive(Debug, Clone)]
pub struct DetectionStage {
    thresholds: Arc<ThresholdTable>,
}

impl DetectionStage {
    pub fn new(thresholds: Arc<ThresholdTable>) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &ThresholdTable {
        &self.thresholds
    }

    pub fn apply(&self, per_model: &[ModelDetections]) -> Vec<AggregatedObject> {
        aggregate(per_model, &self.thresholds)
    }
}

/// Weapon short-circuit.
#[derive(Debug, Clone)]
pub struct ImmediateStage {
    labels: Vec<String>,
    threshold: f32,
}

impl ImmediateStage {
    pub fn new(labels: &[String], threshold: f32) -> Self {
        Self {
            labels: normalized(labels),
            threshold,
        }
    }

    /// First weapon object strictly above the floor, in aggregation order.
    pub fn apply<'a>(&self, objects: &'a [AggregatedObject]) -> Option<&'a AggregatedObject> {
        objects.iter().find(|obj| {
            self.labels.iter().any(|l| *l == obj.label) && obj.best_confidence > self.threshold
        })
    }
}

/// Reportable labels above the reportable floor.
#[derive(Debug, Clone)]
pub struct ReportableStage {
    labels: Vec<String>,
    threshold: f32,
}

impl ReportableStage {
    pub fn new(labels: &[String], threshold: f32) -> Self {
        Self {
            labels: normalized(labels),
            threshold,
        }
    }

    /// Best candidate per reportable label, ordered as the labels are configured.
    pub fn apply(&self, objects: &[AggregatedObject]) -> Vec<AggregatedObject> {
        self.labels
            .iter()
            .filter_map(|label| {
                objects
                    .iter()
                    .filter(|obj| obj.label == *label && obj.best_confidence > self.threshold)
                    .fold(None::<&AggregatedObject>, |best, obj| match best {
                        Some(b) if b.best_confidence >= obj.best_confidence => Some(b),
                        _ => Some(obj),
                    })
                    .cloned()
            })
            .collect()
    }
}

/// Final confidence floor.
#[derive(Debug, Clone, Copy)]
pub struct CriticalStage {
    threshold: f32,
}

impl CriticalStage {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    pub fn apply(&self, candidates: Vec<AggregatedObject>) -> Vec<AggregatedObject> {
        candidates
            .into_iter()
            .filter(|obj| obj.best_confidence > self.threshold)
            .collect()
    }
}

/// Outcome of classifying one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub tier: AlertTier,
    /// Objects to annotate and report; empty for [`AlertTier::None`]
    pub relevant: Vec<AggregatedObject>,
}

impl Classification {
    pub fn none() -> Self {
        Self {
            tier: AlertTier::None,
            relevant: Vec::new(),
        }
    }

    pub fn is_alert(&self) -> bool {
        self.tier.is_alert()
    }
}

/// Decides whether a frame is alert-worthy.
#[derive(Debug, Clone)]
pub struct EscalationPolicy {
    immediate: ImmediateStage,
    reportable: ReportableStage,
    critical: CriticalStage,
}

impl Default for EscalationPolicy {
    fn default() -> Self {
        Self::new(&PolicyConfig::default())
    }
}

impl EscalationPolicy {
    pub fn new(config: &PolicyConfig) -> Self {
        Self {
            immediate: ImmediateStage::new(&config.weapon_labels, config.immediate_threshold),
            reportable: ReportableStage::new(&config.reportable_labels, config.reportable_threshold),
            critical: CriticalStage::new(config.critical_threshold),
        }
    }

    pub fn classify(&self, aggregated: &[AggregatedObject]) -> Classification {
        if let Some(weapon) = self.immediate.apply(aggregated) {
            debug!(label = %weapon.label, confidence = weapon.best_confidence, "Immediate escalation");
            return Classification {
                tier: AlertTier::Immediate,
                relevant: vec![weapon.clone()],
            };
        }

        let relevant = self.critical.apply(self.reportable.apply(aggregated));
        if relevant.is_empty() {
            return Classification::none();
        }

        Classification {
            tier: AlertTier::Batch,
            relevant,
        }
    }

    /// Human-readable summary line for an alert.
    ///
    /// `processing_secs` is the detector stage wall time.
    pub fn log_text(classification: &Classification, processing_secs: f64) -> String {
        let parts: Vec<String> = classification
            .relevant
            .iter()
            .map(|obj| format!("{} (conf: {:.2})", obj.display_label(), obj.best_confidence))
            .collect();

        match classification.tier {
            AlertTier::Immediate => format!("URGENT {} | {:.2}s", parts.join(" | "), processing_secs),
            _ if parts.is_empty() => format!("{:.2}s", processing_secs),
            _ => format!("{:.2}s | {}", processing_secs, parts.join(" | ")),
        }
    }
}

fn normalized(labels: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(labels.len());
    for label in labels.iter().map(|l| normalize_label(l)) {
        if !label.is_empty() && !out.contains(&label) {
            out.push(label);
        }
    }
    out
}
