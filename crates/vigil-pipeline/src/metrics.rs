//! Pipeline metrics.
//!
//! Recorded through the `metrics` facade; the API server installs the
//! Prometheus recorder. Without a recorder these calls are no-ops.

use metrics::{counter, gauge, histogram};

/// Metric names as constants for consistency.
pub mod names {
    pub const FRAMES_TOTAL: &str = "vigil_frames_total";
    pub const FRAME_DURATION_SECONDS: &str = "vigil_frame_duration_seconds";
    pub const FRAMES_REJECTED_TOTAL: &str = "vigil_frames_rejected_total";

    pub const DETECTOR_DURATION_SECONDS: &str = "vigil_detector_duration_seconds";
    pub const DETECTOR_FAILURES_TOTAL: &str = "vigil_detector_failures_total";

    pub const ADMISSION_WAIT_SECONDS: &str = "vigil_admission_wait_seconds";
    pub const ADMISSION_IN_FLIGHT: &str = "vigil_admission_in_flight";

    pub const SUBSCRIBERS_ACTIVE: &str = "vigil_subscribers_active";
    pub const ALERTS_DELIVERED_TOTAL: &str = "vigil_alerts_delivered_total";
    pub const SUBSCRIBERS_DROPPED_TOTAL: &str = "vigil_subscribers_dropped_total";
}

/// Record a processed frame by tier.
pub fn record_frame(tier: &str, duration_secs: f64) {
    let labels = [("tier", tier.to_string())];
    counter!(names::FRAMES_TOTAL, &labels).increment(1);
    histogram!(names::FRAME_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record a frame rejected before detection (`invalid_input`, `overloaded`).
pub fn record_frame_rejected(reason: &str) {
    let labels = [("reason", reason.to_string())];
    counter!(names::FRAMES_REJECTED_TOTAL, &labels).increment(1);
}

pub fn record_detector_call(model: &str, duration_secs: f64) {
    let labels = [("model", model.to_string())];
    histogram!(names::DETECTOR_DURATION_SECONDS, &labels).record(duration_secs);
}

pub fn record_detector_failure(model: &str) {
    let labels = [("model", model.to_string())];
    counter!(names::DETECTOR_FAILURES_TOTAL, &labels).increment(1);
}

pub fn record_admission_wait(wait_secs: f64) {
    histogram!(names::ADMISSION_WAIT_SECONDS).record(wait_secs);
}

pub fn set_admission_in_flight(count: usize) {
    gauge!(names::ADMISSION_IN_FLIGHT).set(count as f64);
}

pub fn set_active_subscribers(count: usize) {
    gauge!(names::SUBSCRIBERS_ACTIVE).set(count as f64);
}

/// Record the outcome of one publish.
pub fn record_publish(delivered: usize, dropped: usize) {
    counter!(names::ALERTS_DELIVERED_TOTAL).increment(delivered as u64);
    counter!(names::SUBSCRIBERS_DROPPED_TOTAL).increment(dropped as u64);
}
