//! Detector port for object-detection models.
//!
//! Each configured model is an independent [`DetectorPort`]: given a frame it
//! returns raw detections. The models themselves run out of process; this
//! crate provides:
//! - The [`DetectorPort`] trait the pipeline consumes
//! - [`HttpDetector`], a client for model servers speaking the `/detect` protocol
//! - [`GatedDetector`], which bounds concurrent calls into one model context
//! - [`StaticDetector`], a scripted in-process backend for tests and dry runs

pub mod client;
pub mod error;
pub mod gate;
pub mod port;
pub mod stub;
pub mod types;

pub use client::{HttpDetector, HttpDetectorConfig};
pub use error::{DetectError, DetectResult};
pub use gate::GatedDetector;
pub use port::DetectorPort;
pub use stub::StaticDetector;
pub use types::{DetectRequest, DetectorReply, HealthResponse, WireDetection};
