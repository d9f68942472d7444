//! Frame handling for the alert pipeline.
//!
//! This crate provides:
//! - Decoding of submitted frames (data URI, bare base64, raw bytes)
//! - The frame annotator (boxes and `label (0.93)` captions)
//! - JPEG encoding with a data-URI prefix for inline display

pub mod annotate;
pub mod encode;
pub mod error;
pub mod frame;

pub use annotate::{Annotator, AnnotatorConfig};
pub use encode::{encode_data_uri, encode_jpeg, to_data_uri, DEFAULT_JPEG_QUALITY, JPEG_DATA_URI_PREFIX};
pub use error::{MediaError, MediaResult};
pub use frame::Frame;
