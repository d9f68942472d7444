//! Axum HTTP API server.
//!
//! This crate provides:
//! - Frame submission (`POST /detect`)
//! - Live alert subscriber channel (`GET /ws`)
//! - Browser camera page (`GET /`)
//! - Health, readiness and Prometheus metrics
//! - Rate limiting and security headers

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod ws;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
