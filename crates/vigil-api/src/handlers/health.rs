//! Health check handlers.

use std::collections::BTreeMap;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use crate::state::AppState;

/// Health response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
}

/// Health check endpoint (liveness probe).
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// Readiness check response.
#[derive(Serialize)]
pub struct ReadinessResponse {
    pub status: String,
    pub checks: ReadinessChecks,
}

#[derive(Serialize)]
pub struct ReadinessChecks {
    /// Health of each detector model, by model id
    pub detectors: BTreeMap<String, CheckStatus>,
    pub admission: AdmissionStatus,
    pub subscribers: usize,
}

#[derive(Serialize)]
pub struct AdmissionStatus {
    pub pool_size: usize,
    pub in_flight: usize,
}

#[derive(Serialize)]
pub struct CheckStatus {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CheckStatus {
    fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            error: None,
        }
    }

    fn error(msg: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            error: Some(msg.into()),
        }
    }
}

/// Readiness check endpoint (readiness probe).
/// Ready when every detector model answers its health check.
pub async fn ready(
    State(state): State<AppState>,
) -> Result<Json<ReadinessResponse>, (StatusCode, Json<ReadinessResponse>)> {
    let detectors: BTreeMap<String, CheckStatus> = state
        .pipeline
        .detector_health()
        .await
        .into_iter()
        .map(|(model, healthy)| {
            let check = if healthy {
                CheckStatus::ok()
            } else {
                CheckStatus::error("model server unhealthy or unreachable")
            };
            (model, check)
        })
        .collect();

    let all_ok = detectors.values().all(|c| c.status == "ok");
    let admission = state.pipeline.admission();

    let response = ReadinessResponse {
        status: if all_ok { "ready" } else { "degraded" }.to_string(),
        checks: ReadinessChecks {
            detectors,
            admission: AdmissionStatus {
                pool_size: admission.pool_size(),
                in_flight: admission.in_flight(),
            },
            subscribers: state.hub().subscriber_count(),
        },
    };

    if all_ok {
        Ok(Json(response))
    } else {
        Err((StatusCode::SERVICE_UNAVAILABLE, Json(response)))
    }
}
