//! Frame submission handler.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use tracing::debug;

use vigil_models::DetectResponse;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Frame submission body.
#[derive(Debug, Deserialize)]
pub struct DetectRequest {
    /// `data:image/jpeg;base64,...` or bare base64
    pub image: String,
}

/// Run one frame through the pipeline.
///
/// Alerts are pushed to subscribers in the background; this reply never
/// waits on them.
pub async fn detect(
    State(state): State<AppState>,
    payload: Result<Json<DetectRequest>, JsonRejection>,
) -> ApiResult<Json<DetectResponse>> {
    let Json(request) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;

    if request.image.trim().is_empty() {
        return Err(ApiError::InvalidInput("image is empty".to_string()));
    }

    let outcome = state.pipeline.process(&request.image).await?;

    debug!(
        frame_id = %outcome.frame_id,
        tier = %outcome.tier,
        degraded = outcome.response.degraded,
        "Frame handled"
    );

    Ok(Json(outcome.response))
}
