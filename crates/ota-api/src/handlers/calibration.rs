//! Calibration pair handlers

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde_json::Value;

use super::SuccessResponse;
use crate::error::ApiError;
use crate::state::AppState;

/// GET /api/calib-pairs
/// Saved calibration pairs, empty if none were saved
pub async fn get_pairs(State(state): State<AppState>) -> Result<Json<Vec<Value>>, ApiError> {
    let pairs = state.calibration().load().await?;
    Ok(Json(pairs))
}

/// POST /api/calib-pairs
/// Replace the saved calibration pairs with a JSON array
pub async fn save_pairs(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let Json(body) = body?;
    let Value::Array(pairs) = body else {
        return Err(ApiError::BadRequest(
            "calibration pairs must be a JSON array".to_string(),
        ));
    };

    state.calibration().save(&pairs).await?;
    Ok(Json(SuccessResponse::ok()))
}
