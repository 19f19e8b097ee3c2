//! Firmware handlers
//!
//! Devices poll `/version` to decide whether to update and fetch the image
//! from `/firmware`. Operators push new images with `/upload-firmware`.

use axum::body::{Body, Bytes};
use axum::extract::rejection::{BytesRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::Response;
use axum::Json;
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;

use super::required;
use crate::error::ApiError;
use crate::state::AppState;

/// Query string naming one device
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceQuery {
    #[serde(default)]
    pub device_id: Option<String>,
}

/// Response for a version lookup
#[derive(Debug, Serialize)]
pub struct VersionResponse {
    pub version: String,
}

/// Response for a firmware upload
#[derive(Debug, Serialize)]
pub struct UploadFirmwareResponse {
    pub success: bool,
    /// Firmware file name the blob was stored under
    pub file: String,
    /// Size of uploaded data
    pub size: u64,
    /// SHA-256 of uploaded data (hex)
    pub sha256: String,
}

/// GET /version?deviceId=
/// Current firmware version for a device
pub async fn get_version(
    State(state): State<AppState>,
    query: Result<Query<DeviceQuery>, QueryRejection>,
) -> Result<Json<VersionResponse>, ApiError> {
    let Query(query) = query?;
    let device_id = required(query.device_id, "deviceId")?;

    let device = state.registry().get(&device_id).await?;

    tracing::debug!(device_id = %device_id, version = %device.version, "Version polled");
    Ok(Json(VersionResponse {
        version: device.version,
    }))
}

/// POST /upload-firmware?deviceId=
/// Replace a device's firmware with the raw request body
pub async fn upload_firmware(
    State(state): State<AppState>,
    query: Result<Query<DeviceQuery>, QueryRejection>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<UploadFirmwareResponse>, ApiError> {
    let Query(query) = query?;
    let device_id = required(query.device_id, "deviceId")?;
    let body = body?;
    if body.is_empty() {
        return Err(ApiError::BadRequest("firmware body is empty".to_string()));
    }

    let receipt = state
        .registry()
        .put_artifact(&device_id, &body)
        .await
        .map_err(ApiError::from_mutation)?;

    Ok(Json(UploadFirmwareResponse {
        success: true,
        file: receipt.file,
        size: receipt.size,
        sha256: receipt.sha256,
    }))
}

/// GET /firmware?deviceId=
/// Stream a device's firmware blob
pub async fn download_firmware(
    State(state): State<AppState>,
    query: Result<Query<DeviceQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query?;
    let device_id = required(query.device_id, "deviceId")?;

    let blob = state.registry().get_artifact(&device_id).await?;

    tracing::info!(
        device_id = %device_id,
        file = %blob.file_name,
        size = blob.size,
        "Serving firmware"
    );

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header(header::CONTENT_LENGTH, blob.size)
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", blob.file_name),
        )
        .body(Body::from_stream(ReaderStream::new(blob.file)))
        .map_err(|e| ApiError::Internal(format!("Failed to build response: {}", e)))
}
