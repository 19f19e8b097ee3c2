//! Device registry handlers
//!
//! Register, rename, re-version, delete and list devices.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use ota_core::DeviceRecord;
use serde::{Deserialize, Serialize};

use super::{required, SuccessResponse};
use crate::error::ApiError;
use crate::state::AppState;

/// Request body naming one device
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRequest {
    #[serde(default)]
    pub device_id: Option<String>,
}

/// Request body for a rename
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameDeviceRequest {
    #[serde(default)]
    pub old_id: Option<String>,
    #[serde(default)]
    pub new_id: Option<String>,
}

/// Request body for a version change
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateVersionRequest {
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

/// Response carrying the affected device
#[derive(Debug, Serialize)]
pub struct DeviceResponse {
    pub success: bool,
    pub device: DeviceRecord,
}

/// Response for a version change
#[derive(Debug, Serialize)]
pub struct VersionUpdateResponse {
    pub success: bool,
    pub version: String,
}

/// GET /devices
/// List all registered devices in registration order
pub async fn list_devices(State(state): State<AppState>) -> Json<Vec<DeviceRecord>> {
    Json(state.registry().list().await)
}

/// POST /device
/// Register a new device at the default version
pub async fn register_device(
    State(state): State<AppState>,
    body: Result<Json<DeviceRequest>, JsonRejection>,
) -> Result<Json<DeviceResponse>, ApiError> {
    let Json(request) = body?;
    let device_id = required(request.device_id, "deviceId")?;

    let device = state
        .registry()
        .register(&device_id)
        .await
        .map_err(ApiError::from_mutation)?;

    Ok(Json(DeviceResponse {
        success: true,
        device,
    }))
}

/// POST /rename-device
/// Rename a device; its firmware blob follows the new name
pub async fn rename_device(
    State(state): State<AppState>,
    body: Result<Json<RenameDeviceRequest>, JsonRejection>,
) -> Result<Json<DeviceResponse>, ApiError> {
    let Json(request) = body?;
    let old_id = required(request.old_id, "oldId")?;
    let new_id = required(request.new_id, "newId")?;

    let device = state
        .registry()
        .rename(&old_id, &new_id)
        .await
        .map_err(ApiError::from_mutation)?;

    Ok(Json(DeviceResponse {
        success: true,
        device,
    }))
}

/// POST /update-version
/// Change the firmware version advertised to a device
pub async fn update_version(
    State(state): State<AppState>,
    body: Result<Json<UpdateVersionRequest>, JsonRejection>,
) -> Result<Json<VersionUpdateResponse>, ApiError> {
    let Json(request) = body?;
    let device_id = required(request.device_id, "deviceId")?;
    let version = required(request.version, "version")?;

    let version = state
        .registry()
        .set_version(&device_id, &version)
        .await
        .map_err(ApiError::from_mutation)?;

    Ok(Json(VersionUpdateResponse {
        success: true,
        version,
    }))
}

/// POST /delete-device
/// Remove a device and its firmware blob
pub async fn delete_device(
    State(state): State<AppState>,
    body: Result<Json<DeviceRequest>, JsonRejection>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let Json(request) = body?;
    let device_id = required(request.device_id, "deviceId")?;

    state
        .registry()
        .delete(&device_id)
        .await
        .map_err(ApiError::from_mutation)?;

    Ok(Json(SuccessResponse::ok()))
}
