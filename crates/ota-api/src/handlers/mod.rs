//! HTTP request handlers for the OTA API

pub mod calibration;
pub mod devices;
pub mod firmware;
pub mod relay;

use serde::Serialize;

use crate::error::ApiError;

/// Body returned by mutations that carry no payload
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

/// Unwrap a required request field, rejecting absent or empty values
pub(crate) fn required(value: Option<String>, field: &str) -> Result<String, ApiError> {
    match value {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(ApiError::BadRequest(format!("{} is required", field))),
    }
}
