//! Response types returned by the OTA server

use bytes::Bytes;
use serde::{Deserialize, Serialize};

pub use ota_core::DeviceRecord;

/// Response carrying the affected device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceResponse {
    pub success: bool,
    pub device: DeviceRecord,
}

/// Response for a version change
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionUpdate {
    pub success: bool,
    pub version: String,
}

/// Response for a version lookup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version: String,
}

/// Response for mutations without payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Result of a firmware upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResult {
    pub success: bool,
    pub file: String,
    pub size: u64,
    pub sha256: String,
}

/// A downloaded firmware image
#[derive(Debug, Clone)]
pub struct FirmwareImage {
    /// File name from the `Content-Disposition` header
    pub file_name: Option<String>,
    pub data: Bytes,
}

/// Error body returned by the server
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default)]
    pub message: Option<String>,
}
