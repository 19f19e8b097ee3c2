//! OTA HTTP Client implementation

use std::time::Duration;

use reqwest::{header, Client, StatusCode};
use serde_json::Value;
use tracing::{debug, instrument};
use url::Url;

use crate::error::{OtaClientError, Result};
use crate::types::*;

/// Default request timeout
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// Default connection timeout
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// OTA server REST client
#[derive(Debug, Clone)]
pub struct OtaClient {
    client: Client,
    base_url: Url,
}

impl OtaClient {
    /// Create a new OTA client
    ///
    /// # Arguments
    /// * `base_url` - Base URL of the OTA server (e.g., "http://localhost:5000")
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_config(base_url, DEFAULT_TIMEOUT, DEFAULT_CONNECT_TIMEOUT)
    }

    /// Create a new OTA client with custom timeouts
    pub fn with_config(
        base_url: &str,
        timeout: Duration,
        connect_timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .build()?;

        let base_url = Url::parse(base_url)?;

        Ok(Self { client, base_url })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // =========================================================================
    // Health Check
    // =========================================================================

    /// Check server health
    #[instrument(skip(self))]
    pub async fn health(&self) -> Result<String> {
        let url = self.base_url.join("/health")?;
        let response = self.client.get(url).send().await?;

        if response.status().is_success() {
            Ok(response.text().await?)
        } else {
            Err(self.extract_error(response).await)
        }
    }

    // =========================================================================
    // Device Registry
    // =========================================================================

    /// List all registered devices
    #[instrument(skip(self))]
    pub async fn list_devices(&self) -> Result<Vec<DeviceRecord>> {
        let url = self.base_url.join("/devices")?;
        debug!("Listing devices from {}", url);

        let response = self.client.get(url).send().await?;
        self.handle_response(response).await
    }

    /// Register a new device
    #[instrument(skip(self))]
    pub async fn register_device(&self, device_id: &str) -> Result<DeviceRecord> {
        let url = self.base_url.join("/device")?;
        let body = serde_json::json!({ "deviceId": device_id });

        let response = self.client.post(url).json(&body).send().await?;
        self.handle_response::<DeviceResponse>(response)
            .await
            .map(|r| r.device)
    }

    /// Rename a device
    #[instrument(skip(self))]
    pub async fn rename_device(&self, old_id: &str, new_id: &str) -> Result<DeviceRecord> {
        let url = self.base_url.join("/rename-device")?;
        let body = serde_json::json!({ "oldId": old_id, "newId": new_id });

        let response = self.client.post(url).json(&body).send().await?;
        self.handle_response::<DeviceResponse>(response)
            .await
            .map(|r| r.device)
    }

    /// Set the firmware version advertised to a device
    #[instrument(skip(self))]
    pub async fn update_version(&self, device_id: &str, version: &str) -> Result<String> {
        let url = self.base_url.join("/update-version")?;
        let body = serde_json::json!({ "deviceId": device_id, "version": version });

        let response = self.client.post(url).json(&body).send().await?;
        self.handle_response::<VersionUpdate>(response)
            .await
            .map(|r| r.version)
    }

    /// Delete a device and its firmware
    #[instrument(skip(self))]
    pub async fn delete_device(&self, device_id: &str) -> Result<()> {
        let url = self.base_url.join("/delete-device")?;
        let body = serde_json::json!({ "deviceId": device_id });

        let response = self.client.post(url).json(&body).send().await?;
        self.handle_response::<SuccessResponse>(response)
            .await
            .map(|_| ())
    }

    // =========================================================================
    // Firmware
    // =========================================================================

    /// Current firmware version of a device, as a device would poll it
    #[instrument(skip(self))]
    pub async fn get_version(&self, device_id: &str) -> Result<String> {
        let url = self.device_url("/version", device_id)?;

        let response = self.client.get(url).send().await?;
        self.handle_response::<VersionInfo>(response)
            .await
            .map(|r| r.version)
    }

    /// Upload a firmware image for a device
    #[instrument(skip(self, data), fields(size = data.len()))]
    pub async fn upload_firmware(&self, device_id: &str, data: Vec<u8>) -> Result<UploadResult> {
        let url = self.device_url("/upload-firmware", device_id)?;

        let response = self
            .client
            .post(url)
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .body(data)
            .send()
            .await?;
        self.handle_response(response).await
    }

    /// Download a device's firmware image
    #[instrument(skip(self))]
    pub async fn download_firmware(&self, device_id: &str) -> Result<FirmwareImage> {
        let url = self.device_url("/firmware", device_id)?;

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(self.extract_error(response).await);
        }

        let file_name = response
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(attachment_file_name);
        let data = response.bytes().await?;
        debug!(size = data.len(), "Firmware downloaded");

        Ok(FirmwareImage { file_name, data })
    }

    // =========================================================================
    // Operator Tooling
    // =========================================================================

    /// Ask the server to relay a UDP message to a device
    #[instrument(skip(self))]
    pub async fn relay(&self, ip: &str, msg: &str) -> Result<()> {
        let mut url = self.base_url.join("/api/udp")?;
        url.query_pairs_mut()
            .append_pair("ip", ip)
            .append_pair("msg", msg);

        let response = self.client.get(url).send().await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(self.extract_error(response).await)
        }
    }

    /// Saved calibration pairs
    #[instrument(skip(self))]
    pub async fn get_calibration_pairs(&self) -> Result<Vec<Value>> {
        let url = self.base_url.join("/api/calib-pairs")?;

        let response = self.client.get(url).send().await?;
        self.handle_response(response).await
    }

    /// Replace the saved calibration pairs
    #[instrument(skip(self, pairs), fields(count = pairs.len()))]
    pub async fn save_calibration_pairs(&self, pairs: &[Value]) -> Result<()> {
        let url = self.base_url.join("/api/calib-pairs")?;

        let response = self.client.post(url).json(pairs).send().await?;
        self.handle_response::<SuccessResponse>(response)
            .await
            .map(|_| ())
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn device_url(&self, path: &str, device_id: &str) -> Result<Url> {
        let mut url = self.base_url.join(path)?;
        url.query_pairs_mut().append_pair("deviceId", device_id);
        Ok(url)
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();

        if status.is_success() {
            response
                .json()
                .await
                .map_err(|e| OtaClientError::ParseError(e.to_string()))
        } else {
            Err(self.extract_error_from_status(response, status).await)
        }
    }

    /// Extract error from failed response
    async fn extract_error(&self, response: reqwest::Response) -> OtaClientError {
        let status = response.status();
        self.extract_error_from_status(response, status).await
    }

    async fn extract_error_from_status(
        &self,
        response: reqwest::Response,
        status: StatusCode,
    ) -> OtaClientError {
        let message = match response.json::<ErrorResponse>().await {
            Ok(err) => err.message.unwrap_or(err.error),
            Err(_) => format!("HTTP {}", status),
        };

        match status {
            StatusCode::NOT_FOUND => OtaClientError::NotFound(message),
            StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => OtaClientError::Timeout,
            _ => OtaClientError::server_error(status.as_u16(), message),
        }
    }
}

/// File name from an `attachment; filename="..."` header value
fn attachment_file_name(disposition: &str) -> Option<String> {
    disposition.split(';').find_map(|part| {
        part.trim()
            .strip_prefix("filename=")
            .map(|name| name.trim_matches('"').to_string())
            .filter(|name| !name.is_empty())
    })
}
