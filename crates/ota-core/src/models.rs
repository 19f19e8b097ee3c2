//! Device and firmware record types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{OtaError, OtaResult};

/// Version assigned to newly registered devices
pub const DEFAULT_VERSION: &str = "1.0.0";

/// Maximum length of a device identity
pub const MAX_IDENTITY_LEN: usize = 64;

/// Maximum length of a version string
pub const MAX_VERSION_LEN: usize = 64;

/// Registry entry for one device, as stored in the checkpoint.
///
/// The checkpoint is a JSON object keyed by identity, so the identity itself
/// is not part of the entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirmwareEntry {
    /// Current firmware version advertised to the device
    pub version: String,
    /// File name of the firmware blob in the artifact store
    pub file: String,
    /// Size of the last uploaded blob in bytes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// SHA-256 of the last uploaded blob (hex)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    /// When firmware was last uploaded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl FirmwareEntry {
    /// Entry for a freshly registered device
    pub fn new(identity: &str, version: &str) -> Self {
        Self {
            version: version.to_string(),
            file: artifact_name(identity),
            size: None,
            sha256: None,
            updated_at: None,
        }
    }
}

/// Public view of a registered device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    /// Device identity
    pub id: String,
    /// Current firmware version
    pub version: String,
    /// Firmware file name
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl DeviceRecord {
    pub fn new(identity: &str, entry: &FirmwareEntry) -> Self {
        Self {
            id: identity.to_string(),
            version: entry.version.clone(),
            file: entry.file.clone(),
            size: entry.size,
            sha256: entry.sha256.clone(),
            updated_at: entry.updated_at,
        }
    }
}

/// Firmware file name for a device identity
pub fn artifact_name(identity: &str) -> String {
    format!("firmware_{}.bin", identity)
}

/// Check that an identity can be used as a registry key and file name component.
///
/// Allowed: ASCII letters, digits, `_`, `-` and `.`, not starting with `.`.
pub fn validate_identity(identity: &str) -> OtaResult<()> {
    if identity.is_empty() {
        return Err(OtaError::InvalidIdentity(
            "device ID must not be empty".to_string(),
        ));
    }
    if identity.len() > MAX_IDENTITY_LEN {
        return Err(OtaError::InvalidIdentity(format!(
            "device ID longer than {} characters",
            MAX_IDENTITY_LEN
        )));
    }
    if identity.starts_with('.') {
        return Err(OtaError::InvalidIdentity(format!(
            "device ID '{}' must not start with '.'",
            identity
        )));
    }
    if let Some(c) = identity
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')))
    {
        return Err(OtaError::InvalidIdentity(format!(
            "device ID '{}' contains invalid character {:?}",
            identity, c
        )));
    }
    Ok(())
}

/// Check that a version string is acceptable
pub fn validate_version(version: &str) -> OtaResult<()> {
    if version.trim().is_empty() {
        return Err(OtaError::InvalidInput(
            "version must not be empty".to_string(),
        ));
    }
    if version.len() > MAX_VERSION_LEN {
        return Err(OtaError::InvalidInput(format!(
            "version longer than {} characters",
            MAX_VERSION_LEN
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_name_is_deterministic() {
        assert_eq!(artifact_name("esp1"), "firmware_esp1.bin");
        assert_eq!(artifact_name("esp1"), artifact_name("esp1"));
    }

    #[test]
    fn test_validate_identity() {
        assert!(validate_identity("esp1").is_ok());
        assert!(validate_identity("light_207").is_ok());
        assert!(validate_identity("lock-208.v2").is_ok());

        assert!(validate_identity("").is_err());
        assert!(validate_identity("../etc").is_err());
        assert!(validate_identity("a/b").is_err());
        assert!(validate_identity("a\\b").is_err());
        assert!(validate_identity(".hidden").is_err());
        assert!(validate_identity("with space").is_err());
        assert!(validate_identity(&"x".repeat(MAX_IDENTITY_LEN + 1)).is_err());
    }

    #[test]
    fn test_validate_version() {
        assert!(validate_version("1.0.3").is_ok());
        assert!(validate_version("nightly-42").is_ok());
        assert!(validate_version("").is_err());
        assert!(validate_version("   ").is_err());
    }

    #[test]
    fn test_entry_serializes_without_upload_metadata() {
        let entry = FirmwareEntry::new("esp1", DEFAULT_VERSION);
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"version": "1.0.0", "file": "firmware_esp1.bin"})
        );
    }
}
