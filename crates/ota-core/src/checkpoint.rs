//! Durable snapshot of the device registry
//!
//! The checkpoint is a pretty-printed JSON object keyed by device identity:
//!
//! ```json
//! {
//!   "esp1": { "version": "1.0.3", "file": "firmware_esp1.bin" }
//! }
//! ```
//!
//! Key order is preserved in both directions so that listings stay stable
//! across restarts.

use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::artifact::validate_file_name;
use crate::error::{OtaError, OtaResult};
use crate::models::{validate_identity, FirmwareEntry};
use crate::persist::atomic_write;

/// Ordered registry contents: identity -> entry
pub type DeviceMap = IndexMap<String, FirmwareEntry>;

/// Checkpoint file handle
#[derive(Debug, Clone)]
pub struct Checkpoint {
    path: PathBuf,
}

impl Checkpoint {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the checkpoint.
    ///
    /// Returns `Ok(None)` if the file does not exist. A file that exists but
    /// cannot be parsed, or that names unusable identities or artifact files,
    /// is an error: callers must not start with an empty registry in its place.
    pub async fn load(&self) -> OtaResult<Option<DeviceMap>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(OtaError::Checkpoint(format!(
                    "failed to read {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        let devices: DeviceMap = serde_json::from_slice(&bytes).map_err(|e| {
            OtaError::Checkpoint(format!("failed to parse {}: {}", self.path.display(), e))
        })?;

        validate_devices(&devices).map_err(|e| {
            OtaError::Checkpoint(format!("invalid {}: {}", self.path.display(), e))
        })?;

        Ok(Some(devices))
    }

    /// Replace the checkpoint with the given registry contents
    pub async fn store(&self, devices: &DeviceMap) -> OtaResult<()> {
        let data = serde_json::to_vec_pretty(devices)
            .map_err(|e| OtaError::Checkpoint(format!("failed to serialize registry: {}", e)))?;
        atomic_write(&self.path, &data).await?;
        tracing::debug!(path = %self.path.display(), devices = devices.len(), "Checkpoint written");
        Ok(())
    }
}

/// Check identities and artifact names of a loaded registry
fn validate_devices(devices: &DeviceMap) -> OtaResult<()> {
    let mut files = HashSet::new();
    for (id, entry) in devices {
        validate_identity(id)?;
        validate_file_name(&entry.file)?;
        if !files.insert(entry.file.as_str()) {
            return Err(OtaError::AlreadyExists(format!(
                "artifact '{}' claimed by more than one device",
                entry.file
            )));
        }
    }
    Ok(())
}
