//! Sensor calibration pairs shared by operator tooling
//!
//! The pairs are opaque JSON values; the service only guarantees that a saved
//! array is read back intact.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tokio::sync::Mutex;

use crate::error::{OtaError, OtaResult};
use crate::persist::atomic_write;

#[derive(Debug)]
pub struct CalibrationStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl CalibrationStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load saved pairs; empty if nothing was saved yet
    pub async fn load(&self) -> OtaResult<Vec<Value>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&bytes).map_err(|e| {
            OtaError::Calibration(format!("failed to parse {}: {}", self.path.display(), e))
        })
    }

    /// Replace saved pairs
    pub async fn save(&self, pairs: &[Value]) -> OtaResult<()> {
        let data = serde_json::to_vec_pretty(pairs)
            .map_err(|e| OtaError::InvalidInput(format!("unserializable pairs: {}", e)))?;
        let _guard = self.write_lock.lock().await;
        atomic_write(&self.path, &data).await?;
        tracing::info!(count = pairs.len(), "Calibration pairs saved");
        Ok(())
    }
}
