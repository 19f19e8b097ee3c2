//! Storage, relay and seed configuration

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Where registry state and firmware blobs live
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the registry checkpoint and calibration pairs
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Directory holding firmware blobs
    #[serde(default = "default_firmware_dir")]
    pub firmware_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            firmware_dir: default_firmware_dir(),
        }
    }
}

impl StorageConfig {
    /// Registry checkpoint file
    pub fn checkpoint_path(&self) -> PathBuf {
        self.data_dir.join("devices.json")
    }

    /// Calibration pairs file
    pub fn calibration_path(&self) -> PathBuf {
        self.data_dir.join("calib_pairs.json")
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_firmware_dir() -> PathBuf {
    PathBuf::from("firmware")
}

/// UDP relay settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Port devices listen on for commands, used when the target has no port
    #[serde(default = "default_device_port")]
    pub device_port: u16,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            device_port: default_device_port(),
        }
    }
}

fn default_device_port() -> u16 {
    4210
}

/// Device registered when the registry starts without a checkpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedDevice {
    pub id: String,
    #[serde(default = "default_seed_version")]
    pub version: String,
}

impl SeedDevice {
    pub fn new(id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: version.into(),
        }
    }
}

fn default_seed_version() -> String {
    crate::models::DEFAULT_VERSION.to_string()
}

/// Devices seeded when no configuration overrides them
pub fn default_seed() -> Vec<SeedDevice> {
    vec![
        SeedDevice::new("esp1", "1.0.3"),
        SeedDevice::new("esp2", "1.0.3"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_paths() {
        let storage = StorageConfig {
            data_dir: PathBuf::from("/var/lib/ota"),
            firmware_dir: PathBuf::from("/srv/firmware"),
        };
        assert_eq!(
            storage.checkpoint_path(),
            PathBuf::from("/var/lib/ota/devices.json")
        );
        assert_eq!(
            storage.calibration_path(),
            PathBuf::from("/var/lib/ota/calib_pairs.json")
        );
    }

    #[test]
    fn test_seed_version_defaults() {
        let seed: SeedDevice = serde_json::from_str(r#"{"id": "esp3"}"#).unwrap();
        assert_eq!(seed.version, "1.0.0");
    }
}
