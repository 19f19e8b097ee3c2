//! Device registry: the authoritative identity -> firmware map
//!
//! All mutations run under one write lock and follow the same sequence:
//! validate, prepare blobs, write the next state to the checkpoint, and only
//! then install it in memory and drop blobs nothing refers to any more. A
//! failed checkpoint write undoes the blob preparation, so memory, checkpoint
//! and artifact store never disagree after a call returns. Blob preparation
//! never empties a path the current checkpoint points at, so a crash at any
//! step leaves every recorded blob in place. Readers take the read lock and
//! see either the state before or after a mutation.

use chrono::Utc;
use tokio::sync::RwLock;

use crate::artifact::{ArtifactStore, FirmwareBlob};
use crate::checkpoint::{Checkpoint, DeviceMap};
use crate::config::SeedDevice;
use crate::error::{OtaError, OtaResult};
use crate::models::{
    artifact_name, validate_identity, validate_version, DeviceRecord, FirmwareEntry,
    DEFAULT_VERSION,
};

/// Outcome of a firmware upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    pub id: String,
    pub file: String,
    pub size: u64,
    pub sha256: String,
}

/// Registry of devices and their firmware
#[derive(Debug)]
pub struct DeviceRegistry {
    devices: RwLock<DeviceMap>,
    checkpoint: Checkpoint,
    artifacts: ArtifactStore,
}

impl DeviceRegistry {
    /// Open the registry from its checkpoint, or seed it if there is none.
    ///
    /// A checkpoint that exists but cannot be loaded is an error.
    pub async fn open(
        checkpoint: Checkpoint,
        artifacts: ArtifactStore,
        seed: &[SeedDevice],
    ) -> OtaResult<Self> {
        let devices = match checkpoint.load().await? {
            Some(devices) => {
                tracing::info!(
                    path = %checkpoint.path().display(),
                    devices = devices.len(),
                    "Loaded device registry"
                );
                devices
            }
            None => {
                let devices = seed_devices(seed)?;
                checkpoint.store(&devices).await?;
                tracing::info!(
                    path = %checkpoint.path().display(),
                    devices = devices.len(),
                    "No checkpoint found, seeded device registry"
                );
                devices
            }
        };

        for (id, entry) in &devices {
            if !artifacts.exists(&entry.file).await {
                tracing::warn!(device_id = %id, file = %entry.file, "No firmware uploaded yet");
            }
        }

        Ok(Self {
            devices: RwLock::new(devices),
            checkpoint,
            artifacts,
        })
    }

    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    pub fn checkpoint(&self) -> &Checkpoint {
        &self.checkpoint
    }

    /// Register a new device with the default version
    pub async fn register(&self, identity: &str) -> OtaResult<DeviceRecord> {
        validate_identity(identity)?;

        let mut devices = self.devices.write().await;
        if devices.contains_key(identity) {
            return Err(OtaError::AlreadyExists(format!(
                "device '{}' is already registered",
                identity
            )));
        }

        let entry = FirmwareEntry::new(identity, DEFAULT_VERSION);
        ensure_artifact_free(&devices, &entry.file, None)?;
        // Left over from a deleted device; never uploaded for this one
        self.artifacts.remove(&entry.file).await?;

        let mut next = devices.clone();
        next.insert(identity.to_string(), entry.clone());
        self.checkpoint.store(&next).await?;
        *devices = next;

        tracing::info!(device_id = %identity, file = %entry.file, "Device registered");
        Ok(DeviceRecord::new(identity, &entry))
    }

    /// Rename a device, moving its firmware blob along with it.
    ///
    /// The renamed record keeps its position in listings.
    pub async fn rename(&self, old: &str, new: &str) -> OtaResult<DeviceRecord> {
        validate_identity(new)?;

        let mut devices = self.devices.write().await;
        let current = devices
            .get(old)
            .cloned()
            .ok_or_else(|| OtaError::NotFound(old.to_string()))?;
        if devices.contains_key(new) {
            return Err(OtaError::AlreadyExists(format!(
                "device '{}' is already registered",
                new
            )));
        }

        let renamed = FirmwareEntry {
            file: artifact_name(new),
            ..current.clone()
        };
        ensure_artifact_free(&devices, &renamed.file, Some(old))?;

        // Replaces any stale blob under the new name
        let linked = self.artifacts.relocate(&current.file, &renamed.file).await?;

        let next: DeviceMap = devices
            .iter()
            .map(|(id, entry)| {
                if id == old {
                    (new.to_string(), renamed.clone())
                } else {
                    (id.clone(), entry.clone())
                }
            })
            .collect();

        if let Err(e) = self.checkpoint.store(&next).await {
            if let Err(undo) = self.artifacts.remove(&renamed.file).await {
                tracing::error!(file = %renamed.file, error = %undo, "Failed to unlink firmware after checkpoint failure");
            }
            return Err(e);
        }
        *devices = next;

        if linked {
            if let Err(e) = self.artifacts.remove(&current.file).await {
                tracing::warn!(file = %current.file, error = %e, "Failed to remove firmware under old name");
            }
        }

        tracing::info!(old_id = %old, new_id = %new, moved_blob = linked, "Device renamed");
        Ok(DeviceRecord::new(new, &renamed))
    }

    /// Set the firmware version advertised to a device
    pub async fn set_version(&self, identity: &str, version: &str) -> OtaResult<String> {
        validate_version(version)?;

        let mut devices = self.devices.write().await;
        let current = devices
            .get(identity)
            .ok_or_else(|| OtaError::NotFound(identity.to_string()))?;
        if current.version == version {
            return Ok(version.to_string());
        }

        let mut next = devices.clone();
        if let Some(entry) = next.get_mut(identity) {
            entry.version = version.to_string();
        }
        self.checkpoint.store(&next).await?;
        *devices = next;

        tracing::info!(device_id = %identity, version = %version, "Firmware version updated");
        Ok(version.to_string())
    }

    /// Look up one device
    pub async fn get(&self, identity: &str) -> OtaResult<DeviceRecord> {
        let devices = self.devices.read().await;
        devices
            .get(identity)
            .map(|entry| DeviceRecord::new(identity, entry))
            .ok_or_else(|| OtaError::NotFound(identity.to_string()))
    }

    /// Snapshot of all devices in insertion order
    pub async fn list(&self) -> Vec<DeviceRecord> {
        let devices = self.devices.read().await;
        devices
            .iter()
            .map(|(id, entry)| DeviceRecord::new(id, entry))
            .collect()
    }

    /// Remove a device and its firmware blob
    pub async fn delete(&self, identity: &str) -> OtaResult<DeviceRecord> {
        let mut devices = self.devices.write().await;
        let current = devices
            .get(identity)
            .cloned()
            .ok_or_else(|| OtaError::NotFound(identity.to_string()))?;

        let mut next = devices.clone();
        next.shift_remove(identity);
        self.checkpoint.store(&next).await?;
        *devices = next;

        if let Err(e) = self.artifacts.remove(&current.file).await {
            tracing::warn!(file = %current.file, error = %e, "Failed to remove firmware of deleted device");
        }

        tracing::info!(device_id = %identity, "Device deleted");
        Ok(DeviceRecord::new(identity, &current))
    }

    /// Replace a device's firmware blob.
    ///
    /// The bytes are staged without holding the registry lock; only the
    /// final move and metadata update are serialized with other mutations.
    pub async fn put_artifact(&self, identity: &str, data: &[u8]) -> OtaResult<UploadReceipt> {
        if !self.devices.read().await.contains_key(identity) {
            return Err(OtaError::UnknownDevice(identity.to_string()));
        }

        let staged = self.artifacts.stage(data).await?;
        let size = staged.size();
        let sha256 = staged.sha256().to_string();

        let mut devices = self.devices.write().await;
        // The device may have been renamed or deleted while staging
        let current = devices
            .get(identity)
            .cloned()
            .ok_or_else(|| OtaError::UnknownDevice(identity.to_string()))?;

        let previous = self.artifacts.back_up(&current.file).await?;
        if let Err(e) = self.artifacts.install(staged, &current.file).await {
            if let Some(previous) = previous {
                self.artifacts.discard(previous).await;
            }
            return Err(e);
        }

        let mut next = devices.clone();
        if let Some(entry) = next.get_mut(identity) {
            entry.size = Some(size);
            entry.sha256 = Some(sha256.clone());
            entry.updated_at = Some(Utc::now());
        }

        if let Err(e) = self.checkpoint.store(&next).await {
            let rollback = match previous {
                Some(previous) => self.artifacts.restore(previous, &current.file).await,
                None => self.artifacts.remove(&current.file).await,
            };
            if let Err(undo) = rollback {
                tracing::error!(file = %current.file, error = %undo, "Failed to roll back firmware upload");
            }
            return Err(e);
        }
        *devices = next;
        drop(devices);

        if let Some(previous) = previous {
            self.artifacts.discard(previous).await;
        }

        tracing::info!(
            device_id = %identity,
            file = %current.file,
            size,
            sha256 = %sha256,
            "Firmware uploaded"
        );

        Ok(UploadReceipt {
            id: identity.to_string(),
            file: current.file,
            size,
            sha256,
        })
    }

    /// Open a device's firmware blob for download
    pub async fn get_artifact(&self, identity: &str) -> OtaResult<FirmwareBlob> {
        let devices = self.devices.read().await;
        let entry = devices
            .get(identity)
            .ok_or_else(|| OtaError::UnknownDevice(identity.to_string()))?;
        self.artifacts.open_blob(&entry.file).await
    }
}

/// Build the initial registry from configured seed devices
fn seed_devices(seed: &[SeedDevice]) -> OtaResult<DeviceMap> {
    let mut devices = DeviceMap::new();
    for device in seed {
        validate_identity(&device.id)?;
        validate_version(&device.version)?;
        if devices.contains_key(&device.id) {
            return Err(OtaError::AlreadyExists(format!(
                "seed device '{}' listed twice",
                device.id
            )));
        }
        devices.insert(
            device.id.clone(),
            FirmwareEntry::new(&device.id, &device.version),
        );
    }
    Ok(devices)
}

/// Fail if another device (other than `except`) already uses `file`
fn ensure_artifact_free(devices: &DeviceMap, file: &str, except: Option<&str>) -> OtaResult<()> {
    let owner = devices
        .iter()
        .find(|(id, entry)| entry.file == file && Some(id.as_str()) != except);
    match owner {
        Some((id, _)) => Err(OtaError::AlreadyExists(format!(
            "artifact '{}' is already used by device '{}'",
            file, id
        ))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;

    async fn open_in(dir: &TempDir, seed: &[SeedDevice]) -> DeviceRegistry {
        let checkpoint = Checkpoint::new(dir.path().join("devices.json"));
        let artifacts = ArtifactStore::open(dir.path().join("firmware")).await.unwrap();
        DeviceRegistry::open(checkpoint, artifacts, seed).await.unwrap()
    }

    async fn read_artifact(registry: &DeviceRegistry, id: &str) -> Vec<u8> {
        let mut blob = registry.get_artifact(id).await.unwrap();
        let mut buf = Vec::new();
        blob.file.read_to_end(&mut buf).await.unwrap();
        buf
    }

    #[tokio::test]
    async fn test_seeds_when_no_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let seed = vec![SeedDevice::new("esp1", "1.0.3"), SeedDevice::new("esp2", "1.0.3")];
        let registry = open_in(&dir, &seed).await;

        let ids: Vec<String> = registry.list().await.into_iter().map(|d| d.id).collect();
        assert_eq!(ids, vec!["esp1", "esp2"]);
        assert!(dir.path().join("devices.json").exists());
    }

    #[tokio::test]
    async fn test_duplicate_seed_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let checkpoint = Checkpoint::new(dir.path().join("devices.json"));
        let artifacts = ArtifactStore::open(dir.path().join("firmware")).await.unwrap();
        let seed = vec![SeedDevice::new("esp1", "1"), SeedDevice::new("esp1", "2")];

        assert!(DeviceRegistry::open(checkpoint, artifacts, &seed).await.is_err());
    }

    #[tokio::test]
    async fn test_register_then_get() {
        let dir = tempfile::tempdir().unwrap();
        let registry = open_in(&dir, &[]).await;

        let created = registry.register("light_207").await.unwrap();
        assert_eq!(created.version, DEFAULT_VERSION);
        assert_eq!(created.file, "firmware_light_207.bin");

        let fetched = registry.get("light_207").await.unwrap();
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn test_register_duplicate_leaves_registry_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let registry = open_in(&dir, &[]).await;
        registry.register("esp1").await.unwrap();
        registry.set_version("esp1", "2.0.0").await.unwrap();
        let before = registry.list().await;

        let err = registry.register("esp1").await.unwrap_err();
        assert!(matches!(err, OtaError::AlreadyExists(_)));
        assert_eq!(registry.list().await, before);
    }

    #[tokio::test]
    async fn test_register_invalid_identity() {
        let dir = tempfile::tempdir().unwrap();
        let registry = open_in(&dir, &[]).await;

        assert!(matches!(
            registry.register("").await.unwrap_err(),
            OtaError::InvalidIdentity(_)
        ));
        assert!(matches!(
            registry.register("../evil").await.unwrap_err(),
            OtaError::InvalidIdentity(_)
        ));
        assert!(registry.list().await.is_empty());
    }

    #[tokio::test]
    async fn test_rename_carries_version_and_blob() {
        let dir = tempfile::tempdir().unwrap();
        let registry = open_in(&dir, &[]).await;
        registry.register("a").await.unwrap();
        registry.set_version("a", "3.1.4").await.unwrap();
        registry.put_artifact("a", b"firmware-a").await.unwrap();

        let renamed = registry.rename("a", "b").await.unwrap();
        assert_eq!(renamed.id, "b");
        assert_eq!(renamed.version, "3.1.4");
        assert_eq!(renamed.file, "firmware_b.bin");

        assert!(matches!(
            registry.get("a").await.unwrap_err(),
            OtaError::NotFound(_)
        ));
        assert_eq!(registry.get("b").await.unwrap(), renamed);
        assert_eq!(read_artifact(&registry, "b").await, b"firmware-a");
        assert!(!registry.artifacts().exists("firmware_a.bin").await);
    }

    #[tokio::test]
    async fn test_rename_without_blob() {
        let dir = tempfile::tempdir().unwrap();
        let registry = open_in(&dir, &[]).await;
        registry.register("a").await.unwrap();

        let renamed = registry.rename("a", "b").await.unwrap();
        assert_eq!(renamed.file, "firmware_b.bin");
        assert!(matches!(
            registry.get_artifact("b").await.unwrap_err(),
            OtaError::BlobMissing(_)
        ));
    }

    #[tokio::test]
    async fn test_rename_keeps_position() {
        let dir = tempfile::tempdir().unwrap();
        let registry = open_in(&dir, &[]).await;
        for id in ["a", "b", "c"] {
            registry.register(id).await.unwrap();
        }

        registry.rename("b", "z").await.unwrap();
        let ids: Vec<String> = registry.list().await.into_iter().map(|d| d.id).collect();
        assert_eq!(ids, vec!["a", "z", "c"]);
    }

    #[tokio::test]
    async fn test_rename_errors() {
        let dir = tempfile::tempdir().unwrap();
        let registry = open_in(&dir, &[]).await;
        registry.register("a").await.unwrap();
        registry.register("b").await.unwrap();

        assert!(matches!(
            registry.rename("missing", "c").await.unwrap_err(),
            OtaError::NotFound(_)
        ));
        assert!(matches!(
            registry.rename("a", "b").await.unwrap_err(),
            OtaError::AlreadyExists(_)
        ));
        assert!(matches!(
            registry.rename("a", "bad/name").await.unwrap_err(),
            OtaError::InvalidIdentity(_)
        ));
        assert_eq!(registry.list().await.len(), 2);
    }

    #[tokio::test]
    async fn test_set_version() {
        let dir = tempfile::tempdir().unwrap();
        let registry = open_in(&dir, &[]).await;
        registry.register("esp1").await.unwrap();

        assert_eq!(registry.set_version("esp1", "1.2.0").await.unwrap(), "1.2.0");
        let once = registry.list().await;
        assert_eq!(registry.set_version("esp1", "1.2.0").await.unwrap(), "1.2.0");
        assert_eq!(registry.list().await, once);

        assert!(matches!(
            registry.set_version("nope", "1.2.0").await.unwrap_err(),
            OtaError::NotFound(_)
        ));
        assert!(matches!(
            registry.set_version("esp1", "").await.unwrap_err(),
            OtaError::InvalidInput(_)
        ));
    }

    #[tokio::test]
    async fn test_upload_then_download() {
        let dir = tempfile::tempdir().unwrap();
        let registry = open_in(&dir, &[]).await;
        registry.register("esp1").await.unwrap();

        let receipt = registry.put_artifact("esp1", b"v1 image").await.unwrap();
        assert_eq!(receipt.size, 8);
        assert_eq!(receipt.file, "firmware_esp1.bin");

        let record = registry.get("esp1").await.unwrap();
        assert_eq!(record.size, Some(8));
        assert_eq!(record.sha256.as_deref(), Some(receipt.sha256.as_str()));
        assert!(record.updated_at.is_some());

        registry.put_artifact("esp1", b"v2 image, longer").await.unwrap();
        assert_eq!(read_artifact(&registry, "esp1").await, b"v2 image, longer");
    }

    #[tokio::test]
    async fn test_upload_unknown_device() {
        let dir = tempfile::tempdir().unwrap();
        let registry = open_in(&dir, &[]).await;

        assert!(matches!(
            registry.put_artifact("ghost", b"data").await.unwrap_err(),
            OtaError::UnknownDevice(_)
        ));
        assert!(!registry.artifacts().exists("firmware_ghost.bin").await);
    }

    #[tokio::test]
    async fn test_download_unknown_device() {
        let dir = tempfile::tempdir().unwrap();
        let registry = open_in(&dir, &[]).await;

        assert!(matches!(
            registry.get_artifact("ghost").await.unwrap_err(),
            OtaError::UnknownDevice(_)
        ));
    }

    #[tokio::test]
    async fn test_delete_removes_record_and_blob() {
        let dir = tempfile::tempdir().unwrap();
        let registry = open_in(&dir, &[]).await;
        registry.register("esp1").await.unwrap();
        registry.put_artifact("esp1", b"image").await.unwrap();

        let removed = registry.delete("esp1").await.unwrap();
        assert_eq!(removed.id, "esp1");
        assert!(registry.get("esp1").await.is_err());
        assert!(!registry.artifacts().exists("firmware_esp1.bin").await);

        assert!(matches!(
            registry.delete("esp1").await.unwrap_err(),
            OtaError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_interrupted_upload_keeps_recorded_blob() {
        let dir = tempfile::tempdir().unwrap();
        {
            let registry = open_in(&dir, &[SeedDevice::new("esp1", "1.0.3")]).await;
            registry.put_artifact("esp1", b"13 byte image").await.unwrap();

            // Process dies after backing up the live blob, before installing
            let backup = registry.artifacts().back_up("firmware_esp1.bin").await.unwrap();
            std::mem::forget(backup);
        }

        let reopened = open_in(&dir, &[]).await;
        assert_eq!(reopened.get("esp1").await.unwrap().size, Some(13));
        assert_eq!(read_artifact(&reopened, "esp1").await, b"13 byte image");
    }

    #[tokio::test]
    async fn test_register_ignores_stale_blob() {
        let dir = tempfile::tempdir().unwrap();
        let registry = open_in(&dir, &[]).await;
        std::fs::write(
            registry.artifacts().path_of("firmware_esp7.bin"),
            b"left behind",
        )
        .unwrap();

        registry.register("esp7").await.unwrap();
        assert!(matches!(
            registry.get_artifact("esp7").await.unwrap_err(),
            OtaError::BlobMissing(_)
        ));
    }

    #[tokio::test]
    async fn test_rename_without_blob_ignores_stale_blob() {
        let dir = tempfile::tempdir().unwrap();
        let registry = open_in(&dir, &[]).await;
        registry.register("a").await.unwrap();
        std::fs::write(registry.artifacts().path_of("firmware_b.bin"), b"left behind").unwrap();

        registry.rename("a", "b").await.unwrap();
        assert!(matches!(
            registry.get_artifact("b").await.unwrap_err(),
            OtaError::BlobMissing(_)
        ));
    }

    #[tokio::test]
    async fn test_rename_with_blob_replaces_stale_blob() {
        let dir = tempfile::tempdir().unwrap();
        let registry = open_in(&dir, &[]).await;
        registry.register("a").await.unwrap();
        registry.put_artifact("a", b"uploaded for a").await.unwrap();
        std::fs::write(registry.artifacts().path_of("firmware_b.bin"), b"left behind").unwrap();

        registry.rename("a", "b").await.unwrap();
        assert_eq!(read_artifact(&registry, "b").await, b"uploaded for a");
        assert!(!registry.artifacts().exists("firmware_a.bin").await);
    }

    #[tokio::test]
    async fn test_reopen_restores_state() {
        let dir = tempfile::tempdir().unwrap();
        let before = {
            let registry = open_in(&dir, &[SeedDevice::new("esp1", "1.0.3")]).await;
            registry.register("esp2").await.unwrap();
            registry.set_version("esp2", "2.0.0").await.unwrap();
            registry.put_artifact("esp2", b"image").await.unwrap();
            registry.rename("esp1", "esp9").await.unwrap();
            registry.list().await
        };

        // Seeds are ignored once a checkpoint exists
        let reopened = open_in(&dir, &[SeedDevice::new("other", "0.1")]).await;
        assert_eq!(reopened.list().await, before);
    }

    #[tokio::test]
    async fn test_corrupt_checkpoint_fails_open() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("devices.json"), b"garbage").unwrap();

        let checkpoint = Checkpoint::new(dir.path().join("devices.json"));
        let artifacts = ArtifactStore::open(dir.path().join("firmware")).await.unwrap();
        let err = DeviceRegistry::open(checkpoint, artifacts, &[SeedDevice::new("esp1", "1")])
            .await
            .unwrap_err();
        assert!(matches!(err, OtaError::Checkpoint(_)));
        // The corrupt file is left for the operator to inspect
        assert_eq!(
            std::fs::read(dir.path().join("devices.json")).unwrap(),
            b"garbage"
        );
    }

    #[tokio::test]
    async fn test_failed_checkpoint_leaves_state_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let registry = open_in(&dir, &[]).await;
        registry.register("a").await.unwrap();
        registry.put_artifact("a", b"image").await.unwrap();
        let before = registry.list().await;

        // A directory where the temp file should go makes every write fail
        std::fs::create_dir(dir.path().join("devices.json.tmp")).unwrap();

        assert!(registry.register("b").await.is_err());
        assert!(registry.rename("a", "c").await.is_err());
        assert!(registry.put_artifact("a", b"other").await.is_err());
        assert!(registry.delete("a").await.is_err());

        assert_eq!(registry.list().await, before);
        assert_eq!(read_artifact(&registry, "a").await, b"image");
        assert!(!registry.artifacts().exists("firmware_c.bin").await);
    }
}
