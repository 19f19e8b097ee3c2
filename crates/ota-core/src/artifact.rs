//! Firmware blob storage
//!
//! One blob per device lives directly under the store root, named by
//! [`artifact_name`](crate::models::artifact_name). Uploads are written to a
//! staging directory first and moved into place with a rename, so a blob is
//! never visible half-written. A device's live blob path is never left empty
//! by a pending change: backups and renames use hard links, and the old name
//! is only dropped once the caller has committed. Callers (the registry)
//! decide *when* blobs move; the store only knows how.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::error::{OtaError, OtaResult};

/// Staging directory name under the store root
pub const STAGING_DIR: &str = ".staging";

/// Check that an artifact file name is a plain name inside the store root
pub fn validate_file_name(file: &str) -> OtaResult<()> {
    let plain = !file.is_empty()
        && !file.starts_with('.')
        && !file.contains(['/', '\\', '\0'])
        && Path::new(file).file_name().map(|n| n == file).unwrap_or(false);
    if plain {
        Ok(())
    } else {
        Err(OtaError::InvalidInput(format!(
            "artifact name '{}' is not a plain file name",
            file
        )))
    }
}

/// Uploaded bytes waiting in the staging directory.
///
/// Dropping a staged artifact that was never installed removes its file.
#[derive(Debug)]
pub struct StagedArtifact {
    path: Option<PathBuf>,
    size: u64,
    sha256: String,
}

impl StagedArtifact {
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Hex SHA-256 of the staged content
    pub fn sha256(&self) -> &str {
        &self.sha256
    }
}

impl Drop for StagedArtifact {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            if let Err(e) = std::fs::remove_file(&path) {
                if e.kind() != ErrorKind::NotFound {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to remove staged upload");
                }
            }
        }
    }
}

/// Extension of staged uploads
const PART_EXT: &str = "part";
/// Extension of backups of live blobs
const BACKUP_EXT: &str = "retired";

/// A second link to a live blob, kept so that a replacement can be undone
#[derive(Debug)]
pub struct BlobBackup {
    path: PathBuf,
}

/// An opened firmware blob ready to be streamed
#[derive(Debug)]
pub struct FirmwareBlob {
    /// File name to present to the downloader
    pub file_name: String,
    /// Blob size in bytes
    pub size: u64,
    /// Open handle; keeps serving this blob even if it is replaced meanwhile
    pub file: fs::File,
}

/// Firmware blob store rooted at a directory
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
    staging: PathBuf,
}

impl ArtifactStore {
    /// Open (and create if needed) a store and recover from an interrupted commit.
    ///
    /// Staged uploads are removed. A backup whose blob is missing is moved
    /// back into place; other backups are removed.
    pub async fn open(root: impl Into<PathBuf>) -> OtaResult<Self> {
        let root = root.into();
        let staging = root.join(STAGING_DIR);
        fs::create_dir_all(&staging).await?;

        let mut removed = 0usize;
        let mut recovered = 0usize;
        let mut entries = fs::read_dir(&staging).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let path = entry.path();
            let orphaned = match backup_target(&path).filter(|file| validate_file_name(file).is_ok()) {
                Some(file) if !fs::try_exists(root.join(&file)).await? => Some(file),
                _ => None,
            };
            if let Some(file) = orphaned {
                fs::rename(&path, root.join(&file)).await?;
                tracing::warn!(file = %file, "Recovered firmware from interrupted commit");
                recovered += 1;
            } else {
                fs::remove_file(&path).await?;
                removed += 1;
            }
        }
        if removed > 0 || recovered > 0 {
            tracing::info!(removed, recovered, root = %root.display(), "Cleaned staging directory");
        }

        Ok(Self { root, staging })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of an artifact file
    pub fn path_of(&self, file: &str) -> PathBuf {
        self.root.join(file)
    }

    pub async fn exists(&self, file: &str) -> bool {
        fs::try_exists(self.path_of(file)).await.unwrap_or(false)
    }

    /// Write bytes to a new staging file and fsync them
    pub async fn stage(&self, data: &[u8]) -> OtaResult<StagedArtifact> {
        let path = self.staging.join(format!("{}.{}", Uuid::new_v4(), PART_EXT));
        let staged = StagedArtifact {
            path: Some(path.clone()),
            size: data.len() as u64,
            sha256: hex::encode(Sha256::digest(data)),
        };

        let mut file = fs::File::create(&path).await?;
        file.write_all(data).await?;
        file.flush().await?;
        file.sync_all().await?;

        tracing::debug!(path = %path.display(), size = staged.size, "Upload staged");
        Ok(staged)
    }

    /// Move a staged upload over `file`, replacing any previous blob atomically
    pub async fn install(&self, mut staged: StagedArtifact, file: &str) -> OtaResult<()> {
        let Some(from) = staged.path.as_ref() else {
            return Err(OtaError::InvalidInput("staged upload already consumed".into()));
        };
        fs::rename(from, self.path_of(file)).await?;
        staged.path = None;
        Ok(())
    }

    /// Link the blob for `file` into staging so a replacement can be undone.
    ///
    /// The blob stays in place. Returns `None` if there is no blob.
    pub async fn back_up(&self, file: &str) -> OtaResult<Option<BlobBackup>> {
        let path = self
            .staging
            .join(format!("{}.{}.{}", Uuid::new_v4(), file, BACKUP_EXT));
        match link_or_copy(&self.path_of(file), &path).await {
            Ok(()) => Ok(Some(BlobBackup { path })),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Put a backup back under `file`, replacing whatever is there
    pub async fn restore(&self, backup: BlobBackup, file: &str) -> OtaResult<()> {
        fs::rename(&backup.path, self.path_of(file)).await?;
        Ok(())
    }

    /// Drop a backup that is no longer needed
    pub async fn discard(&self, backup: BlobBackup) {
        if let Err(e) = fs::remove_file(&backup.path).await {
            tracing::warn!(path = %backup.path.display(), error = %e, "Failed to remove firmware backup");
        }
    }

    /// Delete the blob for `file` if present
    pub async fn remove(&self, file: &str) -> OtaResult<()> {
        match fs::remove_file(self.path_of(file)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Make the blob `old` reachable as `new` as well.
    ///
    /// Any blob already named `new` is replaced. Returns whether `old`
    /// existed; a missing blob is not an error. The caller finishes the move
    /// with [`remove`](Self::remove) on `old` once it has committed.
    pub async fn relocate(&self, old: &str, new: &str) -> OtaResult<bool> {
        if old == new {
            return Ok(false);
        }
        self.remove(new).await?;
        match link_or_copy(&self.path_of(old), &self.path_of(new)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Open the blob for `file`
    pub async fn open_blob(&self, file: &str) -> OtaResult<FirmwareBlob> {
        let handle = match fs::File::open(self.path_of(file)).await {
            Ok(handle) => handle,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(OtaError::BlobMissing(file.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        let size = handle.metadata().await?.len();
        Ok(FirmwareBlob {
            file_name: file.to_string(),
            size,
            file: handle,
        })
    }
}

/// Hard link `from` as `to`, copying where the filesystem has no links
async fn link_or_copy(from: &Path, to: &Path) -> std::io::Result<()> {
    match fs::hard_link(from, to).await {
        Err(e) if e.kind() == ErrorKind::Unsupported => {
            fs::copy(from, to).await?;
            Ok(())
        }
        other => other,
    }
}

/// Blob name a backup file belongs to (`<uuid>.<file>.retired`)
fn backup_target(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    let rest = name.strip_suffix(BACKUP_EXT)?.strip_suffix('.')?;
    let (_, file) = rest.split_once('.')?;
    Some(file.to_string())
}
