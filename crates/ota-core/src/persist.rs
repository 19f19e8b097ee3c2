//! Atomic file replacement
//!
//! Callers must serialize writers of the same path: the temp file name is
//! derived from the target.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Temp file used while replacing `path`
fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| OsString::from("state"));
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write data to a file atomically using temp file + fsync + rename.
///
/// Readers see either the old content or the new content, never a mix.
pub async fn atomic_write(path: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }

    let temp = temp_path(path);
    let mut file = fs::File::create(&temp).await?;
    if let Err(e) = write_and_sync(&mut file, data).await {
        drop(file);
        let _ = fs::remove_file(&temp).await;
        return Err(e);
    }
    drop(file);

    if let Err(e) = fs::rename(&temp, path).await {
        let _ = fs::remove_file(&temp).await;
        return Err(e);
    }
    Ok(())
}

async fn write_and_sync(file: &mut fs::File, data: &[u8]) -> io::Result<()> {
    file.write_all(data).await?;
    file.flush().await?;
    file.sync_all().await
}
