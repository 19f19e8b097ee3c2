//! Firmware commands - version lookup, upload and download

use anyhow::{Context, Result};
use ota_client::OtaClient;
use std::path::{Path, PathBuf};

use crate::output::OutputContext;

/// Show the version a device would see when polling
pub async fn version(client: &OtaClient, device_id: &str, ctx: &OutputContext) -> Result<()> {
    let version = client.get_version(device_id).await?;

    ctx.print_kv(&[("device", device_id.to_string()), ("version", version)]);
    Ok(())
}

/// Upload a firmware image for a device
pub async fn upload(
    client: &OtaClient,
    device_id: &str,
    file_path: &Path,
    ctx: &OutputContext,
) -> Result<()> {
    ctx.info(&format!("Reading firmware from {}...", file_path.display()));
    let firmware = std::fs::read(file_path)
        .with_context(|| format!("Failed to read firmware file: {}", file_path.display()))?;

    ctx.info(&format!("Uploading {} bytes...", firmware.len()));
    let receipt = client
        .upload_firmware(device_id, firmware)
        .await
        .context("Failed to upload firmware")?;

    ctx.success(&format!("Uploaded firmware for {}", device_id));
    ctx.print_kv(&[
        ("file", receipt.file),
        ("size", receipt.size.to_string()),
        ("sha256", receipt.sha256),
    ]);
    Ok(())
}

/// Download a device's firmware image
pub async fn download(
    client: &OtaClient,
    device_id: &str,
    out: Option<&Path>,
    ctx: &OutputContext,
) -> Result<()> {
    let image = client
        .download_firmware(device_id)
        .await
        .with_context(|| format!("Failed to download firmware for {}", device_id))?;

    let path = match out {
        Some(path) => path.to_path_buf(),
        None => default_output_path(image.file_name.as_deref(), device_id),
    };
    if path.exists() {
        ctx.warn(&format!("Overwriting {}", path.display()));
    }
    std::fs::write(&path, &image.data)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    ctx.success(&format!(
        "Saved {} bytes to {}",
        image.data.len(),
        path.display()
    ));
    Ok(())
}

/// File in the current directory named after the server's suggestion.
///
/// Only the last path component is used, so a name like `../x` stays local.
fn default_output_path(suggested: Option<&str>, device_id: &str) -> PathBuf {
    let fallback = format!("firmware_{}.bin", device_id);
    let path = [suggested, Some(fallback.as_str())]
        .into_iter()
        .flatten()
        .find_map(|name| Path::new(name).file_name().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("firmware.bin"));
    path
}
