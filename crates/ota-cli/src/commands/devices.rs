//! Device registry commands

use anyhow::{Context, Result};
use ota_client::OtaClient;

use crate::output::{DeviceRow, OutputContext};

/// List all registered devices
pub async fn list(client: &OtaClient, ctx: &OutputContext) -> Result<()> {
    let devices = client.list_devices().await?;

    let rows: Vec<DeviceRow> = devices.into_iter().map(DeviceRow::from).collect();

    ctx.print(&rows);
    Ok(())
}

/// Register a new device
pub async fn register(client: &OtaClient, device_id: &str, ctx: &OutputContext) -> Result<()> {
    let device = client
        .register_device(device_id)
        .await
        .with_context(|| format!("Failed to register {}", device_id))?;

    ctx.success(&format!("Registered {}", device.id));
    ctx.print_one(&DeviceRow::from(device));
    Ok(())
}

/// Rename a device
pub async fn rename(
    client: &OtaClient,
    old_id: &str,
    new_id: &str,
    ctx: &OutputContext,
) -> Result<()> {
    let device = client
        .rename_device(old_id, new_id)
        .await
        .with_context(|| format!("Failed to rename {} to {}", old_id, new_id))?;

    ctx.success(&format!("Renamed {} to {}", old_id, device.id));
    ctx.print_one(&DeviceRow::from(device));
    Ok(())
}

/// Set the firmware version advertised to a device
pub async fn set_version(
    client: &OtaClient,
    device_id: &str,
    version: &str,
    ctx: &OutputContext,
) -> Result<()> {
    let version = client
        .update_version(device_id, version)
        .await
        .with_context(|| format!("Failed to update version of {}", device_id))?;

    ctx.success(&format!("{} now at version {}", device_id, version));
    Ok(())
}

/// Delete a device and its firmware
pub async fn delete(client: &OtaClient, device_id: &str, ctx: &OutputContext) -> Result<()> {
    client
        .delete_device(device_id)
        .await
        .with_context(|| format!("Failed to delete {}", device_id))?;

    ctx.success(&format!("Deleted {}", device_id));
    Ok(())
}
