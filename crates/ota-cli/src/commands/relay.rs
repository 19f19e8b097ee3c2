//! Relay command - send a UDP command to a device through the server

use anyhow::{Context, Result};
use ota_client::OtaClient;

use crate::output::OutputContext;

/// Relay `msg` to the device at `ip`
pub async fn relay(client: &OtaClient, ip: &str, msg: &str, ctx: &OutputContext) -> Result<()> {
    client
        .relay(ip, msg)
        .await
        .with_context(|| format!("Failed to relay to {}", ip))?;

    ctx.success(&format!("Sent {:?} to {}", msg, ip));
    Ok(())
}
