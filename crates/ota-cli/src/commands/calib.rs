//! Calibration pair commands

use anyhow::{bail, Context, Result};
use ota_client::OtaClient;
use serde_json::Value;
use std::path::Path;

use crate::output::{CalibRow, OutputContext, OutputFormat};

/// Show saved calibration pairs
pub async fn calib_show(client: &OtaClient, ctx: &OutputContext) -> Result<()> {
    let pairs = client.get_calibration_pairs().await?;

    if ctx.format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&pairs)?);
        return Ok(());
    }

    let rows: Vec<CalibRow> = pairs
        .iter()
        .enumerate()
        .map(|(index, pair)| CalibRow {
            index,
            pair: pair.to_string(),
        })
        .collect();
    ctx.print(&rows);
    Ok(())
}

/// Replace saved calibration pairs with the JSON array in `file_path`
pub async fn calib_save(client: &OtaClient, file_path: &Path, ctx: &OutputContext) -> Result<()> {
    let content = std::fs::read_to_string(file_path)
        .with_context(|| format!("Failed to read {}", file_path.display()))?;
    let value: Value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {}", file_path.display()))?;
    let Value::Array(pairs) = value else {
        bail!("{} must contain a JSON array", file_path.display());
    };

    client
        .save_calibration_pairs(&pairs)
        .await
        .context("Failed to save calibration pairs")?;

    ctx.success(&format!("Saved {} calibration pairs", pairs.len()));
    Ok(())
}
