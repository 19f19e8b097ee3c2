//! otad - OTA Server Daemon
//!
//! Serves firmware images and versions to ESP devices, and lets operators
//! manage the device registry over HTTP.
//!
//! Usage:
//!   otad [OPTIONS] [config.toml]
//!
//! Without a config file every setting takes its default: port 5000, state
//! under `./data`, firmware under `./firmware`.

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use ota_api::{create_router, AppState};
use ota_core::{ArtifactStore, CalibrationStore, Checkpoint, DeviceRegistry, UdpRelay};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::DaemonConfig;

/// OTA firmware server daemon
#[derive(Parser, Debug)]
#[command(name = "otad", version, about)]
struct Args {
    /// Server config file (TOML)
    config: Option<PathBuf>,

    /// Port to listen on, overrides the config file
    #[arg(short, long, env = "OTAD_PORT")]
    port: Option<u16>,

    /// Directory for the registry checkpoint and calibration pairs
    #[arg(long, env = "OTAD_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Directory for firmware blobs
    #[arg(long, env = "OTAD_FIRMWARE_DIR")]
    firmware_dir: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

impl Args {
    /// Apply command-line overrides on top of the file configuration
    fn apply(&self, config: &mut DaemonConfig) {
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(ref dir) = self.data_dir {
            config.storage.data_dir = dir.clone();
        }
        if let Some(ref dir) = self.firmware_dir {
            config.storage.firmware_dir = dir.clone();
        }
    }
}

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "otad=info,ota_api=info,ota_core=info,tower_http=info".into()
    });

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.log_json);

    tracing::info!("Starting otad (OTA Server Daemon)");

    let mut config = match args.config {
        Some(ref path) => {
            tracing::info!("Loading config from: {}", path.display());
            DaemonConfig::load(path)?
        }
        None => {
            tracing::info!("No config file provided, using defaults");
            DaemonConfig::default()
        }
    };
    args.apply(&mut config);

    let storage = &config.storage;
    tokio::fs::create_dir_all(&storage.data_dir)
        .await
        .with_context(|| format!("Failed to create {}", storage.data_dir.display()))?;

    let artifacts = ArtifactStore::open(&storage.firmware_dir)
        .await
        .with_context(|| format!("Failed to open {}", storage.firmware_dir.display()))?;
    let checkpoint = Checkpoint::new(storage.checkpoint_path());
    let registry = DeviceRegistry::open(checkpoint, artifacts, &config.seed)
        .await
        .context("Failed to open device registry")?;
    let calibration = CalibrationStore::new(storage.calibration_path());
    let relay = UdpRelay::new(config.relay.device_port);

    tracing::info!(
        data_dir = %storage.data_dir.display(),
        firmware_dir = %storage.firmware_dir.display(),
        device_port = config.relay.device_port,
        "Storage ready"
    );

    let state = AppState::new(Arc::new(registry), Arc::new(relay), Arc::new(calibration))
        .with_limits(config.server.limits());
    let app = create_router(state);

    let addr = config.server.socket_addr();
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_override_config() {
        let args = Args::parse_from([
            "otad",
            "otad.toml",
            "--port",
            "8081",
            "--data-dir",
            "/tmp/ota-data",
            "--log-json",
        ]);
        assert_eq!(args.config, Some(PathBuf::from("otad.toml")));
        assert!(args.log_json);

        let mut config = DaemonConfig::default();
        args.apply(&mut config);
        assert_eq!(config.server.port, 8081);
        assert_eq!(config.storage.data_dir, PathBuf::from("/tmp/ota-data"));
        assert_eq!(config.storage.firmware_dir, PathBuf::from("firmware"));
    }
}
