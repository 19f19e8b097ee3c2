//! OTA CLI - Command-line tool for the OTA firmware server
//!
//! Manages the device registry, pushes firmware and relays commands to
//! devices through a running `otad`.

mod commands;
mod config;
mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ota_client::OtaClient;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::Config;
use crate::output::{OutputContext, OutputFormat};

#[derive(Parser)]
#[command(name = "ota-cli")]
#[command(author, version, about = "OTA Firmware Server CLI")]
#[command(propagate_version = true)]
struct Cli {
    /// Server URL [default: http://localhost:5000]
    #[arg(short, long, env = "OTA_SERVER")]
    server: Option<String>,

    /// Configuration file path
    #[arg(short, long, env = "OTA_CLI_CONFIG")]
    config: Option<PathBuf>,

    /// Output format [default: table]
    #[arg(short, long, value_enum)]
    output: Option<OutputFormat>,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Minimal output (for scripting)
    #[arg(short, long)]
    quiet: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered devices
    List,

    /// Register a new device
    Register {
        /// Device ID
        device: String,
    },

    /// Rename a device (its firmware follows)
    Rename {
        /// Current device ID
        old: String,

        /// New device ID
        new: String,
    },

    /// Set the firmware version advertised to a device
    SetVersion {
        /// Device ID
        device: String,

        /// Version string, e.g. 1.0.4
        #[arg(value_name = "VERSION")]
        new_version: String,
    },

    /// Show the version a device sees when polling
    Version {
        /// Device ID
        device: String,
    },

    /// Upload a firmware image
    Upload {
        /// Device ID
        device: String,

        /// Firmware file path
        file: PathBuf,
    },

    /// Download a device's firmware image
    Download {
        /// Device ID
        device: String,

        /// Output file [default: name sent by the server]
        #[arg(short = 'f', long = "file")]
        out: Option<PathBuf>,
    },

    /// Delete a device and its firmware
    Delete {
        /// Device ID
        device: String,
    },

    /// Send a UDP command to a device through the server
    Relay {
        /// Device address (ip or ip:port)
        ip: String,

        /// Command text
        msg: String,
    },

    /// Show or replace calibration pairs
    Calib {
        #[command(subcommand)]
        action: CalibAction,
    },
}

#[derive(Subcommand)]
enum CalibAction {
    /// Show saved pairs
    Show,

    /// Replace saved pairs with a JSON array from a file
    Save {
        /// JSON file path
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();

    // Load config file
    let config = if let Some(config_path) = &cli.config {
        Config::load_from(config_path)?
    } else {
        Config::load().unwrap_or_default()
    };

    // Merge CLI args with config
    let merged = config.merge_with_args(cli.server.as_deref(), cli.output, cli.no_color);

    let ctx = OutputContext::new(merged.output, merged.no_color, cli.quiet);
    let client = create_client(&merged.server)?;

    match &cli.command {
        Commands::List => commands::list(&client, &ctx).await?,

        Commands::Register { device } => commands::register(&client, device, &ctx).await?,

        Commands::Rename { old, new } => commands::rename(&client, old, new, &ctx).await?,

        Commands::SetVersion {
            device,
            new_version,
        } => commands::set_version(&client, device, new_version, &ctx).await?,

        Commands::Version { device } => commands::version(&client, device, &ctx).await?,

        Commands::Upload { device, file } => commands::upload(&client, device, file, &ctx).await?,

        Commands::Download { device, out } => {
            commands::download(&client, device, out.as_deref(), &ctx).await?
        }

        Commands::Delete { device } => commands::delete(&client, device, &ctx).await?,

        Commands::Relay { ip, msg } => commands::relay(&client, ip, msg, &ctx).await?,

        Commands::Calib { action } => match action {
            CalibAction::Show => commands::calib_show(&client, &ctx).await?,
            CalibAction::Save { file } => commands::calib_save(&client, file, &ctx).await?,
        },
    }

    Ok(())
}

/// Create an OTA client for the given server URL
fn create_client(server: &str) -> Result<OtaClient> {
    OtaClient::new(server).context("Failed to create OTA client")
}
