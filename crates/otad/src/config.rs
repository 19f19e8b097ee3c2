//! TOML configuration for the OTA daemon
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! server on port 5000 storing state under `./data` and `./firmware`.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use ota_api::ApiLimits;
use ota_core::config::default_seed;
use ota_core::{RelayConfig, SeedDevice, StorageConfig};
use serde::Deserialize;

/// HTTP listener settings
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Largest accepted firmware upload
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            request_timeout_secs: default_request_timeout_secs(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }

    pub fn limits(&self) -> ApiLimits {
        ApiLimits {
            max_upload_bytes: self.max_upload_bytes,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }
}

fn default_bind() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    5000
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_max_upload_bytes() -> usize {
    16 * 1024 * 1024
}

/// Top-level daemon configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DaemonConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub relay: RelayConfig,
    /// Devices registered on first start, before any checkpoint exists
    #[serde(default = "default_seed")]
    pub seed: Vec<SeedDevice>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            relay: RelayConfig::default(),
            seed: default_seed(),
        }
    }
}

impl DaemonConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = DaemonConfig::parse("").unwrap();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.server.socket_addr().to_string(), "0.0.0.0:5000");
        assert_eq!(config.server.max_upload_bytes, 16 * 1024 * 1024);
        assert_eq!(config.storage.data_dir, PathBuf::from("data"));
        assert_eq!(config.storage.firmware_dir, PathBuf::from("firmware"));
        assert_eq!(config.relay.device_port, 4210);
        assert_eq!(config.seed, default_seed());
    }

    #[test]
    fn test_full_config() {
        let config = DaemonConfig::parse(
            r#"
            [server]
            bind = "127.0.0.1"
            port = 8080
            request_timeout_secs = 30
            max_upload_bytes = 4096

            [storage]
            data_dir = "/var/lib/ota"
            firmware_dir = "/srv/firmware"

            [relay]
            device_port = 5555

            [[seed]]
            id = "light_207"
            version = "2.1.0"

            [[seed]]
            id = "lock_208"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.socket_addr().to_string(), "127.0.0.1:8080");
        let limits = config.server.limits();
        assert_eq!(limits.max_upload_bytes, 4096);
        assert_eq!(limits.request_timeout, Duration::from_secs(30));
        assert_eq!(config.storage.checkpoint_path(), PathBuf::from("/var/lib/ota/devices.json"));
        assert_eq!(config.relay.device_port, 5555);
        assert_eq!(
            config.seed,
            vec![
                SeedDevice::new("light_207", "2.1.0"),
                SeedDevice::new("lock_208", "1.0.0"),
            ]
        );
    }

    #[test]
    fn test_empty_seed_list_is_kept() {
        let config = DaemonConfig::parse("seed = []").unwrap();
        assert!(config.seed.is_empty());
    }

    #[test]
    fn test_load_reports_path() {
        let err = DaemonConfig::load(Path::new("/nonexistent/otad.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/otad.toml"));
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(DaemonConfig::parse("[server]\nport = \"high\"").is_err());
    }
}
