//! Fire-and-forget UDP relay to devices
//!
//! A relay sends one datagram carrying an opaque command string. There is no
//! retry and no acknowledgement; success only means the datagram left.

use std::net::{IpAddr, SocketAddr};

use async_trait::async_trait;
use tokio::net::UdpSocket;

use crate::error::{OtaError, OtaResult};

/// Sends opaque messages to device addresses
#[async_trait]
pub trait RelayForwarder: Send + Sync {
    /// Send `message` once to `target`
    async fn forward(&self, target: &str, message: &str) -> OtaResult<()>;
}

/// UDP relay using an ephemeral socket per message
#[derive(Debug, Clone)]
pub struct UdpRelay {
    device_port: u16,
}

impl UdpRelay {
    /// `device_port` is used for targets given without a port
    pub fn new(device_port: u16) -> Self {
        Self { device_port }
    }

    /// Resolve `ip`, `ip:port` or `host:port`
    async fn resolve(&self, target: &str) -> OtaResult<SocketAddr> {
        if let Ok(addr) = target.parse::<SocketAddr>() {
            return Ok(addr);
        }
        if let Ok(ip) = target.parse::<IpAddr>() {
            return Ok(SocketAddr::new(ip, self.device_port));
        }

        let host_port = if target.contains(':') {
            target.to_string()
        } else {
            format!("{}:{}", target, self.device_port)
        };
        tokio::net::lookup_host(host_port)
            .await
            .map_err(|e| OtaError::Relay(format!("cannot resolve '{}': {}", target, e)))?
            .next()
            .ok_or_else(|| OtaError::Relay(format!("no address for '{}'", target)))
    }
}

#[async_trait]
impl RelayForwarder for UdpRelay {
    async fn forward(&self, target: &str, message: &str) -> OtaResult<()> {
        if target.is_empty() || message.is_empty() {
            return Err(OtaError::InvalidInput(
                "relay target and message are required".to_string(),
            ));
        }

        let addr = self.resolve(target).await?;
        let bind: SocketAddr = if addr.is_ipv4() {
            SocketAddr::from(([0, 0, 0, 0], 0))
        } else {
            SocketAddr::from(([0u16; 8], 0))
        };

        let socket = UdpSocket::bind(bind)
            .await
            .map_err(|e| OtaError::Relay(format!("bind failed: {}", e)))?;
        socket
            .send_to(message.as_bytes(), addr)
            .await
            .map_err(|e| OtaError::Relay(format!("send to {} failed: {}", addr, e)))?;

        tracing::debug!(device_addr = %addr, len = message.len(), "Relayed message");
        Ok(())
    }
}
