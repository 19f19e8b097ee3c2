//! UDP relay handler
//!
//! Lets browser-based operator pages send a one-shot command to a device on
//! the local network.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use serde::Deserialize;

use crate::error::ApiError;
use crate::state::AppState;

/// Query string for a relay request
#[derive(Debug, Deserialize)]
pub struct RelayQuery {
    /// Device address, `ip` or `ip:port`
    #[serde(default)]
    pub ip: Option<String>,
    /// Opaque command text
    #[serde(default)]
    pub msg: Option<String>,
}

/// GET /api/udp?ip=&msg=
/// Send `msg` to `ip` as a single datagram
pub async fn relay_message(
    State(state): State<AppState>,
    query: Result<Query<RelayQuery>, QueryRejection>,
) -> Result<&'static str, ApiError> {
    let Query(query) = query?;
    let (ip, msg) = match (query.ip, query.msg) {
        (Some(ip), Some(msg)) if !ip.is_empty() && !msg.is_empty() => (ip, msg),
        _ => return Err(ApiError::BadRequest("Missing ip or msg".to_string())),
    };

    state.relay().forward(&ip, &msg).await?;

    tracing::info!(device_addr = %ip, msg = %msg, "Relayed command to device");
    Ok("Sent")
}
