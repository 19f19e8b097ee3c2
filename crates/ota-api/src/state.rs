//! Application state for the OTA API

use std::sync::Arc;
use std::time::Duration;

use ota_core::{CalibrationStore, DeviceRegistry, RelayForwarder};

/// Default upper bound for an uploaded firmware body
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

/// Default per-request timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Request limits applied by the router
#[derive(Debug, Clone)]
pub struct ApiLimits {
    /// Largest request body accepted, firmware uploads included
    pub max_upload_bytes: usize,
    /// Time after which a request is aborted
    pub request_timeout: Duration,
}

impl Default for ApiLimits {
    fn default() -> Self {
        Self {
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    registry: Arc<DeviceRegistry>,
    relay: Arc<dyn RelayForwarder>,
    calibration: Arc<CalibrationStore>,
    limits: ApiLimits,
}

impl AppState {
    /// Create a new AppState with default limits
    pub fn new(
        registry: Arc<DeviceRegistry>,
        relay: Arc<dyn RelayForwarder>,
        calibration: Arc<CalibrationStore>,
    ) -> Self {
        Self {
            registry,
            relay,
            calibration,
            limits: ApiLimits::default(),
        }
    }

    /// Replace the request limits
    pub fn with_limits(mut self, limits: ApiLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    pub fn relay(&self) -> &dyn RelayForwarder {
        self.relay.as_ref()
    }

    pub fn calibration(&self) -> &CalibrationStore {
        &self.calibration
    }

    pub fn limits(&self) -> &ApiLimits {
        &self.limits
    }
}
