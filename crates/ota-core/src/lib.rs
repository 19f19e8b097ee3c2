//! ota-core - Device registry and firmware storage for the OTA server
//!
//! This crate owns the state of the service: the device registry with its
//! durable checkpoint, the firmware artifact store, calibration pairs, and the
//! UDP relay used to nudge devices. It has no HTTP dependency; `ota-api`
//! exposes it over the network.

pub mod artifact;
pub mod calibration;
pub mod checkpoint;
pub mod config;
pub mod error;
pub mod models;
pub mod persist;
pub mod registry;
pub mod relay;

pub use artifact::{ArtifactStore, FirmwareBlob};
pub use calibration::CalibrationStore;
pub use checkpoint::{Checkpoint, DeviceMap};
pub use config::{RelayConfig, SeedDevice, StorageConfig};
pub use error::{OtaError, OtaResult};
pub use models::{DeviceRecord, FirmwareEntry, DEFAULT_VERSION};
pub use registry::{DeviceRegistry, UploadReceipt};
pub use relay::{RelayForwarder, UdpRelay};
