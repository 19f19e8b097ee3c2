//! Common error types for the registry, artifact store and relay

use thiserror::Error;

/// Result type for OTA core operations
pub type OtaResult<T> = Result<T, OtaError>;

/// Errors that can occur in the OTA core
#[derive(Debug, Error)]
pub enum OtaError {
    /// A required field is missing or malformed
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Device identity is empty or not usable as a storage key
    #[error("Invalid device identity: {0}")]
    InvalidIdentity(String),

    /// Device identity is not registered
    #[error("Device not found: {0}")]
    NotFound(String),

    /// Artifact operation addressed an unregistered device
    #[error("Unknown device: {0}")]
    UnknownDevice(String),

    /// Identity (or the artifact derived from it) is already taken
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Registry references a firmware blob that is not on disk
    #[error("Firmware blob missing: {0}")]
    BlobMissing(String),

    /// Underlying storage failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Checkpoint file could not be read, parsed or validated
    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    /// Calibration file could not be parsed
    #[error("Calibration data error: {0}")]
    Calibration(String),

    /// Relay datagram could not be sent
    #[error("Relay error: {0}")]
    Relay(String),
}

impl OtaError {
    /// Returns the HTTP status code for this error on read endpoints
    pub fn status_code(&self) -> u16 {
        match self {
            OtaError::InvalidInput(_) => 400,
            OtaError::InvalidIdentity(_) => 400,
            OtaError::AlreadyExists(_) => 400,
            OtaError::NotFound(_) => 404,
            OtaError::UnknownDevice(_) => 404,
            OtaError::BlobMissing(_) => 404,
            OtaError::Io(_) => 500,
            OtaError::Checkpoint(_) => 500,
            OtaError::Calibration(_) => 500,
            OtaError::Relay(_) => 500,
        }
    }

    /// Whether the error means the addressed device does not exist
    pub fn is_missing_device(&self) -> bool {
        matches!(self, OtaError::NotFound(_) | OtaError::UnknownDevice(_))
    }
}
