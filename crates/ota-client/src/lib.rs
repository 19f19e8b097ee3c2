//! OTA Client Library
//!
//! Provides a typed HTTP client for the OTA firmware server.
//!
//! # Example
//!
//! ```rust,no_run
//! use ota_client::OtaClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = OtaClient::new("http://localhost:5000")?;
//!
//!     client.register_device("esp3").await?;
//!     client.update_version("esp3", "1.0.4").await?;
//!     client.upload_firmware("esp3", std::fs::read("build/app.bin")?).await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Testing
//!
//! The `testing` module runs a router on an ephemeral port:
//!
//! ```rust,ignore
//! use ota_client::testing::TestServer;
//! use ota_api::{create_router, AppState};
//!
//! let server = TestServer::start(create_router(state)).await?;
//! let devices = server.client.list_devices().await?;
//! ```

pub mod client;
pub mod error;
pub mod testing;
pub mod types;

pub use client::OtaClient;
pub use error::{OtaClientError, Result};
pub use types::*;
