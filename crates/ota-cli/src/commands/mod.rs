//! Command implementations for ota-cli

pub mod calib;
pub mod devices;
pub mod firmware;
pub mod relay;

pub use calib::{calib_save, calib_show};
pub use devices::{delete, list, register, rename, set_version};
pub use firmware::{download, upload, version};
pub use relay::relay;
