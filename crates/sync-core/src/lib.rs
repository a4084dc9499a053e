//! Sync Core - Foundation for checkpoint synchronisation
//!
//! Provides the error taxonomy, configuration model and primitive types
//! shared by the storage backends, the versioning protocol and the monitor.

pub mod config;
pub mod error;
pub mod types;

pub use config::SyncConfig;
pub use error::{Error, Result};
pub use types::*;
