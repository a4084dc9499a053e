//! Error types for checkpoint synchronisation

use thiserror::Error;

/// Result type alias using the sync Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for checkpoint synchronisation
#[derive(Error, Debug)]
pub enum Error {
    // Protocol errors
    #[error("Local snapshot source missing: {path}")]
    SourceMissing { path: String },

    #[error("Remote store unavailable during {operation} on {target}: {message}")]
    RemoteUnavailable {
        operation: String,
        target: String,
        message: String,
    },

    #[error("Name does not carry a version identifier: {name}")]
    MalformedName { name: String },

    #[error("Version container is incomplete (no completion marker): {container}")]
    ValidationFailed { container: String },

    #[error("No valid version found to resume series {series}")]
    NothingToResume { series: String },

    #[error("Version container already exists: {container}")]
    VersionExists { container: String },

    // Storage errors
    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Storage path not found: {path}")]
    StoragePathNotFound { path: String },

    // Configuration errors
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // Internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl Error {
    /// Wrap a failure from the store client with the operation and container it hit
    pub fn remote(operation: impl Into<String>, target: impl Into<String>, err: Error) -> Self {
        match err {
            // Already carries context, or is not a remote failure at all
            Error::RemoteUnavailable { .. }
            | Error::VersionExists { .. }
            | Error::SourceMissing { .. } => err,
            other => Error::RemoteUnavailable {
                operation: operation.into(),
                target: target.into(),
                message: other.to_string(),
            },
        }
    }

    /// Returns true if this error is retryable at the transport level
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Storage { .. } | Error::RemoteUnavailable { .. })
    }

    /// Returns true if this error indicates a fatal condition
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::InvalidConfig { .. } | Error::Internal { .. })
    }

    /// Returns true if the error means "the object is not there"
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::StoragePathNotFound { .. })
            || matches!(self, Error::Io(e) if e.kind() == std::io::ErrorKind::NotFound)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::InvalidConfig {
            message: e.to_string(),
        }
    }
}
