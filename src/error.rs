//! Centralized error types for mboxforum.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the mboxforum library.
///
/// Malformed individual mbox records are never reported through this type;
/// they become [`SkipReason`](crate::model::message::SkipReason) values and
/// the run continues.
#[derive(Error, Debug)]
pub enum ImportError {
    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The specified input file does not exist.
    #[error("MBOX file not found: {0}")]
    FileNotFound(PathBuf),

    /// The store snapshot is corrupt or was written by an incompatible version.
    #[error("Corrupt or incompatible store snapshot '{path}': {reason}")]
    InvalidSnapshot { path: PathBuf, reason: String },

    /// Encoding a value for persistence failed.
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// A referenced post or user does not exist in the store.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The requested forum action is not allowed for this user.
    #[error("{0}")]
    Forbidden(String),

    /// A command-line or configuration value could not be interpreted.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Convenience alias for `Result<T, ImportError>`.
pub type Result<T> = std::result::Result<T, ImportError>;

impl ImportError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Allow `?` on `std::io::Error` when no path context is available
/// (rare, prefer `ImportError::io`).
impl From<std::io::Error> for ImportError {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::from("<unknown>"),
            source,
        }
    }
}

impl From<bincode::Error> for ImportError {
    fn from(e: bincode::Error) -> Self {
        Self::Serialize(e.to_string())
    }
}
