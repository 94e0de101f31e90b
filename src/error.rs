//! Error types for Trueno-Studio
//!
//! Toyota Way: Clear error messages with actionable guidance (Respect for People)

use std::path::PathBuf;

use thiserror::Error;

use crate::experiment::ExperimentStatus;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Trueno-Studio error types
#[derive(Error, Debug)]
pub enum Error {
    /// Download or lookup of an absent key, or upload of an absent local path
    #[error("Not found: {0}")]
    NotFound(String),

    /// Filesystem failure while copying content or creating directories
    #[error("Store IO error at {}: {source}", path.display())]
    StoreIo {
        /// Path being read or written
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// A `get` whose target (leaf vs. prefix) does not match the requested mode
    #[error("Unsupported access: {0}\nUse a shallow listing to enumerate prefixes")]
    UnsupportedAccess(String),

    /// Qualified location does not match `<scheme>://<bucket-or-host>/<key>`
    #[error("Qualified location parse error: {0}")]
    ParseError(String),

    /// Experiment key or user id that is not a single path segment
    #[error("Invalid key: {0}\nKeys and user ids must be one non-empty path segment")]
    InvalidKey(String),

    /// Status change not allowed by the experiment state machine
    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition {
        /// Current status
        from: ExperimentStatus,
        /// Requested status
        to: ExperimentStatus,
    },

    /// Experiment document (de)serialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Compression or decompression failed
    #[error("Compression error: {0}")]
    Compression(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Git metadata extraction failed
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Wrap an IO error with the path it occurred on.
    ///
    /// `NotFound` IO errors are reported as [`Error::NotFound`] so callers can
    /// match on absence without inspecting the IO error kind.
    pub(crate) fn store_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound(path.display().to_string())
        } else {
            Self::StoreIo { path, source }
        }
    }

    /// True if this error reports an absent key or path.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
