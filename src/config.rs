//! Storage configuration

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::compression::Compression;
use crate::{Error, Result};

/// Default cap on keys returned by a browse listing.
pub const DEFAULT_MAX_KEYS: usize = 100;

const fn default_true() -> bool {
    true
}

const fn default_max_keys() -> usize {
    DEFAULT_MAX_KEYS
}

fn default_folder() -> PathBuf {
    PathBuf::from("~/.trueno-studio/store")
}

/// Configuration of a local storage provider.
///
/// ```json
/// { "folder": "~/.trueno-studio/store", "guest": true, "compression": "lz4", "max_keys": 100 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root folder for experiment documents and artifacts.
    #[serde(default = "default_folder")]
    pub folder: PathBuf,
    /// Ignore any authentication context and act as `guest`.
    #[serde(default = "default_true")]
    pub guest: bool,
    /// Default compression for packed artifacts.
    #[serde(default)]
    pub compression: Compression,
    /// Cap on keys returned by a browse listing.
    #[serde(default = "default_max_keys")]
    pub max_keys: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            folder: default_folder(),
            guest: true,
            compression: Compression::None,
            max_keys: DEFAULT_MAX_KEYS,
        }
    }
}

impl StorageConfig {
    /// Configuration rooted at `folder` with default settings.
    #[must_use]
    pub fn with_folder(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
            ..Self::default()
        }
    }

    /// Parse a JSON configuration document.
    ///
    /// # Errors
    /// Returns error if the document is malformed or fails validation.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON configuration file.
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| Error::store_io(path, e))?;
        Self::from_json_str(&text)
    }

    /// Check invariants not expressible in the type.
    ///
    /// # Errors
    /// [`Error::Config`] if `max_keys` is zero or `folder` is empty.
    pub fn validate(&self) -> Result<()> {
        if self.max_keys == 0 {
            return Err(Error::Config("max_keys must be positive".to_string()));
        }
        if self.folder.as_os_str().is_empty() {
            return Err(Error::Config("folder must not be empty".to_string()));
        }
        Ok(())
    }
}
