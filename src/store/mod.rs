//! Artifact Stores
//!
//! Uniform blob-backend operations over artifact content: upload, download,
//! delete, addressing and last-modified queries.
//!
//! Backends implement [`ArtifactStore`]; everything that orchestrates keys
//! (content addressing, packing, qualified-location parsing) depends only on
//! the trait, so a new backend never has to re-implement that logic.
//!
//! # Example
//!
//! ```rust,no_run
//! use trueno_studio::store::{ArtifactStore, LocalArtifactStore};
//! use std::path::Path;
//!
//! # fn example() -> trueno_studio::Result<()> {
//! let store = LocalArtifactStore::new("/tmp/artifacts")?;
//! store.upload("models/net.bin", Path::new("net.bin"))?;
//! println!("stored at {}", store.url_for("models/net.bin"));
//! store.download("models/net.bin", Path::new("net-copy.bin"))?;
//! store.delete("models/net.bin")?;
//! # Ok(())
//! # }
//! ```

mod local;
mod memory;
pub mod packing;
pub mod qualified;

pub use local::LocalArtifactStore;
pub(crate) use local::ensure_dir;
pub use memory::MemoryArtifactStore;
pub use packing::{get_artifact, immutable_artifact_key, put_artifact};
pub use qualified::QualifiedLocation;

use std::path::Path;

use chrono::{DateTime, Utc};

use crate::Result;

/// Capability interface for artifact content backends.
///
/// Keys are `/`-separated relative paths. A key may address a single blob or,
/// when a directory was uploaded, a whole tree.
pub trait ArtifactStore: Send + Sync {
    /// Copy local content (file or directory tree) into the backend under `key`.
    ///
    /// Any prior content under `key` is fully replaced.
    ///
    /// # Errors
    /// [`crate::Error::NotFound`] if `local_path` does not exist.
    fn upload(&self, key: &str, local_path: &Path) -> Result<()>;

    /// Copy the content stored under `key` to `local_path`.
    ///
    /// # Errors
    /// [`crate::Error::NotFound`] if `key` is absent.
    fn download(&self, key: &str, local_path: &Path) -> Result<()>;

    /// Remove the blob or tree stored under `key`.
    ///
    /// No-op if `key` is absent.
    fn delete(&self, key: &str) -> Result<()>;

    /// Fully qualified address (scheme + bucket + key).
    fn url_for(&self, key: &str) -> String;

    /// Backend last-modified time of `key`.
    ///
    /// # Errors
    /// [`crate::Error::NotFound`] if `key` is absent.
    fn timestamp_of(&self, key: &str) -> Result<DateTime<Utc>>;

    /// Root namespace identifier of the backend.
    fn bucket(&self) -> String;

    /// Get backend type name
    fn backend_type(&self) -> &'static str;

    /// Storage key of a qualified location produced by [`ArtifactStore::url_for`].
    ///
    /// Returns `None` if `qualified` does not address this store. This is the
    /// inverse of `url_for` even for locations that [`qualified::parse`]
    /// cannot decompose, such as `file:///<root>/<key>`.
    fn locate(&self, qualified: &str) -> Option<String> {
        let base = self.url_for("");
        let key = qualified
            .strip_prefix(base.trim_end_matches('/'))?
            .strip_prefix('/')?;
        (!key.is_empty()).then(|| key.to_string())
    }

    /// Check if `key` is present.
    fn exists(&self, key: &str) -> Result<bool> {
        match self.timestamp_of(key) {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Release transport resources held by the backend.
    fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Join relative path components with `/`, independent of the host separator.
pub(crate) fn to_key_path(rel: &Path) -> String {
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
