//! Key-Value Providers
//!
//! Hierarchical get/set/delete over a `/`-separated string namespace holding
//! JSON documents. A key addresses either a leaf document or a prefix
//! (directory) whose immediate children can be listed.
//!
//! # Example
//!
//! ```rust,no_run
//! use trueno_studio::kv::{KeyValueProvider, KvEntry, MemoryKvProvider};
//!
//! # fn example() -> trueno_studio::Result<()> {
//! let kv = MemoryKvProvider::new();
//!
//! kv.set("users/guest/exp-1", &serde_json::json!({"key": "exp-1"}))?;
//! let doc = kv.get("users/guest/exp-1", false)?;
//! assert!(matches!(doc, Some(KvEntry::Document(_))));
//!
//! // Directory children carry a trailing '/'
//! let listing = kv.get("users", true)?.and_then(KvEntry::into_listing);
//! assert_eq!(listing, Some(vec!["guest/".to_string()]));
//! # Ok(())
//! # }
//! ```

mod local_files;
mod memory;

pub use local_files::LocalFilesProvider;
pub use memory::MemoryKvProvider;

use serde_json::Value;

use crate::Result;

/// Result of a [`KeyValueProvider::get`].
#[derive(Debug, Clone, PartialEq)]
pub enum KvEntry {
    /// Parsed leaf document.
    Document(Value),
    /// Immediate children of a prefix, unordered; directory children end in `/`.
    Listing(Vec<String>),
}

impl KvEntry {
    /// The document, if this entry is a leaf.
    #[must_use]
    pub fn into_document(self) -> Option<Value> {
        match self {
            Self::Document(value) => Some(value),
            Self::Listing(_) => None,
        }
    }

    /// The child names, if this entry is a listing.
    #[must_use]
    pub fn into_listing(self) -> Option<Vec<String>> {
        match self {
            Self::Listing(children) => Some(children),
            Self::Document(_) => None,
        }
    }
}

/// Capability interface for hierarchical JSON document stores.
///
/// Absent keys are not an error: `get` returns `Ok(None)` and `delete` is a
/// no-op.
pub trait KeyValueProvider: Send + Sync {
    /// Read `key`.
    ///
    /// - leaf → [`KvEntry::Document`]
    /// - prefix with `shallow` → [`KvEntry::Listing`] of immediate children
    /// - absent → `None`
    ///
    /// # Errors
    /// [`crate::Error::UnsupportedAccess`] if `key` is a prefix and `shallow`
    /// is false.
    fn get(&self, key: &str, shallow: bool) -> Result<Option<KvEntry>>;

    /// Write `value` under `key`, creating intermediate structure and
    /// replacing any previous document.
    fn set(&self, key: &str, value: &Value) -> Result<()>;

    /// Remove `key` (and anything below it).
    fn delete(&self, key: &str) -> Result<()>;

    /// Release transport resources held by the provider.
    fn close(&self) -> Result<()> {
        Ok(())
    }
}
