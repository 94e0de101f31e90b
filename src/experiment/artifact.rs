//! Artifact - named content produced or consumed by an experiment

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Artifact attached to an experiment under a tag.
///
/// An artifact starts out with a source (local path, content hash, or an
/// existing qualified location) and is resolved by the registry into a
/// storage `key`, a `qualified` location and a `bucket`.
///
/// - **mutable**: overwritten on every checkpoint, keyed per experiment + tag
/// - **immutable**: write-once and content-addressed, shared across experiments
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    #[serde(default)]
    mutable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    local: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    hash: Option<String>,
    #[serde(default)]
    key: Option<String>,
    #[serde(default)]
    qualified: Option<String>,
    #[serde(default)]
    bucket: Option<String>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl Artifact {
    /// Mutable artifact backed by a local file or directory.
    #[must_use]
    pub fn mutable(local: impl AsRef<Path>) -> Self {
        Self {
            mutable: true,
            local: Some(local.as_ref().to_path_buf()),
            ..Self::default()
        }
    }

    /// Immutable artifact backed by a local file or directory.
    #[must_use]
    pub fn immutable(local: impl AsRef<Path>) -> Self {
        Self {
            local: Some(local.as_ref().to_path_buf()),
            ..Self::default()
        }
    }

    /// Immutable artifact whose content is already stored under its hash.
    #[must_use]
    pub fn from_hash(hash: impl Into<String>) -> Self {
        Self {
            hash: Some(hash.into()),
            ..Self::default()
        }
    }

    /// Immutable artifact that already lives at a qualified location.
    #[must_use]
    pub fn from_qualified(qualified: impl Into<String>) -> Self {
        Self {
            qualified: Some(qualified.into()),
            ..Self::default()
        }
    }

    /// Attach an extension field that round-trips through storage.
    #[must_use]
    pub fn with_extra(mut self, name: impl Into<String>, value: Value) -> Self {
        self.extra.insert(name.into(), value);
        self
    }

    /// True if the artifact is overwritten on each checkpoint.
    #[must_use]
    pub const fn is_mutable(&self) -> bool {
        self.mutable
    }

    /// Local source path, if any.
    #[must_use]
    pub fn local(&self) -> Option<&Path> {
        self.local.as_deref()
    }

    /// Content hash, if known.
    #[must_use]
    pub fn hash(&self) -> Option<&str> {
        self.hash.as_deref()
    }

    /// Resolved storage key.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// Resolved qualified location.
    #[must_use]
    pub fn qualified(&self) -> Option<&str> {
        self.qualified.as_deref()
    }

    /// Resolved bucket.
    #[must_use]
    pub fn bucket(&self) -> Option<&str> {
        self.bucket.as_deref()
    }

    /// Extension fields not covered by the schema.
    #[must_use]
    pub const fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }

    pub(crate) fn set_key(&mut self, key: impl Into<String>) {
        self.key = Some(key.into());
    }

    pub(crate) fn set_hash(&mut self, hash: impl Into<String>) {
        self.hash = Some(hash.into());
    }

    pub(crate) fn set_location(&mut self, qualified: Option<String>, bucket: impl Into<String>) {
        if qualified.is_some() {
            self.qualified = qualified;
        }
        self.bucket = Some(bucket.into());
    }
}
