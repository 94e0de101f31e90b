//! In-memory artifact store.
//!
//! Behaves like a flat object store: a directory upload becomes one object
//! per file under `<key>/`, and a key addresses either one object or every
//! object below that prefix. Data is lost when the store is dropped.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::debug;
use walkdir::WalkDir;

use super::local::ensure_dir;
use super::{qualified, to_key_path, ArtifactStore};
use crate::{Error, Result};

/// URL scheme of [`MemoryArtifactStore`] qualified locations.
pub const MEMORY_SCHEME: &str = "mem";

#[derive(Debug, Clone)]
struct StoredObject {
    data: Vec<u8>,
    modified: DateTime<Utc>,
}

/// In-memory [`ArtifactStore`] using a lock-free concurrent hashmap.
///
/// Qualified locations are `mem://<bucket>/<key>`.
#[derive(Debug)]
pub struct MemoryArtifactStore {
    bucket: String,
    objects: DashMap<String, StoredObject>,
}

impl MemoryArtifactStore {
    /// Create an empty store with the given bucket name.
    #[must_use]
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            objects: DashMap::new(),
        }
    }

    /// Number of stored objects (files).
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Check if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    fn put_object(&self, key: String, data: Vec<u8>) {
        self.objects.insert(
            key,
            StoredObject {
                data,
                modified: Utc::now(),
            },
        );
    }

    fn objects_under(&self, key: &str) -> Vec<(String, StoredObject)> {
        let prefix = format!("{}/", key.trim_end_matches('/'));
        self.objects
            .iter()
            .filter_map(|entry| {
                entry
                    .key()
                    .strip_prefix(&prefix)
                    .map(|rel| (rel.to_string(), entry.value().clone()))
            })
            .collect()
    }
}

impl Default for MemoryArtifactStore {
    fn default() -> Self {
        Self::new("memory")
    }
}

impl ArtifactStore for MemoryArtifactStore {
    fn upload(&self, key: &str, local_path: &Path) -> Result<()> {
        let meta = fs::metadata(local_path).map_err(|e| Error::store_io(local_path, e))?;
        self.delete(key)?;

        if meta.is_dir() {
            for entry in WalkDir::new(local_path) {
                let entry = entry.map_err(|e| Error::store_io(local_path, e.into()))?;
                if !entry.file_type().is_file() {
                    continue;
                }
                let rel = entry
                    .path()
                    .strip_prefix(local_path)
                    .map_err(|e| Error::Other(e.to_string()))?;
                let data = fs::read(entry.path()).map_err(|e| Error::store_io(entry.path(), e))?;
                self.put_object(format!("{key}/{}", to_key_path(rel)), data);
            }
        } else {
            let data = fs::read(local_path).map_err(|e| Error::store_io(local_path, e))?;
            self.put_object(key.to_string(), data);
        }

        debug!(key, source = %local_path.display(), "uploaded artifact to memory");
        Ok(())
    }

    fn download(&self, key: &str, local_path: &Path) -> Result<()> {
        if let Some(object) = self.objects.get(key) {
            if let Some(parent) = local_path.parent() {
                ensure_dir(parent)?;
            }
            return fs::write(local_path, &object.data).map_err(|e| Error::store_io(local_path, e));
        }

        let tree = self.objects_under(key);
        if tree.is_empty() {
            return Err(Error::NotFound(key.to_string()));
        }

        for (rel, object) in tree {
            let target = local_path.join(rel);
            if let Some(parent) = target.parent() {
                ensure_dir(parent)?;
            }
            fs::write(&target, &object.data).map_err(|e| Error::store_io(&target, e))?;
        }
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        let prefix = format!("{}/", key.trim_end_matches('/'));
        self.objects.remove(key);
        self.objects.retain(|k, _| !k.starts_with(&prefix));
        Ok(())
    }

    fn url_for(&self, key: &str) -> String {
        qualified::format(MEMORY_SCHEME, &self.bucket, key)
    }

    fn timestamp_of(&self, key: &str) -> Result<DateTime<Utc>> {
        if let Some(object) = self.objects.get(key) {
            return Ok(object.modified);
        }
        self.objects_under(key)
            .into_iter()
            .map(|(_, object)| object.modified)
            .max()
            .ok_or_else(|| Error::NotFound(key.to_string()))
    }

    fn bucket(&self) -> String {
        self.bucket.clone()
    }

    fn backend_type(&self) -> &'static str {
        "memory"
    }
}
