//! JSON-files-on-disk key-value provider

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use tracing::instrument;

use super::{KeyValueProvider, KvEntry};
use crate::store::{ArtifactStore, LocalArtifactStore};
use crate::{Error, Result};

/// [`KeyValueProvider`] storing each leaf key as one JSON file.
///
/// The provider shares its root folder with a [`LocalArtifactStore`];
/// deletes go through the store so leaves and artifact trees are removed the
/// same way.
#[derive(Debug, Clone)]
pub struct LocalFilesProvider {
    folder: PathBuf,
    store: Arc<LocalArtifactStore>,
}

impl LocalFilesProvider {
    /// Open a provider rooted at `folder`, creating it if absent.
    ///
    /// # Errors
    /// Returns error if the folder cannot be created.
    pub fn new(folder: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::with_store(Arc::new(LocalArtifactStore::new(folder)?)))
    }

    /// Build a provider on top of an existing local store.
    #[must_use]
    pub fn with_store(store: Arc<LocalArtifactStore>) -> Self {
        Self {
            folder: store.root().to_path_buf(),
            store,
        }
    }

    /// Root folder of the provider.
    #[must_use]
    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// The artifact store sharing this provider's folder.
    #[must_use]
    pub fn store(&self) -> Arc<LocalArtifactStore> {
        Arc::clone(&self.store)
    }
}

impl KeyValueProvider for LocalFilesProvider {
    #[instrument(level = "trace", skip(self))]
    fn get(&self, key: &str, shallow: bool) -> Result<Option<KvEntry>> {
        let path = self.store.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let meta = fs::metadata(&path).map_err(|e| Error::store_io(&path, e))?;

        if meta.is_file() {
            let text = fs::read_to_string(&path).map_err(|e| Error::store_io(&path, e))?;
            return Ok(Some(KvEntry::Document(serde_json::from_str(&text)?)));
        }

        if !(meta.is_dir() && shallow) {
            return Err(Error::UnsupportedAccess(format!(
                "{key} is a directory; shallow listing was not requested"
            )));
        }

        let mut children = Vec::new();
        for entry in fs::read_dir(&path).map_err(|e| Error::store_io(&path, e))? {
            let entry = entry.map_err(|e| Error::store_io(&path, e))?;
            let mut name = entry.file_name().to_string_lossy().into_owned();
            if entry.file_type().map_err(|e| Error::store_io(entry.path(), e))?.is_dir() {
                name.push('/');
            }
            children.push(name);
        }
        children.sort();
        Ok(Some(KvEntry::Listing(children)))
    }

    #[instrument(level = "trace", skip(self, value))]
    fn set(&self, key: &str, value: &Value) -> Result<()> {
        let path = self.store.path_for(key);
        if let Some(parent) = path.parent() {
            crate::store::ensure_dir(parent)?;
        }
        let bytes = serde_json::to_vec(value)?;
        fs::write(&path, bytes).map_err(|e| Error::store_io(&path, e))
    }

    #[instrument(level = "trace", skip(self))]
    fn delete(&self, key: &str) -> Result<()> {
        self.store.delete(key)
    }

    fn close(&self) -> Result<()> {
        self.store.close()
    }
}
