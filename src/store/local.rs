//! Local filesystem artifact store

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::debug;
use walkdir::WalkDir;

use super::ArtifactStore;
use crate::{Error, Result};

/// Filesystem-backed [`ArtifactStore`].
///
/// Keys map to paths under an absolute root directory. Qualified locations
/// have the form `file://<absolute-root>/<key>` and the bucket is the root
/// path itself.
#[derive(Debug, Clone)]
pub struct LocalArtifactStore {
    root: PathBuf,
}

impl LocalArtifactStore {
    /// Open a store rooted at `root`, creating the directory if absent.
    ///
    /// A leading `~` is expanded to the home directory and relative paths are
    /// resolved against the current directory.
    ///
    /// # Errors
    /// Returns error if the root directory cannot be created.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = absolute_path(root.as_ref())?;
        ensure_dir(&root)?;
        let root = root.canonicalize().map_err(|e| Error::store_io(&root, e))?;
        debug!(root = %root.display(), "opened local artifact store");
        Ok(Self { root })
    }

    /// Absolute root directory of the store.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem path backing `key`.
    #[must_use]
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key.trim_start_matches('/'))
    }
}

impl ArtifactStore for LocalArtifactStore {
    fn upload(&self, key: &str, local_path: &Path) -> Result<()> {
        let source = fs::metadata(local_path).map_err(|e| Error::store_io(local_path, e))?;
        let dest = self.path_for(key);

        if let Some(parent) = dest.parent() {
            ensure_dir(parent)?;
        }

        if source.is_dir() {
            remove_path(&dest)?;
            copy_tree(local_path, &dest)?;
        } else {
            if dest.is_dir() {
                remove_path(&dest)?;
            }
            fs::copy(local_path, &dest).map_err(|e| Error::store_io(&dest, e))?;
        }

        debug!(key, source = %local_path.display(), "uploaded artifact");
        Ok(())
    }

    fn download(&self, key: &str, local_path: &Path) -> Result<()> {
        let source = self.path_for(key);
        let meta = fs::metadata(&source).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => Error::NotFound(key.to_string()),
            _ => Error::store_io(&source, e),
        })?;

        if meta.is_dir() {
            copy_tree(&source, local_path)?;
        } else {
            if let Some(parent) = local_path.parent() {
                ensure_dir(parent)?;
            }
            fs::copy(&source, local_path).map_err(|e| Error::store_io(local_path, e))?;
        }

        debug!(key, dest = %local_path.display(), "downloaded artifact");
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        remove_path(&self.path_for(key))
    }

    fn url_for(&self, key: &str) -> String {
        format!("file://{}", self.path_for(key).display())
    }

    fn timestamp_of(&self, key: &str) -> Result<DateTime<Utc>> {
        let path = self.path_for(key);
        let modified = fs::metadata(&path)
            .and_then(|m| m.modified())
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => Error::NotFound(key.to_string()),
                _ => Error::store_io(&path, e),
            })?;
        Ok(DateTime::<Utc>::from(modified))
    }

    fn bucket(&self) -> String {
        self.root.display().to_string()
    }

    fn backend_type(&self) -> &'static str {
        "local"
    }
}

fn absolute_path(path: &Path) -> Result<PathBuf> {
    let expanded = match path.strip_prefix("~") {
        Ok(rest) => std::env::var_os("HOME")
            .map(PathBuf::from)
            .ok_or_else(|| Error::Config("cannot expand ~: HOME is not set".to_string()))?
            .join(rest),
        Err(_) => path.to_path_buf(),
    };

    if expanded.is_absolute() {
        Ok(expanded)
    } else {
        Ok(std::env::current_dir()?.join(expanded))
    }
}

/// Create `dir` and its parents. A concurrent creator winning the race is not an error.
pub(crate) fn ensure_dir(dir: &Path) -> Result<()> {
    match fs::create_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists && dir.is_dir() => Ok(()),
        Err(e) => Err(Error::store_io(dir, e)),
    }
}

/// Remove a file or directory tree; absent paths are ignored.
fn remove_path(path: &Path) -> Result<()> {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(Error::store_io(path, e)),
    };

    let removed = if meta.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };

    match removed {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::store_io(path, e)),
    }
}

/// Recursively copy `src` into `dst`, overwriting files that already exist.
fn copy_tree(src: &Path, dst: &Path) -> Result<()> {
    for entry in WalkDir::new(src) {
        let entry = entry.map_err(|e| Error::store_io(src, e.into()))?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| Error::Other(e.to_string()))?;
        let target = dst.join(rel);

        if entry.file_type().is_dir() {
            ensure_dir(&target)?;
        } else {
            fs::copy(entry.path(), &target).map_err(|e| Error::store_io(&target, e))?;
        }
    }
    Ok(())
}
