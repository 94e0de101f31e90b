//! Artifact packing, content addressing and incremental sync.
//!
//! Artifacts travel through a store as single compressed tar blobs named
//! `<name>.tar<ext>`. Immutable artifacts are content-addressed under
//! `blobstore/<sha256>.tar<ext>`, so identical content uploaded by different
//! experiments shares one blob.

use std::fs;
use std::io::{self, Cursor, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tracing::debug;
use walkdir::WalkDir;

use super::local::ensure_dir;
use super::{to_key_path, ArtifactStore};
use crate::compression::Compression;
use crate::experiment::Artifact;
use crate::{Error, Result};

/// Key prefix for content-addressed blobs.
pub const BLOBSTORE_PREFIX: &str = "blobstore/";

/// Content-addressed key for an immutable artifact.
///
/// Identical `(hash, compression)` always yields the identical key.
#[must_use]
pub fn immutable_artifact_key(hash: &str, compression: Compression) -> String {
    format!("{BLOBSTORE_PREFIX}{hash}.tar{}", compression.extension())
}

/// SHA-256 of a file, or of a directory tree (sorted relative paths + bytes).
///
/// # Errors
/// Returns error if `path` is absent or unreadable.
pub fn content_hash(path: &Path) -> Result<String> {
    let meta = fs::metadata(path).map_err(|e| Error::store_io(path, e))?;
    let mut hasher = Sha256::new();

    if meta.is_dir() {
        for entry in WalkDir::new(path).sort_by_file_name() {
            let entry = entry.map_err(|e| Error::store_io(path, e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = entry
                .path()
                .strip_prefix(path)
                .map_err(|e| Error::Other(e.to_string()))?;
            hasher.update(to_key_path(rel).as_bytes());
            hasher.update([0u8]);
            hash_file(&mut hasher, entry.path())?;
            hasher.update([0u8]);
        }
    } else {
        hash_file(&mut hasher, path)?;
    }

    Ok(hex::encode(hasher.finalize()))
}

fn hash_file(hasher: &mut Sha256, path: &Path) -> Result<()> {
    let mut file = fs::File::open(path).map_err(|e| Error::store_io(path, e))?;
    io::copy(&mut file, hasher).map_err(|e| Error::store_io(path, e))?;
    Ok(())
}

/// Pack `path` into a compressed tar archive.
///
/// A directory is archived by its contents; a file becomes a single entry
/// named by its file name.
///
/// # Errors
/// Returns error if `path` is absent or cannot be read.
pub fn pack(path: &Path, compression: Compression) -> Result<Vec<u8>> {
    let meta = fs::metadata(path).map_err(|e| Error::store_io(path, e))?;
    let mut builder = tar::Builder::new(Vec::new());

    if meta.is_dir() {
        for entry in WalkDir::new(path).min_depth(1).sort_by_file_name() {
            let entry = entry.map_err(|e| Error::store_io(path, e.into()))?;
            let rel = entry
                .path()
                .strip_prefix(path)
                .map_err(|e| Error::Other(e.to_string()))?;
            if entry.file_type().is_dir() {
                builder.append_dir(rel, entry.path())?;
            } else {
                builder.append_path_with_name(entry.path(), rel)?;
            }
        }
    } else {
        let name = path
            .file_name()
            .ok_or_else(|| Error::Other(format!("{} has no file name", path.display())))?;
        builder.append_path_with_name(path, name)?;
    }

    let archive = builder.into_inner()?;
    compression.compress(&archive)
}

/// Unpack an archive produced by [`pack`] into the directory `dest`.
///
/// # Errors
/// Returns error if decompression or extraction fails.
pub fn unpack(data: &[u8], compression: Compression, dest: &Path) -> Result<()> {
    let archive = compression.decompress(data)?;
    ensure_dir(dest)?;
    tar::Archive::new(Cursor::new(archive))
        .unpack(dest)
        .map_err(|e| Error::store_io(dest, e))
}

/// Pack and upload an artifact's local content, returning its storage key.
///
/// - mutable artifacts are written to their pre-assigned key, always
///   overwriting; the compression mode is taken from the key's extension
/// - immutable artifacts are content-addressed; the hash is recorded on the
///   artifact and the upload is skipped if the blob already exists
///
/// # Errors
/// [`Error::NotFound`] if the artifact has no local path, the path is absent,
/// or a mutable artifact has no assigned key.
pub fn put_artifact(
    store: &dyn ArtifactStore,
    artifact: &mut Artifact,
    compression: Compression,
) -> Result<String> {
    let local = artifact
        .local()
        .map(Path::to_path_buf)
        .ok_or_else(|| Error::NotFound("artifact has no local path".to_string()))?;
    if !local.exists() {
        return Err(Error::NotFound(local.display().to_string()));
    }

    let (key, compression) = if artifact.is_mutable() {
        let key = artifact
            .key()
            .ok_or_else(|| Error::NotFound("mutable artifact has no key".to_string()))?
            .to_string();
        let compression = Compression::from_key(&key);
        (key, compression)
    } else {
        let hash = match artifact.hash() {
            Some(hash) => hash.to_string(),
            None => content_hash(&local)?,
        };
        let key = immutable_artifact_key(&hash, compression);
        artifact.set_hash(hash);
        if store.exists(&key)? {
            debug!(key = %key, "immutable artifact already stored, skipping upload");
            artifact.set_key(key.clone());
            return Ok(key);
        }
        (key, compression)
    };

    let packed = pack(&local, compression)?;
    let mut staging = NamedTempFile::new()?;
    staging.write_all(&packed)?;
    staging.flush()?;
    store.upload(&key, staging.path())?;

    debug!(key = %key, bytes = packed.len(), "packed and uploaded artifact");
    artifact.set_key(key.clone());
    Ok(key)
}

/// Download and unpack an artifact into the directory `dest`.
///
/// With `only_newer`, an existing `dest` whose modification time is not older
/// than the stored blob is left untouched. This only saves work; clock skew
/// and mtime resolution can still cause a redundant or skipped download.
///
/// # Errors
/// [`Error::NotFound`] if the artifact has no key or the key is absent.
pub fn get_artifact(
    store: &dyn ArtifactStore,
    artifact: &Artifact,
    dest: &Path,
    only_newer: bool,
) -> Result<PathBuf> {
    let key = artifact
        .key()
        .ok_or_else(|| Error::NotFound("artifact has no storage key".to_string()))?;

    if only_newer && dest.exists() {
        let local_modified = fs::metadata(dest)
            .and_then(|m| m.modified())
            .map(DateTime::<Utc>::from)
            .map_err(|e| Error::store_io(dest, e))?;
        let remote_modified = store.timestamp_of(key)?;
        if local_modified >= remote_modified {
            debug!(key, dest = %dest.display(), "local copy is current, skipping download");
            return Ok(dest.to_path_buf());
        }
    }

    let staging = NamedTempFile::new()?;
    store.download(key, staging.path())?;
    let data = fs::read(staging.path()).map_err(|e| Error::store_io(staging.path(), e))?;
    unpack(&data, Compression::from_key(key), dest)?;

    debug!(key, dest = %dest.display(), "downloaded and unpacked artifact");
    Ok(dest.to_path_buf())
}
