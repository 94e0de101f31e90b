//! Storage Provider - the experiment registry
//!
//! Maps a [`KeyValueProvider`] plus an [`ArtifactStore`] into per-user
//! experiment CRUD. Experiment documents live under
//! `users/<uid>/<experiment-key>`; mutable artifact blobs live next to them
//! under `users/<uid>/<experiment-key>.data/<tag>.tar<ext>`.
//!
//! No locking is performed: concurrent writers to the same experiment race
//! and the last one wins.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use super::{Artifact, Experiment, GUEST};
use crate::auth::{AccessPolicy, AllowAll, AuthProvider};
use crate::compression::Compression;
use crate::config::{StorageConfig, DEFAULT_MAX_KEYS};
use crate::git::{Git2InfoSource, GitInfoSource};
use crate::kv::{KeyValueProvider, KvEntry, LocalFilesProvider};
use crate::store::{packing, qualified, ArtifactStore};
use crate::{Error, Result};

/// Root of the per-user namespace.
pub const USERS_KEYBASE: &str = "users/";

/// Tag of the artifact holding the experiment's working directory.
pub const WORKSPACE_TAG: &str = "workspace";

/// Namespace prefix for `userid`: `users/<uid>/`.
#[must_use]
pub fn user_keybase(userid: &str) -> String {
    format!("{USERS_KEYBASE}{userid}/")
}

/// Suffix of the directory holding an experiment's mutable artifacts.
const ARTIFACT_DIR_SUFFIX: &str = ".data";

/// Check that `value` names exactly one entry below its parent namespace.
///
/// Empty values, `.`/`..`, separators and the artifact directory suffix are
/// rejected: any of them would make a record key address a whole prefix or a
/// sibling's artifacts, and record keys are deleted recursively.
///
/// # Errors
/// [`Error::InvalidKey`] if `value` is not a single plain segment.
pub fn validate_key_segment(value: &str) -> Result<()> {
    let reason = if value.is_empty() {
        "is empty"
    } else if value == "." || value == ".." {
        "is a relative path component"
    } else if value.contains(['/', '\\']) {
        "contains a path separator"
    } else if value.ends_with(ARTIFACT_DIR_SUFFIX) {
        "ends with the artifact directory suffix"
    } else {
        return Ok(());
    };
    Err(Error::InvalidKey(format!("{value:?} {reason}")))
}

/// Storage key of an experiment document.
#[must_use]
pub fn experiment_record_key(userid: &str, experiment_key: &str) -> String {
    format!("{}{experiment_key}", user_keybase(userid))
}

/// Versioned key of a mutable artifact, unique per experiment and tag.
#[must_use]
pub fn mutable_artifact_key(
    userid: &str,
    experiment_key: &str,
    tag: &str,
    compression: Compression,
) -> String {
    format!(
        "{}{experiment_key}{ARTIFACT_DIR_SUFFIX}/{tag}.tar{}",
        user_keybase(userid),
        compression.extension()
    )
}

/// Experiment registry over a key-value provider and an artifact store.
///
/// Dropping the provider releases the provider's and the store's transport
/// resources; [`StorageProvider::close`] does the same and reports errors.
pub struct StorageProvider {
    kv: Arc<dyn KeyValueProvider>,
    store: Arc<dyn ArtifactStore>,
    auth: Option<Box<dyn AuthProvider>>,
    policy: Box<dyn AccessPolicy>,
    git: Option<Box<dyn GitInfoSource>>,
    compression: Compression,
    max_keys: usize,
    closed: bool,
}

impl std::fmt::Debug for StorageProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageProvider")
            .field("backend", &self.store.backend_type())
            .field("bucket", &self.store.bucket())
            .field("authenticated", &self.auth.is_some())
            .field("compression", &self.compression)
            .field("max_keys", &self.max_keys)
            .finish_non_exhaustive()
    }
}

impl StorageProvider {
    /// Create a builder over the given provider and store.
    #[must_use]
    pub fn builder(
        kv: Arc<dyn KeyValueProvider>,
        store: Arc<dyn ArtifactStore>,
    ) -> StorageProviderBuilder {
        StorageProviderBuilder::new(kv, store)
    }

    /// Open a registry on a local folder: JSON documents and artifacts share
    /// the folder configured in `config`.
    ///
    /// # Errors
    /// Returns error if the configuration is invalid or the folder cannot be created.
    pub fn local(config: &StorageConfig) -> Result<Self> {
        Self::local_builder(config).and_then(StorageProviderBuilder::build)
    }

    /// Builder for a local registry, for hosts that need to attach an auth
    /// context or policy before opening.
    ///
    /// # Errors
    /// Returns error if the configuration is invalid or the folder cannot be created.
    pub fn local_builder(config: &StorageConfig) -> Result<StorageProviderBuilder> {
        config.validate()?;
        let kv = LocalFilesProvider::new(&config.folder)?;
        let store = kv.store();
        Ok(Self::builder(Arc::new(kv), store)
            .compression(config.compression)
            .max_keys(config.max_keys)
            .guest(config.guest))
    }

    /// The artifact store.
    #[must_use]
    pub fn store(&self) -> &dyn ArtifactStore {
        self.store.as_ref()
    }

    /// The key-value provider.
    #[must_use]
    pub fn kv(&self) -> &dyn KeyValueProvider {
        self.kv.as_ref()
    }

    /// Default compression for packed artifacts.
    #[must_use]
    pub const fn compression(&self) -> Compression {
        self.compression
    }

    /// Cap on keys returned by [`StorageProvider::browse`].
    #[must_use]
    pub const fn max_keys(&self) -> usize {
        self.max_keys
    }

    /// Current user: the authenticated id, or [`GUEST`].
    #[must_use]
    pub fn userid(&self) -> String {
        self.auth
            .as_ref()
            .and_then(|auth| auth.user_id())
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| GUEST.to_string())
    }

    fn resolve_userid(&self, userid: Option<&str>) -> String {
        userid.map_or_else(|| self.userid(), str::to_string)
    }

    /// Resolve the owner and record key, rejecting keys that escape the record.
    fn record_location(&self, key: &str, userid: Option<&str>) -> Result<(String, String)> {
        let owner = self.resolve_userid(userid);
        validate_key_segment(&owner)?;
        validate_key_segment(key)?;
        let record_key = experiment_record_key(&owner, key);
        Ok((owner, record_key))
    }

    /// Register an experiment, replacing any existing record with the same key.
    ///
    /// Stamps `time_added` and `waiting`, attaches git metadata for the
    /// workspace (best effort), resolves a storage key and location for every
    /// artifact, persists the document and runs a blocking checkpoint.
    ///
    /// # Errors
    /// [`Error::InvalidKey`] if the experiment key or user id is not a single
    /// path segment, checked before anything is removed. Otherwise returns
    /// error if an artifact cannot be uploaded or resolved, or the document
    /// cannot be persisted.
    pub fn add_experiment(
        &self,
        mut experiment: Experiment,
        userid: Option<&str>,
        compression: Option<Compression>,
    ) -> Result<Experiment> {
        let (owner, record_key) = self.record_location(experiment.key(), userid)?;
        let compression = compression.unwrap_or(self.compression);

        self.kv.delete(&record_key)?;
        experiment.mark_added(Utc::now());
        self.attach_git_info(&mut experiment);

        let experiment_key = experiment.key().to_string();
        for (tag, artifact) in experiment.artifacts_mut() {
            self.resolve_artifact(&owner, &experiment_key, tag, artifact, compression)?;
        }

        experiment.set_owner(owner);
        self.kv
            .set(&record_key, &serde_json::to_value(&experiment)?)?;
        self.checkpoint_experiment(&experiment)?;

        info!(experiment = %experiment_key, owner = %experiment.owner(), "added experiment");
        Ok(experiment)
    }

    fn attach_git_info(&self, experiment: &mut Experiment) {
        let Some(git) = self.git.as_ref() else {
            return;
        };
        let Some(workspace) = experiment
            .artifact(WORKSPACE_TAG)
            .and_then(Artifact::local)
            .filter(|path| path.exists())
            .map(Path::to_path_buf)
        else {
            return;
        };

        match git.git_info(&workspace) {
            Ok(Some(info)) => experiment.set_git(info),
            Ok(None) => debug!(workspace = %workspace.display(), "workspace is not a git working tree"),
            Err(e) => warn!(workspace = %workspace.display(), error = %e, "failed to read git metadata"),
        }
    }

    fn resolve_artifact(
        &self,
        owner: &str,
        experiment_key: &str,
        tag: &str,
        artifact: &mut Artifact,
        compression: Compression,
    ) -> Result<()> {
        let key = if artifact.is_mutable() {
            Some(mutable_artifact_key(owner, experiment_key, tag, compression))
        } else if artifact.local().is_some() {
            Some(packing::put_artifact(
                self.store.as_ref(),
                artifact,
                compression,
            )?)
        } else {
            artifact
                .hash()
                .map(|hash| packing::immutable_artifact_key(hash, compression))
        };

        if let Some(key) = key {
            artifact.set_location(Some(self.store.url_for(&key)), self.store.bucket());
            artifact.set_key(key);
        } else if let Some(url) = artifact.qualified().map(str::to_string) {
            let (bucket, key) = match self.store.locate(&url) {
                Some(key) => (self.store.bucket(), key),
                None => qualified::parse(&url)?.into_parts(),
            };
            artifact.set_location(None, bucket);
            artifact.set_key(key);
        } else {
            debug!(tag, "artifact has no source; left unresolved");
        }
        Ok(())
    }

    /// Upload every mutable artifact that has local content. Blocks until done.
    ///
    /// Returns the number of artifacts uploaded.
    ///
    /// # Errors
    /// Returns error if packing or uploading fails.
    pub fn checkpoint_experiment(&self, experiment: &Experiment) -> Result<usize> {
        let mut uploaded = 0;
        for (tag, artifact) in experiment.artifacts() {
            if !artifact.is_mutable() || artifact.key().is_none() {
                continue;
            }
            if !artifact.local().is_some_and(Path::exists) {
                continue;
            }
            let mut artifact = artifact.clone();
            packing::put_artifact(self.store.as_ref(), &mut artifact, self.compression)?;
            debug!(experiment = %experiment.key(), tag = %tag, "checkpointed artifact");
            uploaded += 1;
        }
        Ok(uploaded)
    }

    /// Fetch a registered experiment.
    ///
    /// # Errors
    /// [`Error::NotFound`] if no record exists under the key,
    /// [`Error::InvalidKey`] if the key or user id is malformed.
    pub fn get_experiment(&self, key: &str, userid: Option<&str>) -> Result<Experiment> {
        let (_, record_key) = self.record_location(key, userid)?;
        match self.kv.get(&record_key, false)? {
            Some(KvEntry::Document(doc)) => Ok(serde_json::from_value(doc)?),
            Some(KvEntry::Listing(_)) => Err(Error::UnsupportedAccess(record_key)),
            None => Err(Error::NotFound(record_key)),
        }
    }

    /// Remove an experiment record.
    ///
    /// With `delete_artifacts`, the experiment's mutable artifact blobs are
    /// removed too. Immutable blobs may be shared with other experiments and
    /// are never removed here.
    ///
    /// # Errors
    /// [`Error::InvalidKey`] if the key or user id is malformed; otherwise
    /// returns error if the record or its artifacts cannot be removed.
    pub fn delete_experiment(
        &self,
        key: &str,
        userid: Option<&str>,
        delete_artifacts: bool,
    ) -> Result<()> {
        let (owner, record_key) = self.record_location(key, userid)?;

        if delete_artifacts {
            match self.get_experiment(key, Some(&owner)) {
                Ok(experiment) => {
                    for artifact in experiment.artifacts().values().filter(|a| a.is_mutable()) {
                        if let Some(artifact_key) = artifact.key() {
                            self.store.delete(artifact_key)?;
                        }
                    }
                    self.store
                        .delete(&format!("{record_key}{ARTIFACT_DIR_SUFFIX}"))?;
                }
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }

        self.kv.delete(&record_key)?;
        info!(experiment = %key, owner = %owner, "deleted experiment");
        Ok(())
    }

    /// Mark an experiment `running`.
    ///
    /// # Errors
    /// [`Error::InvalidTransition`] unless the experiment is `waiting`.
    pub fn start_experiment(&self, key: &str, userid: Option<&str>) -> Result<Experiment> {
        self.update_status(key, userid, Experiment::start)
    }

    /// Mark an experiment `stopped`.
    ///
    /// # Errors
    /// [`Error::InvalidTransition`] unless the experiment is `waiting` or `running`.
    pub fn stop_experiment(&self, key: &str, userid: Option<&str>) -> Result<Experiment> {
        self.update_status(key, userid, Experiment::stop)
    }

    /// Mark an experiment `finished`.
    ///
    /// # Errors
    /// [`Error::InvalidTransition`] unless the experiment is `running`.
    pub fn finish_experiment(&self, key: &str, userid: Option<&str>) -> Result<Experiment> {
        self.update_status(key, userid, Experiment::finish)
    }

    fn update_status(
        &self,
        key: &str,
        userid: Option<&str>,
        transition: fn(&mut Experiment) -> Result<()>,
    ) -> Result<Experiment> {
        let (owner, record_key) = self.record_location(key, userid)?;
        let mut experiment = self.get_experiment(key, Some(&owner))?;
        transition(&mut experiment)?;
        self.kv
            .set(&record_key, &serde_json::to_value(&experiment)?)?;
        info!(experiment = %key, status = %experiment.status(), "updated experiment status");
        Ok(experiment)
    }

    /// Keys of the experiments registered by `userid`; empty if none.
    ///
    /// # Errors
    /// Returns error if the user id is malformed or the namespace cannot be listed.
    pub fn get_user_experiments(&self, userid: Option<&str>) -> Result<Vec<String>> {
        let owner = self.resolve_userid(userid);
        validate_key_segment(&owner)?;
        let keybase = user_keybase(&owner);
        Ok(self
            .list(&keybase)?
            .into_iter()
            .filter(|name| !name.ends_with('/'))
            .collect())
    }

    /// Ids of all users with a namespace.
    ///
    /// # Errors
    /// Returns error if the user root cannot be listed.
    pub fn get_users(&self) -> Result<Vec<String>> {
        Ok(self
            .list(USERS_KEYBASE)?
            .into_iter()
            .map(|name| name.trim_end_matches('/').to_string())
            .collect())
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>> {
        match self.kv.get(prefix, true)? {
            Some(KvEntry::Listing(children)) => Ok(children),
            Some(KvEntry::Document(_)) => Err(Error::UnsupportedAccess(format!(
                "{prefix} is a document, not a prefix"
            ))),
            None => Ok(Vec::new()),
        }
    }

    /// May `user` (default: current user) write the experiment `key`?
    #[must_use]
    pub fn can_write(&self, key: &str, user: Option<&str>) -> bool {
        self.policy.can_write(key, &self.resolve_userid(user))
    }

    /// May `user` (default: current user) read `path`?
    #[must_use]
    pub fn can_read(&self, path: &str, user: Option<&str>) -> bool {
        self.policy.can_read(path, &self.resolve_userid(user))
    }

    /// Shallow view of any path; listings are capped at `max_keys`.
    ///
    /// # Errors
    /// Returns error if the path cannot be read.
    pub fn browse(&self, path: &str) -> Result<Option<KvEntry>> {
        Ok(self.kv.get(path, true)?.map(|entry| match entry {
            KvEntry::Listing(mut children) => {
                children.truncate(self.max_keys);
                KvEntry::Listing(children)
            }
            doc @ KvEntry::Document(_) => doc,
        }))
    }

    /// Upload an artifact with the default compression and resolve its location.
    ///
    /// # Errors
    /// See [`packing::put_artifact`].
    pub fn put_artifact(&self, artifact: &mut Artifact) -> Result<String> {
        let key = packing::put_artifact(self.store.as_ref(), artifact, self.compression)?;
        artifact.set_location(Some(self.store.url_for(&key)), self.store.bucket());
        Ok(key)
    }

    /// Download and unpack an artifact into the directory `dest`.
    ///
    /// # Errors
    /// See [`packing::get_artifact`].
    pub fn get_artifact(&self, artifact: &Artifact, dest: &Path, only_newer: bool) -> Result<PathBuf> {
        packing::get_artifact(self.store.as_ref(), artifact, dest, only_newer)
    }

    /// Release transport and artifact-store resources.
    ///
    /// # Errors
    /// Returns the first release error; both resources are released regardless.
    pub fn close(mut self) -> Result<()> {
        self.release()
    }

    fn release(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let kv = self.kv.close();
        let store = self.store.close();
        debug!(backend = self.store.backend_type(), "closed storage provider");
        kv.and(store)
    }
}

impl Drop for StorageProvider {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!(error = %e, "failed to release storage provider resources");
        }
    }
}

/// Builder for `StorageProvider`.
pub struct StorageProviderBuilder {
    kv: Arc<dyn KeyValueProvider>,
    store: Arc<dyn ArtifactStore>,
    auth: Option<Box<dyn AuthProvider>>,
    policy: Box<dyn AccessPolicy>,
    git: Option<Box<dyn GitInfoSource>>,
    compression: Compression,
    max_keys: usize,
    guest: bool,
}

impl StorageProviderBuilder {
    /// Create a new builder with the required backends.
    #[must_use]
    pub fn new(kv: Arc<dyn KeyValueProvider>, store: Arc<dyn ArtifactStore>) -> Self {
        Self {
            kv,
            store,
            auth: None,
            policy: Box::new(AllowAll),
            git: Some(Box::new(Git2InfoSource)),
            compression: Compression::None,
            max_keys: DEFAULT_MAX_KEYS,
            guest: false,
        }
    }

    /// Set the authentication context and leave guest mode.
    ///
    /// A later [`StorageProviderBuilder::guest`]`(true)` discards it again.
    #[must_use]
    pub fn auth(mut self, auth: Box<dyn AuthProvider>) -> Self {
        self.auth = Some(auth);
        self.guest = false;
        self
    }

    /// Ignore any authentication context (act as `guest`).
    #[must_use]
    pub const fn guest(mut self, guest: bool) -> Self {
        self.guest = guest;
        self
    }

    /// Set the access policy behind `can_read` / `can_write`.
    #[must_use]
    pub fn policy(mut self, policy: Box<dyn AccessPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Set the git metadata source; `None` disables git enrichment.
    #[must_use]
    pub fn git(mut self, git: Option<Box<dyn GitInfoSource>>) -> Self {
        self.git = git;
        self
    }

    /// Set the default artifact compression.
    #[must_use]
    pub const fn compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// Set the browse listing cap.
    #[must_use]
    pub const fn max_keys(mut self, max_keys: usize) -> Self {
        self.max_keys = max_keys;
        self
    }

    /// Build the `StorageProvider`.
    ///
    /// # Errors
    /// [`Error::Config`] if `max_keys` is zero.
    pub fn build(self) -> Result<StorageProvider> {
        if self.max_keys == 0 {
            return Err(Error::Config("max_keys must be positive".to_string()));
        }

        let auth = if self.guest { None } else { self.auth };
        if let Some(auth) = auth.as_ref() {
            if auth.expired() {
                warn!("authentication context is expired; operations may be rejected");
            } else {
                debug!(user = ?auth.user_id(), "opened storage provider as authenticated user");
            }
        }

        Ok(StorageProvider {
            kv: self.kv,
            store: self.store,
            auth,
            policy: self.policy,
            git: self.git,
            compression: self.compression,
            max_keys: self.max_keys,
            closed: false,
        })
    }
}
