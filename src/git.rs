//! Git metadata for workspace artifacts

use std::path::Path;

use git2::{ErrorCode, Repository, StatusOptions};
use serde_json::{Map, Value};

use crate::Result;

/// Git metadata mapping attached to an experiment.
pub type GitInfo = Map<String, Value>;

/// Source of git metadata for a local path.
pub trait GitInfoSource: Send + Sync {
    /// Metadata for the working tree containing `path`.
    ///
    /// Returns `Ok(None)` when `path` is not inside a working tree.
    fn git_info(&self, path: &Path) -> Result<Option<GitInfo>>;
}

/// [`GitInfoSource`] backed by libgit2.
///
/// Reports `branch`, `commit`, `remote_url` (origin), `workdir` and `dirty`
/// (tracked files modified).
#[derive(Debug, Default, Clone, Copy)]
pub struct Git2InfoSource;

impl GitInfoSource for Git2InfoSource {
    fn git_info(&self, path: &Path) -> Result<Option<GitInfo>> {
        let repo = match Repository::discover(path) {
            Ok(repo) => repo,
            Err(e) if e.code() == ErrorCode::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut info = GitInfo::new();
        if let Some(workdir) = repo.workdir() {
            info.insert("workdir".into(), Value::from(workdir.display().to_string()));
        }

        // Unborn HEAD (fresh repository) has no branch or commit yet.
        if let Ok(head) = repo.head() {
            if let Some(branch) = head.shorthand() {
                info.insert("branch".into(), Value::from(branch));
            }
            if let Ok(commit) = head.peel_to_commit() {
                info.insert("commit".into(), Value::from(commit.id().to_string()));
            }
        }

        if let Ok(remote) = repo.find_remote("origin") {
            if let Some(url) = remote.url() {
                info.insert("remote_url".into(), Value::from(url));
            }
        }

        if !repo.is_bare() {
            let mut opts = StatusOptions::new();
            opts.include_untracked(false).include_ignored(false);
            let dirty = !repo.statuses(Some(&mut opts))?.is_empty();
            info.insert("dirty".into(), Value::Bool(dirty));
        }

        Ok(Some(info))
    }
}
