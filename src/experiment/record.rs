//! Experiment - root entity of the experiment registry

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{Artifact, ExperimentStatus};
use crate::git::GitInfo;
use crate::{Error, Result};

/// Current version of the persisted experiment document.
pub const SCHEMA_VERSION: u32 = 1;

/// Owner id used when no user is authenticated.
pub const GUEST: &str = "guest";

const fn schema_version() -> u32 {
    SCHEMA_VERSION
}

fn guest() -> String {
    GUEST.to_string()
}

/// Experiment represents one tracked run: identity, owner, status,
/// artifacts and metadata.
///
/// Fields not covered by the schema are preserved in [`Experiment::extra`]
/// so documents written by newer clients survive a read-modify-write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experiment {
    #[serde(default = "schema_version")]
    schema_version: u32,
    key: String,
    #[serde(default = "guest")]
    owner: String,
    #[serde(default)]
    status: ExperimentStatus,
    #[serde(default)]
    time_added: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    time_started: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    time_finished: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    filename: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    args: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    project: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    hyperparameters: Map<String, Value>,
    #[serde(default)]
    artifacts: BTreeMap<String, Artifact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    git: Option<GitInfo>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl Experiment {
    /// Create an experiment with the given key and no artifacts.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self::builder(key).build()
    }

    /// Create a builder for constructing an experiment with optional fields.
    #[must_use]
    pub fn builder(key: impl Into<String>) -> ExperimentBuilder {
        ExperimentBuilder::new(key)
    }

    /// Schema version of this document.
    #[must_use]
    pub const fn schema_version(&self) -> u32 {
        self.schema_version
    }

    /// Unique experiment key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Owning user id (or [`GUEST`]).
    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Current status.
    #[must_use]
    pub const fn status(&self) -> ExperimentStatus {
        self.status
    }

    /// Registration timestamp, set by the registry.
    #[must_use]
    pub const fn time_added(&self) -> Option<DateTime<Utc>> {
        self.time_added
    }

    /// Start timestamp, if the experiment has started.
    #[must_use]
    pub const fn time_started(&self) -> Option<DateTime<Utc>> {
        self.time_started
    }

    /// End timestamp, if the experiment has finished or been stopped.
    #[must_use]
    pub const fn time_finished(&self) -> Option<DateTime<Utc>> {
        self.time_finished
    }

    /// Entry-point script, if any.
    #[must_use]
    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    /// Command-line arguments of the run.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Project the experiment belongs to, if any.
    #[must_use]
    pub fn project(&self) -> Option<&str> {
        self.project.as_deref()
    }

    /// Hyperparameters of the run.
    #[must_use]
    pub const fn hyperparameters(&self) -> &Map<String, Value> {
        &self.hyperparameters
    }

    /// All artifacts by tag.
    #[must_use]
    pub const fn artifacts(&self) -> &BTreeMap<String, Artifact> {
        &self.artifacts
    }

    /// Artifact with the given tag.
    #[must_use]
    pub fn artifact(&self, tag: &str) -> Option<&Artifact> {
        self.artifacts.get(tag)
    }

    /// Git metadata of the workspace, if it was a working tree.
    #[must_use]
    pub const fn git(&self) -> Option<&GitInfo> {
        self.git.as_ref()
    }

    /// Extension fields not covered by the schema.
    #[must_use]
    pub const fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }

    /// Transition to `running`, stamping `time_started`.
    ///
    /// # Errors
    /// [`Error::InvalidTransition`] unless the experiment is `waiting`.
    pub fn start(&mut self) -> Result<()> {
        self.transition(ExperimentStatus::Running)?;
        self.time_started = Some(Utc::now());
        Ok(())
    }

    /// Transition to `finished`, stamping `time_finished`.
    ///
    /// # Errors
    /// [`Error::InvalidTransition`] unless the experiment is `running`.
    pub fn finish(&mut self) -> Result<()> {
        self.transition(ExperimentStatus::Finished)?;
        self.time_finished = Some(Utc::now());
        Ok(())
    }

    /// Transition to `stopped`, stamping `time_finished`.
    ///
    /// # Errors
    /// [`Error::InvalidTransition`] unless the experiment is `waiting` or `running`.
    pub fn stop(&mut self) -> Result<()> {
        self.transition(ExperimentStatus::Stopped)?;
        self.time_finished = Some(Utc::now());
        Ok(())
    }

    fn transition(&mut self, to: ExperimentStatus) -> Result<()> {
        if !self.status.can_transition_to(to) {
            return Err(Error::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    /// Reset lifecycle fields for a fresh registration.
    pub(crate) fn mark_added(&mut self, at: DateTime<Utc>) {
        self.time_added = Some(at);
        self.time_started = None;
        self.time_finished = None;
        self.status = ExperimentStatus::Waiting;
    }

    pub(crate) fn set_owner(&mut self, owner: impl Into<String>) {
        self.owner = owner.into();
    }

    pub(crate) fn set_git(&mut self, git: GitInfo) {
        self.git = Some(git);
    }

    pub(crate) fn artifacts_mut(&mut self) -> &mut BTreeMap<String, Artifact> {
        &mut self.artifacts
    }
}

/// Builder for `Experiment`.
#[derive(Debug)]
pub struct ExperimentBuilder {
    key: String,
    filename: Option<String>,
    args: Vec<String>,
    project: Option<String>,
    hyperparameters: Map<String, Value>,
    artifacts: BTreeMap<String, Artifact>,
    extra: Map<String, Value>,
}

impl ExperimentBuilder {
    /// Create a new builder with the required key.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            filename: None,
            args: Vec::new(),
            project: None,
            hyperparameters: Map::new(),
            artifacts: BTreeMap::new(),
            extra: Map::new(),
        }
    }

    /// Set the entry-point script.
    #[must_use]
    pub fn filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// Set the command-line arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Set the project.
    #[must_use]
    pub fn project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    /// Add a hyperparameter.
    #[must_use]
    pub fn hyperparameter(mut self, name: impl Into<String>, value: Value) -> Self {
        self.hyperparameters.insert(name.into(), value);
        self
    }

    /// Attach an artifact under `tag`, replacing any previous one.
    #[must_use]
    pub fn artifact(mut self, tag: impl Into<String>, artifact: Artifact) -> Self {
        self.artifacts.insert(tag.into(), artifact);
        self
    }

    /// Add an extension field.
    #[must_use]
    pub fn extra(mut self, name: impl Into<String>, value: Value) -> Self {
        self.extra.insert(name.into(), value);
        self
    }

    /// Build the `Experiment`.
    #[must_use]
    pub fn build(self) -> Experiment {
        Experiment {
            schema_version: SCHEMA_VERSION,
            key: self.key,
            owner: guest(),
            status: ExperimentStatus::Waiting,
            time_added: None,
            time_started: None,
            time_finished: None,
            filename: self.filename,
            args: self.args,
            project: self.project,
            hyperparameters: self.hyperparameters,
            artifacts: self.artifacts,
            git: None,
            extra: self.extra,
        }
    }
}
