//! Experiment Registry
//!
//! Experiment documents, their artifacts and the [`StorageProvider`] that
//! persists them.
//!
//! ## Layout
//!
//! ```text
//! users/<uid>/<experiment-key>                      experiment document (JSON)
//! users/<uid>/<experiment-key>.data/<tag>.tar[.ext] mutable artifact blobs
//! blobstore/<sha256>.tar[.ext]                      immutable, content-addressed blobs
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use trueno_studio::config::StorageConfig;
//! use trueno_studio::experiment::{Artifact, Experiment, StorageProvider};
//!
//! # fn example() -> trueno_studio::Result<()> {
//! let provider = StorageProvider::local(&StorageConfig::with_folder("/tmp/studio"))?;
//!
//! let experiment = Experiment::builder("exp-001")
//!     .filename("train.py")
//!     .artifact("output", Artifact::mutable("/tmp/exp-001/output"))
//!     .build();
//!
//! let added = provider.add_experiment(experiment, None, None)?;
//! provider.start_experiment(added.key(), None)?;
//! provider.checkpoint_experiment(&added)?;
//! provider.finish_experiment(added.key(), None)?;
//! # Ok(())
//! # }
//! ```

mod artifact;
mod provider;
mod record;
mod status;

pub use artifact::Artifact;
pub use provider::{
    experiment_record_key, mutable_artifact_key, user_keybase, validate_key_segment,
    StorageProvider, StorageProviderBuilder, USERS_KEYBASE, WORKSPACE_TAG,
};
pub use record::{Experiment, ExperimentBuilder, GUEST, SCHEMA_VERSION};
pub use status::ExperimentStatus;
