//! # Trueno-Studio: Experiment and Artifact Storage
//!
//! **Version**: 0.1.0
//!
//! Trueno-Studio is the persistence layer of an ML experiment tracker. It
//! keeps experiment documents in a hierarchical key-value store and artifact
//! content (files and directory trees) in a blob backend.
//!
//! ## Design Principles
//!
//! - **Content addressing**: immutable artifacts are keyed by their SHA-256,
//!   so identical content is stored once
//! - **Versioned mutables**: mutable artifacts get one key per experiment and tag
//! - **Pluggable backends**: [`store::ArtifactStore`] and
//!   [`kv::KeyValueProvider`] are capability traits; key derivation lives above them
//! - **Explicit lifecycle**: `waiting -> running -> finished`, with `stopped`
//!   reachable from any live state
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use trueno_studio::{Artifact, Experiment, StorageConfig, StorageProvider};
//!
//! let provider = StorageProvider::local(&StorageConfig::with_folder("/tmp/studio"))?;
//!
//! let experiment = Experiment::builder("exp1")
//!     .artifact("output", Artifact::mutable("/tmp/exp1/output"))
//!     .build();
//! let added = provider.add_experiment(experiment, None, None)?;
//!
//! let fetched = provider.get_experiment("exp1", None)?;
//! assert_eq!(fetched.key(), added.key());
//! # Ok::<(), trueno_studio::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod auth;
pub mod compression;
pub mod config;
pub mod error;
pub mod experiment;
pub mod git;
pub mod kv;
pub mod store;
pub mod telemetry;

pub use compression::Compression;
pub use config::StorageConfig;
pub use error::{Error, Result};
pub use experiment::{Artifact, Experiment, ExperimentStatus, StorageProvider};
pub use kv::{KeyValueProvider, KvEntry, LocalFilesProvider};
pub use store::{ArtifactStore, LocalArtifactStore};
