//! Storage provider integration tests
//!
//! Exercise the experiment registry end to end over both the local
//! (JSON files + directory store) and the in-memory backends.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::{json, Value};
use tempfile::TempDir;
use trueno_studio::auth::{AccessPolicy, StaticAuth};
use trueno_studio::experiment::{
    Artifact, Experiment, ExperimentStatus, StorageProvider, GUEST, WORKSPACE_TAG,
};
use trueno_studio::git::{GitInfo, GitInfoSource};
use trueno_studio::kv::{KeyValueProvider, KvEntry, MemoryKvProvider};
use trueno_studio::store::{ArtifactStore, MemoryArtifactStore};
use trueno_studio::{Compression, Error, Result, StorageConfig};

fn memory_provider() -> StorageProvider {
    StorageProvider::builder(
        Arc::new(MemoryKvProvider::new()),
        Arc::new(MemoryArtifactStore::default()),
    )
    .git(None)
    .build()
    .unwrap()
}

fn local_provider(root: &Path) -> StorageProvider {
    StorageProvider::local(&StorageConfig::with_folder(root.join("store"))).unwrap()
}

fn output_dir(root: &Path) -> std::path::PathBuf {
    let dir = root.join("exp1-output");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("output.txt"), "hello").unwrap();
    dir
}

// =============================================================================
// Add / get / delete
// =============================================================================

#[test]
fn test_local_add_get_and_fetch_artifact() {
    let tmp = TempDir::new().unwrap();
    let provider = local_provider(tmp.path());

    let experiment = Experiment::builder("exp1")
        .filename("train.py")
        .artifact("output", Artifact::mutable(output_dir(tmp.path())))
        .build();
    provider.add_experiment(experiment, None, None).unwrap();

    let fetched = provider.get_experiment("exp1", None).unwrap();
    assert_eq!(fetched.key(), "exp1");
    assert_eq!(fetched.owner(), GUEST);
    assert_eq!(fetched.status(), ExperimentStatus::Waiting);
    assert!(fetched.time_added().is_some());
    assert_eq!(fetched.filename(), Some("train.py"));

    let output = fetched.artifact("output").unwrap();
    assert_eq!(output.key(), Some("users/guest/exp1.data/output.tar"));
    assert!(output.qualified().unwrap().starts_with("file://"));
    assert!(output.bucket().is_some());

    let dest = tmp.path().join("fetched");
    provider.get_artifact(output, &dest, false).unwrap();
    assert_eq!(fs::read_to_string(dest.join("output.txt")).unwrap(), "hello");
}

#[test]
fn test_add_replaces_existing_record() {
    let provider = memory_provider();

    let first = Experiment::builder("exp1").args(["--lr", "0.1"]).build();
    let first_added = provider
        .add_experiment(first, None, None)
        .unwrap()
        .time_added()
        .unwrap();
    provider.start_experiment("exp1", None).unwrap();
    std::thread::sleep(std::time::Duration::from_millis(5));

    let second = Experiment::builder("exp1").args(["--lr", "0.2"]).build();
    provider.add_experiment(second, None, None).unwrap();

    let fetched = provider.get_experiment("exp1", None).unwrap();
    assert_eq!(fetched.args(), ["--lr", "0.2"]);
    assert_eq!(fetched.status(), ExperimentStatus::Waiting);
    assert!(fetched.time_started().is_none());
    assert!(fetched.time_added().unwrap() > first_added);
    assert_eq!(provider.get_user_experiments(None).unwrap(), vec!["exp1"]);
}

#[test]
fn test_local_register_fetch_delete_scenario() {
    let tmp = TempDir::new().unwrap();
    let provider = local_provider(tmp.path());

    let experiment = Experiment::builder("exp1")
        .artifact("output", Artifact::mutable(output_dir(tmp.path())))
        .build();
    provider.add_experiment(experiment, None, None).unwrap();
    assert_eq!(provider.get_user_experiments(None).unwrap(), vec!["exp1"]);

    let fetched = provider.get_experiment("exp1", None).unwrap();
    let dest = tmp.path().join("fetched");
    provider
        .get_artifact(fetched.artifact("output").unwrap(), &dest, false)
        .unwrap();
    assert_eq!(fs::read_to_string(dest.join("output.txt")).unwrap(), "hello");

    provider.delete_experiment("exp1", None, true).unwrap();
    assert!(provider.get_user_experiments(None).unwrap().is_empty());
    assert!(matches!(
        provider.get_experiment("exp1", None),
        Err(Error::NotFound(_))
    ));
    assert!(!provider
        .store()
        .exists("users/guest/exp1.data/output.tar")
        .unwrap());
}

#[test]
fn test_malformed_keys_rejected_before_anything_is_removed() {
    let tmp = TempDir::new().unwrap();
    let provider = local_provider(tmp.path());
    let experiment = Experiment::builder("exp1")
        .artifact("output", Artifact::mutable(output_dir(tmp.path())))
        .build();
    provider.add_experiment(experiment, None, None).unwrap();
    provider
        .add_experiment(Experiment::new("exp2"), None, None)
        .unwrap();

    for bad in ["", ".", "..", "../guest", "/exp1", "exp1/", "a/b", "a\\b", "exp1.data"] {
        assert!(
            matches!(
                provider.add_experiment(Experiment::new(bad), None, None),
                Err(Error::InvalidKey(_))
            ),
            "add {bad:?}"
        );
        assert!(
            matches!(
                provider.delete_experiment(bad, None, true),
                Err(Error::InvalidKey(_))
            ),
            "delete {bad:?}"
        );
        assert!(matches!(
            provider.get_experiment(bad, None),
            Err(Error::InvalidKey(_))
        ));
    }
    for bad_user in ["", "..", "guest/exp1"] {
        assert!(matches!(
            provider.add_experiment(Experiment::new("exp3"), Some(bad_user), None),
            Err(Error::InvalidKey(_))
        ));
        assert!(matches!(
            provider.delete_experiment("exp1", Some(bad_user), true),
            Err(Error::InvalidKey(_))
        ));
    }

    assert_eq!(
        provider.get_user_experiments(None).unwrap(),
        vec!["exp1", "exp2"]
    );
    assert!(provider
        .store()
        .exists("users/guest/exp1.data/output.tar")
        .unwrap());
}

#[test]
fn test_get_missing_experiment_is_not_found() {
    let provider = memory_provider();
    assert!(matches!(
        provider.get_experiment("nope", None),
        Err(Error::NotFound(_))
    ));
}

#[test]
fn test_empty_registry_listings() {
    let tmp = TempDir::new().unwrap();
    let provider = local_provider(tmp.path());
    assert!(provider.get_user_experiments(None).unwrap().is_empty());
    assert!(provider.get_users().unwrap().is_empty());

    let provider = memory_provider();
    assert!(provider.get_user_experiments(Some("alice")).unwrap().is_empty());
}

#[test]
fn test_listing_hides_artifact_directories() {
    let tmp = TempDir::new().unwrap();
    let provider = local_provider(tmp.path());

    let experiment = Experiment::builder("exp1")
        .artifact("output", Artifact::mutable(output_dir(tmp.path())))
        .build();
    provider.add_experiment(experiment, None, None).unwrap();
    provider
        .add_experiment(Experiment::new("exp2"), None, None)
        .unwrap();

    assert_eq!(
        provider.get_user_experiments(None).unwrap(),
        vec!["exp1", "exp2"]
    );
    assert_eq!(provider.get_users().unwrap(), vec![GUEST]);
}

#[test]
fn test_delete_experiment_cascades_mutable_artifacts_only() {
    let tmp = TempDir::new().unwrap();
    let store = Arc::new(MemoryArtifactStore::default());
    let provider = StorageProvider::builder(Arc::new(MemoryKvProvider::new()), store.clone())
        .git(None)
        .build()
        .unwrap();

    let model = tmp.path().join("model.bin");
    fs::write(&model, b"weights").unwrap();

    let experiment = Experiment::builder("exp1")
        .artifact("output", Artifact::mutable(output_dir(tmp.path())))
        .artifact("model", Artifact::immutable(&model))
        .build();
    let added = provider.add_experiment(experiment, None, None).unwrap();
    let mutable_key = added.artifact("output").unwrap().key().unwrap().to_string();
    let immutable_key = added.artifact("model").unwrap().key().unwrap().to_string();
    assert!(store.exists(&mutable_key).unwrap());
    assert!(store.exists(&immutable_key).unwrap());

    provider.delete_experiment("exp1", None, true).unwrap();

    assert!(matches!(
        provider.get_experiment("exp1", None),
        Err(Error::NotFound(_))
    ));
    assert!(!store.exists(&mutable_key).unwrap());
    assert!(store.exists(&immutable_key).unwrap());

    provider.delete_experiment("exp1", None, true).unwrap();
}

#[test]
fn test_delete_without_artifacts_keeps_blobs() {
    let tmp = TempDir::new().unwrap();
    let store = Arc::new(MemoryArtifactStore::default());
    let provider = StorageProvider::builder(Arc::new(MemoryKvProvider::new()), store.clone())
        .git(None)
        .build()
        .unwrap();

    let experiment = Experiment::builder("exp1")
        .artifact("output", Artifact::mutable(output_dir(tmp.path())))
        .build();
    let added = provider.add_experiment(experiment, None, None).unwrap();

    provider.delete_experiment("exp1", None, false).unwrap();
    assert!(store
        .exists(added.artifact("output").unwrap().key().unwrap())
        .unwrap());
}

// =============================================================================
// Artifact key derivation
// =============================================================================

#[test]
fn test_mutable_and_immutable_keys_differ() {
    let tmp = TempDir::new().unwrap();
    let provider = memory_provider();

    let data = tmp.path().join("data.csv");
    fs::write(&data, "a,b\n1,2\n").unwrap();

    let experiment = Experiment::builder("exp1")
        .artifact("output", Artifact::mutable(output_dir(tmp.path())))
        .artifact("data", Artifact::immutable(&data))
        .build();
    let added = provider
        .add_experiment(experiment, None, Some(Compression::Zstd))
        .unwrap();

    let output = added.artifact("output").unwrap();
    assert_eq!(output.key(), Some("users/guest/exp1.data/output.tar.zst"));

    let data = added.artifact("data").unwrap();
    let hash = data.hash().unwrap();
    assert_eq!(hash.len(), 64);
    assert_eq!(data.key(), Some(format!("blobstore/{hash}.tar.zst").as_str()));
    assert_eq!(
        data.qualified(),
        Some(format!("mem://memory/blobstore/{hash}.tar.zst").as_str())
    );
}

#[test]
fn test_identical_immutable_content_is_shared() {
    let tmp = TempDir::new().unwrap();
    let store = Arc::new(MemoryArtifactStore::default());
    let provider = StorageProvider::builder(Arc::new(MemoryKvProvider::new()), store.clone())
        .git(None)
        .build()
        .unwrap();

    let a = tmp.path().join("a.bin");
    let b = tmp.path().join("b.bin");
    fs::write(&a, b"same").unwrap();
    fs::write(&b, b"same").unwrap();

    let first = provider
        .add_experiment(
            Experiment::builder("e1").artifact("data", Artifact::immutable(&a)).build(),
            None,
            None,
        )
        .unwrap();
    let second = provider
        .add_experiment(
            Experiment::builder("e2").artifact("data", Artifact::immutable(&b)).build(),
            None,
            None,
        )
        .unwrap();

    assert_eq!(
        first.artifact("data").unwrap().key(),
        second.artifact("data").unwrap().key()
    );
}

#[test]
fn test_hash_only_artifact_gets_blobstore_key() {
    let provider = memory_provider();
    let experiment = Experiment::builder("exp1")
        .artifact("data", Artifact::from_hash("deadbeef"))
        .build();
    let added = provider
        .add_experiment(experiment, None, Some(Compression::Lz4))
        .unwrap();
    assert_eq!(
        added.artifact("data").unwrap().key(),
        Some("blobstore/deadbeef.tar.lz4")
    );
}

#[test]
fn test_qualified_artifact_is_reverse_parsed() {
    let provider = memory_provider();
    let experiment = Experiment::builder("exp1")
        .artifact("plain", Artifact::from_qualified("gs://my-bucket/datasets/mnist.tar"))
        .artifact(
            "hosted",
            Artifact::from_qualified("https://storage.googleapis.com/shared/models/net.tar.lz4"),
        )
        .build();
    let added = provider.add_experiment(experiment, None, None).unwrap();

    let plain = added.artifact("plain").unwrap();
    assert_eq!(plain.bucket(), Some("my-bucket"));
    assert_eq!(plain.key(), Some("datasets/mnist.tar"));
    assert_eq!(plain.qualified(), Some("gs://my-bucket/datasets/mnist.tar"));

    let hosted = added.artifact("hosted").unwrap();
    assert_eq!(hosted.bucket(), Some("shared"));
    assert_eq!(hosted.key(), Some("models/net.tar.lz4"));
}

#[test]
fn test_local_qualified_location_can_be_registered_again() {
    let tmp = TempDir::new().unwrap();
    let provider = local_provider(tmp.path());
    let model = tmp.path().join("model.bin");
    fs::write(&model, b"weights").unwrap();

    let first = provider
        .add_experiment(
            Experiment::builder("e1").artifact("model", Artifact::immutable(&model)).build(),
            None,
            None,
        )
        .unwrap();
    let original = first.artifact("model").unwrap();
    let url = original.qualified().unwrap().to_string();
    assert!(url.starts_with("file:///"));
    assert!(trueno_studio::store::qualified::parse(&url).is_err());

    let second = provider
        .add_experiment(
            Experiment::builder("e2")
                .artifact("model", Artifact::from_qualified(&url))
                .build(),
            None,
            None,
        )
        .unwrap();
    let reused = second.artifact("model").unwrap();
    assert_eq!(reused.key(), original.key());
    assert_eq!(reused.bucket(), original.bucket());
    assert_eq!(reused.qualified(), Some(url.as_str()));

    let dest = tmp.path().join("fetched");
    provider.get_artifact(reused, &dest, false).unwrap();
    assert_eq!(fs::read(dest.join("model.bin")).unwrap(), b"weights");
}

#[test]
fn test_malformed_qualified_artifact_fails_add() {
    let provider = memory_provider();
    let experiment = Experiment::builder("exp1")
        .artifact("bad", Artifact::from_qualified("not-a-url"))
        .build();
    assert!(matches!(
        provider.add_experiment(experiment, None, None),
        Err(Error::ParseError(_))
    ));
}

#[test]
fn test_artifact_extra_fields_round_trip() {
    let provider = memory_provider();
    let experiment = Experiment::builder("exp1")
        .artifact(
            "data",
            Artifact::from_hash("abc").with_extra("format", json!("parquet")),
        )
        .extra("queue", json!("gpu-small"))
        .build();
    provider.add_experiment(experiment, None, None).unwrap();

    let fetched = provider.get_experiment("exp1", None).unwrap();
    assert_eq!(fetched.extra().get("queue"), Some(&json!("gpu-small")));
    assert_eq!(
        fetched.artifact("data").unwrap().extra().get("format"),
        Some(&json!("parquet"))
    );
}

// =============================================================================
// Checkpoint and sync
// =============================================================================

#[test]
fn test_checkpoint_uploads_latest_content() {
    let tmp = TempDir::new().unwrap();
    let provider = memory_provider();
    let output = output_dir(tmp.path());

    let experiment = Experiment::builder("exp1")
        .artifact("output", Artifact::mutable(&output))
        .build();
    let added = provider.add_experiment(experiment, None, None).unwrap();

    fs::write(output.join("output.txt"), "hello again").unwrap();
    assert_eq!(provider.checkpoint_experiment(&added).unwrap(), 1);

    let dest = tmp.path().join("fetched");
    provider
        .get_artifact(added.artifact("output").unwrap(), &dest, false)
        .unwrap();
    assert_eq!(
        fs::read_to_string(dest.join("output.txt")).unwrap(),
        "hello again"
    );
}

#[test]
fn test_checkpoint_skips_missing_local_content() {
    let tmp = TempDir::new().unwrap();
    let provider = memory_provider();

    let experiment = Experiment::builder("exp1")
        .artifact("output", Artifact::mutable(tmp.path().join("not-yet")))
        .build();
    let added = provider.add_experiment(experiment, None, None).unwrap();
    assert_eq!(provider.checkpoint_experiment(&added).unwrap(), 0);
}

#[test]
fn test_put_artifact_resolves_location() {
    let tmp = TempDir::new().unwrap();
    let provider = memory_provider();
    let file = tmp.path().join("weights.bin");
    fs::write(&file, b"w").unwrap();

    let mut artifact = Artifact::immutable(&file);
    let key = provider.put_artifact(&mut artifact).unwrap();
    assert!(key.starts_with("blobstore/"));
    assert_eq!(artifact.bucket(), Some("memory"));

    let dest = tmp.path().join("out");
    provider.get_artifact(&artifact, &dest, false).unwrap();
    assert_eq!(fs::read(dest.join("weights.bin")).unwrap(), b"w");
}

// =============================================================================
// Status lifecycle
// =============================================================================

#[test]
fn test_status_lifecycle() {
    let provider = memory_provider();
    provider
        .add_experiment(Experiment::new("exp1"), None, None)
        .unwrap();

    let running = provider.start_experiment("exp1", None).unwrap();
    assert_eq!(running.status(), ExperimentStatus::Running);
    assert!(running.time_started().is_some());

    let finished = provider.finish_experiment("exp1", None).unwrap();
    assert_eq!(finished.status(), ExperimentStatus::Finished);
    assert!(finished.time_finished().is_some());
    assert_eq!(
        provider.get_experiment("exp1", None).unwrap().status(),
        ExperimentStatus::Finished
    );

    assert!(matches!(
        provider.stop_experiment("exp1", None),
        Err(Error::InvalidTransition {
            from: ExperimentStatus::Finished,
            to: ExperimentStatus::Stopped
        })
    ));
}

#[test]
fn test_stop_waiting_experiment() {
    let provider = memory_provider();
    provider
        .add_experiment(Experiment::new("exp1"), None, None)
        .unwrap();
    let stopped = provider.stop_experiment("exp1", None).unwrap();
    assert_eq!(stopped.status(), ExperimentStatus::Stopped);
    assert!(provider.start_experiment("exp1", None).is_err());
}

// =============================================================================
// Users, auth and policy
// =============================================================================

#[test]
fn test_authenticated_user_owns_experiments() {
    let provider = StorageProvider::builder(
        Arc::new(MemoryKvProvider::new()),
        Arc::new(MemoryArtifactStore::default()),
    )
    .auth(Box::new(StaticAuth::new("alice").email("alice@example.com")))
    .git(None)
    .build()
    .unwrap();
    assert_eq!(provider.userid(), "alice");

    let added = provider
        .add_experiment(Experiment::new("exp1"), None, None)
        .unwrap();
    assert_eq!(added.owner(), "alice");
    provider
        .add_experiment(Experiment::new("exp2"), Some("bob"), None)
        .unwrap();

    assert_eq!(provider.get_users().unwrap(), vec!["alice", "bob"]);
    assert_eq!(
        provider.get_user_experiments(Some("bob")).unwrap(),
        vec!["exp2"]
    );
    assert!(provider.get_experiment("exp2", None).is_err());
}

#[test]
fn test_auth_on_local_builder_leaves_guest_mode() {
    let tmp = TempDir::new().unwrap();
    let config = StorageConfig::with_folder(tmp.path().join("store"));
    assert!(config.guest);

    let provider = StorageProvider::local_builder(&config)
        .unwrap()
        .auth(Box::new(StaticAuth::new("alice")))
        .git(None)
        .build()
        .unwrap();
    assert_eq!(provider.userid(), "alice");

    let provider = StorageProvider::local_builder(&config)
        .unwrap()
        .auth(Box::new(StaticAuth::new("alice")))
        .guest(true)
        .build()
        .unwrap();
    assert_eq!(provider.userid(), GUEST);
}

#[test]
fn test_guest_mode_ignores_auth() {
    let provider = StorageProvider::builder(
        Arc::new(MemoryKvProvider::new()),
        Arc::new(MemoryArtifactStore::default()),
    )
    .auth(Box::new(StaticAuth::new("alice")))
    .guest(true)
    .git(None)
    .build()
    .unwrap();
    assert_eq!(provider.userid(), GUEST);
}

struct OwnerOnly;

impl AccessPolicy for OwnerOnly {
    fn can_write(&self, key: &str, user: &str) -> bool {
        key.starts_with(&format!("users/{user}/"))
    }

    fn can_read(&self, _path: &str, _user: &str) -> bool {
        true
    }
}

#[test]
fn test_access_policy_hooks() {
    let provider = memory_provider();
    assert!(provider.can_write("users/guest/exp1", None));
    assert!(provider.can_read("users/", Some("anyone")));

    let provider = StorageProvider::builder(
        Arc::new(MemoryKvProvider::new()),
        Arc::new(MemoryArtifactStore::default()),
    )
    .policy(Box::new(OwnerOnly))
    .git(None)
    .build()
    .unwrap();
    assert!(provider.can_write("users/guest/exp1", None));
    assert!(!provider.can_write("users/alice/exp1", None));
    assert!(provider.can_write("users/alice/exp1", Some("alice")));
}

#[test]
fn test_browse_caps_listing() {
    let provider = StorageProvider::builder(
        Arc::new(MemoryKvProvider::new()),
        Arc::new(MemoryArtifactStore::default()),
    )
    .max_keys(2)
    .git(None)
    .build()
    .unwrap();
    for key in ["e1", "e2", "e3"] {
        provider
            .add_experiment(Experiment::new(key), None, None)
            .unwrap();
    }

    let listing = provider
        .browse("users/guest/")
        .unwrap()
        .and_then(KvEntry::into_listing)
        .unwrap();
    assert_eq!(listing, vec!["e1", "e2"]);

    let doc = provider
        .browse("users/guest/e3")
        .unwrap()
        .and_then(KvEntry::into_document)
        .unwrap();
    assert_eq!(doc["key"], json!("e3"));
    assert!(provider.browse("users/nobody").unwrap().is_none());
}

#[test]
fn test_zero_max_keys_rejected() {
    let result = StorageProvider::builder(
        Arc::new(MemoryKvProvider::new()),
        Arc::new(MemoryArtifactStore::default()),
    )
    .max_keys(0)
    .build();
    assert!(matches!(result, Err(Error::Config(_))));
}

// =============================================================================
// Git metadata
// =============================================================================

struct FailingGit;

impl GitInfoSource for FailingGit {
    fn git_info(&self, _path: &Path) -> Result<Option<GitInfo>> {
        Err(Error::Other("git exploded".to_string()))
    }
}

#[test]
fn test_git_failure_does_not_fail_add() {
    let tmp = TempDir::new().unwrap();
    let provider = StorageProvider::builder(
        Arc::new(MemoryKvProvider::new()),
        Arc::new(MemoryArtifactStore::default()),
    )
    .git(Some(Box::new(FailingGit)))
    .build()
    .unwrap();

    let experiment = Experiment::builder("exp1")
        .artifact(WORKSPACE_TAG, Artifact::mutable(output_dir(tmp.path())))
        .build();
    let added = provider.add_experiment(experiment, None, None).unwrap();
    assert!(added.git().is_none());
}

#[test]
fn test_git_metadata_attached_for_workspace_repository() {
    let tmp = TempDir::new().unwrap();
    let workspace = tmp.path().join("ws");
    fs::create_dir_all(&workspace).unwrap();
    git2::Repository::init(&workspace).unwrap();
    fs::write(workspace.join("train.py"), "print('hi')").unwrap();

    let provider = StorageProvider::builder(
        Arc::new(MemoryKvProvider::new()),
        Arc::new(MemoryArtifactStore::default()),
    )
    .build()
    .unwrap();

    let experiment = Experiment::builder("exp1")
        .artifact(WORKSPACE_TAG, Artifact::mutable(&workspace))
        .build();
    let added = provider.add_experiment(experiment, None, None).unwrap();
    let git = added.git().unwrap();
    assert!(git.contains_key("workdir"));

    let fetched = provider.get_experiment("exp1", None).unwrap();
    assert_eq!(fetched.git(), added.git());
}

// =============================================================================
// Resource release
// =============================================================================

#[derive(Default)]
struct CountingKv {
    inner: MemoryKvProvider,
    closes: AtomicUsize,
}

impl KeyValueProvider for CountingKv {
    fn get(&self, key: &str, shallow: bool) -> Result<Option<KvEntry>> {
        self.inner.get(key, shallow)
    }

    fn set(&self, key: &str, value: &Value) -> Result<()> {
        self.inner.set(key, value)
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.inner.delete(key)
    }

    fn close(&self) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[test]
fn test_close_releases_once() {
    let kv = Arc::new(CountingKv::default());
    let provider = StorageProvider::builder(kv.clone(), Arc::new(MemoryArtifactStore::default()))
        .git(None)
        .build()
        .unwrap();
    provider.close().unwrap();
    assert_eq!(kv.closes.load(Ordering::SeqCst), 1);
}

#[test]
fn test_drop_releases_resources() {
    let kv = Arc::new(CountingKv::default());
    {
        let _provider =
            StorageProvider::builder(kv.clone(), Arc::new(MemoryArtifactStore::default()))
                .git(None)
                .build()
                .unwrap();
    }
    assert_eq!(kv.closes.load(Ordering::SeqCst), 1);
}

#[test]
fn test_local_config_compression_applies() {
    let tmp = TempDir::new().unwrap();
    let config = StorageConfig {
        compression: Compression::Lz4,
        ..StorageConfig::with_folder(tmp.path().join("store"))
    };
    let provider = StorageProvider::local(&config).unwrap();

    let experiment = Experiment::builder("exp1")
        .artifact("output", Artifact::mutable(output_dir(tmp.path())))
        .build();
    let added = provider.add_experiment(experiment, None, None).unwrap();
    let output = added.artifact("output").unwrap();
    assert_eq!(output.key(), Some("users/guest/exp1.data/output.tar.lz4"));

    let dest = tmp.path().join("fetched");
    provider.get_artifact(output, &dest, false).unwrap();
    assert_eq!(fs::read_to_string(dest.join("output.txt")).unwrap(), "hello");
}
