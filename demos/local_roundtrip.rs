//! Local Round Trip: register, checkpoint and fetch an experiment
//!
//! Demonstrates the experiment registry on a local folder:
//! - mutable artifacts keyed per experiment (`users/<uid>/<key>.data/<tag>.tar`)
//! - immutable artifacts content-addressed under `blobstore/`
//! - the `waiting -> running -> finished` lifecycle
//!
//! Run with: cargo run --example local_roundtrip
//! Set `RUST_LOG=trueno_studio=debug` to see every store operation.

use std::fs;

use anyhow::Context;
use trueno_studio::experiment::{Artifact, Experiment};
use trueno_studio::{telemetry, Compression, StorageConfig, StorageProvider};

fn main() -> anyhow::Result<()> {
    telemetry::init("trueno_studio=info")?;

    println!("=== Trueno-Studio Local Round Trip ===\n");

    let scratch = tempfile::tempdir().context("creating scratch directory")?;
    let config = StorageConfig {
        compression: Compression::Lz4,
        ..StorageConfig::with_folder(scratch.path().join("store"))
    };
    let provider = StorageProvider::local(&config)?;

    // Workspace content
    let output = scratch.path().join("exp1-output");
    fs::create_dir_all(&output)?;
    fs::write(output.join("output.txt"), "hello")?;
    let dataset = scratch.path().join("dataset.csv");
    fs::write(&dataset, "x,y\n1,2\n3,4\n")?;

    let experiment = Experiment::builder("exp1")
        .filename("train.py")
        .args(["--epochs", "3"])
        .hyperparameter("lr", serde_json::json!(0.01))
        .artifact("output", Artifact::mutable(&output))
        .artifact("dataset", Artifact::immutable(&dataset))
        .build();

    let added = provider.add_experiment(experiment, None, None)?;
    println!("1. Registered '{}' for user '{}'", added.key(), added.owner());
    for (tag, artifact) in added.artifacts() {
        println!(
            "   {tag:<8} -> {}",
            artifact.qualified().unwrap_or("<unresolved>")
        );
    }

    provider.start_experiment("exp1", None)?;
    fs::write(output.join("output.txt"), "hello, epoch 3")?;
    let uploaded = provider.checkpoint_experiment(&added)?;
    println!("\n2. Checkpointed {uploaded} mutable artifact(s)");
    let finished = provider.finish_experiment("exp1", None)?;
    println!("3. Status: {}", finished.status());

    let fetched = provider.get_experiment("exp1", None)?;
    let dest = scratch.path().join("fetched");
    let output_artifact = fetched
        .artifact("output")
        .context("experiment has no output artifact")?;
    provider.get_artifact(output_artifact, &dest, false)?;
    println!(
        "4. Fetched output.txt: {:?}",
        fs::read_to_string(dest.join("output.txt"))?
    );

    println!("\n5. Experiments for guest: {:?}", provider.get_user_experiments(None)?);
    provider.delete_experiment("exp1", None, true)?;
    println!("6. After delete: {:?}", provider.get_user_experiments(None)?);

    provider.close()?;
    Ok(())
}
