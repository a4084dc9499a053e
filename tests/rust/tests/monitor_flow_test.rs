//! Trainer writes checkpoints, the monitor uploads them, a fresh node restores

mod common;

use std::time::Duration;

use anyhow::Result;
use common::write_snapshot;
use monitor::{open_version_store, PollLoop, TickOutcome};
use sync_core::config::StorageBackendConfig;
use sync_core::{LayoutStrategy, SyncConfig};
use tempfile::TempDir;
use versioning::{restore, ProgressTracker, RestoreOutcome, RestoreRequest, RetentionPolicy, Uploader};

fn config(dir: &TempDir, strategy: LayoutStrategy) -> Result<SyncConfig> {
    let body = format!(
        r#"
[store]
owner = "sunshk"
strategy = "{strategy}"

[store.backend]
type = "local"
root = "{}"

[monitor]
input_path = "{}"
poll_interval = 20
keep_count = 2
"#,
        dir.path().join("remote").display(),
        dir.path().join("trainer/run-a").display(),
    );
    let config = SyncConfig::from_toml_str(&body)?;
    config.validate()?;
    Ok(config)
}

async fn poll_loop(config: &SyncConfig) -> Result<PollLoop> {
    let store = open_version_store(&config.store).await?;
    let uploader = Uploader::new(store, RetentionPolicy::keep(config.monitor.keep_count));
    let tracker = ProgressTracker::from_config(&config.monitor);
    Ok(PollLoop::new(tracker, uploader, config.monitor.poll_interval)?)
}

#[tokio::test]
async fn test_train_sync_restore() -> Result<()> {
    common::init_logging();
    for strategy in [LayoutStrategy::Containers, LayoutStrategy::Branches] {
        let dir = TempDir::new()?;
        let config = config(&dir, strategy)?;
        let run = config.monitor.input_path.clone();
        std::fs::create_dir_all(&run)?;

        let mut poll = poll_loop(&config).await?;
        assert!(matches!(poll.tick().await, TickOutcome::Unset));

        for step in [100, 200, 300] {
            write_snapshot(&run, step);
            match poll.tick().await {
                TickOutcome::Uploaded(receipt) => assert_eq!(receipt.step, step),
                other => panic!("step {step}: unexpected outcome {other:?}"),
            }
            // Identifiers have second resolution
            tokio::time::sleep(Duration::from_millis(1100)).await;
        }
        assert!(matches!(poll.tick().await, TickOutcome::UpToDate { step: 300 }));

        // A fresh node restores the newest version into an empty directory
        let target = dir.path().join("node-2").join("run-a");
        let store = open_version_store(&config.store).await?;
        let outcome = restore(store.clone(), &RestoreRequest::new(&target)).await?;
        let summary = match outcome {
            RestoreOutcome::Restored { summary, .. } => summary,
            other => panic!("expected a restore, got {other:?}"),
        };
        assert!(summary.files >= 3);
        assert_eq!(
            std::fs::read_to_string(target.join("global_step_300/actor/model.bin"))?,
            "weights@300"
        );
        assert_eq!(
            std::fs::read_to_string(target.join("latest_checkpointed_iteration.txt"))?,
            "300"
        );

        // Only the two newest versions survive
        let valid = versioning::Resolver::new(store.clone())
            .list_valid(poll.series())
            .await;
        assert_eq!(valid.len(), 2);

        // Restoring again leaves the directory alone
        let again = restore(store, &RestoreRequest::new(&target)).await?;
        assert_eq!(again, RestoreOutcome::AlreadyPresent);
    }
    Ok(())
}

#[tokio::test]
async fn test_fresh_run_has_nothing_to_resume() -> Result<()> {
    let dir = TempDir::new()?;
    let config = config(&dir, LayoutStrategy::Containers)?;
    assert!(matches!(
        config.store.backend,
        StorageBackendConfig::Local { .. }
    ));

    let store = open_version_store(&config.store).await?;
    let target = dir.path().join("node-1").join("run-a");
    let outcome = restore(store, &RestoreRequest::new(&target)).await?;
    assert_eq!(outcome, RestoreOutcome::NothingFound);
    assert!(!target.exists());
    Ok(())
}

#[tokio::test]
async fn test_run_stops_on_shutdown() -> Result<()> {
    let dir = TempDir::new()?;
    let config = config(&dir, LayoutStrategy::Branches)?;
    let run = config.monitor.input_path.clone();
    std::fs::create_dir_all(&run)?;

    let mut poll = poll_loop(&config).await?;
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();

    let trainer = {
        let run = run.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            write_snapshot(&run, 7);
            tokio::time::sleep(Duration::from_millis(500)).await;
            let _ = tx.send(());
        })
    };

    poll.run(async {
        let _ = rx.await;
    })
    .await;
    trainer.await?;

    assert_eq!(poll.last_uploaded_step(), 7);
    Ok(())
}
