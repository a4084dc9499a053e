//! Remote failures: per-item isolation, aborted uploads and resolver fallbacks

mod common;

use std::sync::Arc;

use anyhow::Result;
use common::{ticking_clock, FlakyStore, World, OWNER};
use sync_core::{Error, LayoutStrategy};
use versioning::{
    restore, Resolver, RestoreOutcome, RestoreRequest, RetentionManager, RetentionPolicy, Uploader,
    VersionStore, VersionStoreHandle,
};

#[tokio::test]
async fn test_failed_delete_does_not_stop_the_pass() -> Result<()> {
    let world = World::new(LayoutStrategy::Containers);
    for id in [
        "20250101_000000",
        "20250102_000000",
        "20250103_000000",
        "20250104_000000",
    ] {
        world.seed(id, true).await;
    }
    world.seed("20250105_000000", false).await;

    let flaky = FlakyStore::wrap(world.store.clone());
    flaky.fail_on("delete_version", "20250101_000000");
    let store: VersionStoreHandle = flaky.clone();

    let report = RetentionManager::new(store)
        .reconcile(&world.series, &RetentionPolicy::keep(2))
        .await;

    assert_eq!(report.failed.len(), 1);
    assert!(report.failed[0].0.ends_with("20250101_000000"));
    assert_eq!(report.swept, vec![format!("{OWNER}/run-a-20250105_000000")]);
    assert_eq!(report.pruned, vec![format!("{OWNER}/run-a-20250102_000000")]);
    assert_eq!(
        world.remote_versions().await,
        vec!["20250101_000000", "20250103_000000", "20250104_000000"]
    );
    Ok(())
}

#[tokio::test]
async fn test_unreadable_container_is_skipped_not_deleted() -> Result<()> {
    let world = World::new(LayoutStrategy::Branches);
    world.seed("20250101_000000", true).await;
    world.seed("20250102_000000", true).await;

    let flaky = FlakyStore::wrap(world.store.clone());
    flaky.fail_on("list_files", "20250102_000000");
    let store: VersionStoreHandle = flaky.clone();

    let report = RetentionManager::new(store.clone())
        .reconcile(&world.series, &RetentionPolicy::keep(0))
        .await;
    assert_eq!(report.pruned, vec![format!("{OWNER}/run-a@20250101_000000")]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(world.remote_versions().await, vec!["20250102_000000"]);

    // Until it can be validated it is not restorable either
    assert!(Resolver::new(store).resolve_latest(&world.series).await.is_none());
    Ok(())
}

#[tokio::test]
async fn test_listing_failure_is_nothing_found() -> Result<()> {
    let world = World::new(LayoutStrategy::Containers);
    world.seed("20250101_000000", true).await;

    let flaky = FlakyStore::wrap(world.store.clone());
    flaky.fail("list_versions");
    let store: VersionStoreHandle = flaky.clone();

    assert!(Resolver::new(store.clone()).resolve_latest(&world.series).await.is_none());

    let report = RetentionManager::new(store)
        .reconcile(&world.series, &RetentionPolicy::keep(0))
        .await;
    assert!(report.listing_error.is_some());
    assert_eq!(world.remote_versions().await, vec!["20250101_000000"]);
    Ok(())
}

#[tokio::test]
async fn test_upload_aborts_and_next_pass_sweeps() -> Result<()> {
    let world = World::new(LayoutStrategy::Containers);
    let snapshot = world.write_snapshot(150);
    let flaky = FlakyStore::wrap(world.store.clone());
    let store: VersionStoreHandle = flaky.clone();
    let uploader = Uploader::with_clock(store, RetentionPolicy::keep(3), Arc::new(ticking_clock()));

    flaky.fail("upload_folder");
    let result = uploader.upload(&snapshot, &world.series, 150).await;
    assert!(matches!(result, Err(Error::RemoteUnavailable { .. })));

    // The marker is never attempted once an earlier step failed
    let calls = flaky.calls();
    assert!(!calls.contains(&"mark_complete".to_string()));
    assert!(!calls.contains(&"delete_version".to_string()));
    assert_eq!(world.remote_versions().await, vec!["20250101_120000"]);
    assert!(Resolver::new(world.store.clone())
        .resolve_latest(&world.series)
        .await
        .is_none());

    // Retry creates a fresh version and the half-written one is swept
    flaky.heal();
    let receipt = uploader.upload(&snapshot, &world.series, 150).await?;
    assert_ne!(receipt.version.as_str(), "20250101_120000");
    assert_eq!(receipt.retention.swept, vec![format!("{OWNER}/run-a-20250101_120000")]);
    assert_eq!(world.remote_versions().await, vec![receipt.version.to_string()]);
    Ok(())
}

#[tokio::test]
async fn test_marker_failure_leaves_version_invalid() -> Result<()> {
    let world = World::new(LayoutStrategy::Branches);
    let snapshot = world.write_snapshot(10);
    let flaky = FlakyStore::wrap(world.store.clone());
    flaky.fail("mark_complete");
    let store: VersionStoreHandle = flaky.clone();

    let uploader = Uploader::with_clock(store, RetentionPolicy::keep(3), Arc::new(ticking_clock()));
    assert!(uploader.upload(&snapshot, &world.series, 10).await.is_err());

    // Every snapshot file arrived, but without the marker it does not exist
    let container = world.store.container(
        &world.series,
        &versioning::VersionId::parse("20250101_120000").unwrap(),
    );
    let files = world.store.list_files(&container).await?;
    assert!(files.iter().any(|f| f.starts_with("global_step_10/")));
    assert!(!world.store.is_complete(&container).await?);
    assert!(Resolver::new(world.store.clone())
        .resolve_latest(&world.series)
        .await
        .is_none());
    Ok(())
}

#[tokio::test]
async fn test_failed_download_leaves_no_directory() -> Result<()> {
    let world = World::new(LayoutStrategy::Containers);
    world.seed("20250101_000000", true).await;

    let flaky = FlakyStore::wrap(world.store.clone());
    flaky.fail("download");
    let store: VersionStoreHandle = flaky.clone();

    let target = world.dir.path().join("restore").join("run-a");
    std::fs::create_dir_all(target.parent().unwrap())?;
    let result = restore(store.clone(), &RestoreRequest::new(&target)).await;
    assert!(result.is_err());
    assert!(!target.exists());
    assert_eq!(std::fs::read_dir(target.parent().unwrap())?.count(), 0);

    flaky.heal();
    let outcome = restore(store, &RestoreRequest::new(&target)).await?;
    assert!(matches!(outcome, RestoreOutcome::Restored { .. }));
    Ok(())
}
