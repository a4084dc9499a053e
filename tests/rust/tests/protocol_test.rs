//! End-to-end behaviour of upload, retention and resolution over a real store

mod common;

use std::sync::Arc;

use anyhow::Result;
use common::{ticking_clock, World, OWNER};
use sync_core::{LayoutStrategy, STEP_UNSET};
use versioning::{
    ProgressTracker, Resolver, RetentionManager, RetentionPolicy, Uploader, VersionId, VersionStore,
    COMPLETION_MARKER, PROGRESS_FILE,
};

fn uploader(world: &World, keep: usize) -> Uploader {
    Uploader::with_clock(
        world.store.clone(),
        RetentionPolicy::keep(keep),
        Arc::new(ticking_clock()),
    )
}

#[tokio::test]
async fn test_progress_150_upload_then_resolve() -> Result<()> {
    for strategy in [LayoutStrategy::Containers, LayoutStrategy::Branches] {
        let world = World::new(strategy);
        let snapshot = world.write_snapshot(150);

        let tracker = ProgressTracker::new(world.run_dir());
        let step = tracker.read_latest_step().await;
        assert_eq!(step, 150);
        assert_eq!(tracker.snapshot_dir(step), snapshot);

        let receipt = uploader(&world, 3)
            .upload(&snapshot, &tracker.series()?, step)
            .await?;
        assert_eq!(receipt.version.as_str(), "20250101_120000");
        let expected_name = match strategy {
            LayoutStrategy::Containers => format!("{OWNER}/run-a-20250101_120000"),
            LayoutStrategy::Branches => format!("{OWNER}/run-a@20250101_120000"),
        };
        assert_eq!(receipt.container.name, expected_name);

        let files = world.store.list_files(&receipt.container).await?;
        assert!(files.contains(&COMPLETION_MARKER.to_string()));
        assert!(files.contains(&PROGRESS_FILE.to_string()));
        assert!(files.contains(&"global_step_150/actor/model.bin".to_string()));
        assert!(files.contains(&"global_step_150/data.pt".to_string()));

        let latest = Resolver::new(world.store.clone())
            .resolve_latest(&world.series)
            .await
            .expect("uploaded version resolves");
        assert_eq!(latest.version, Some(receipt.version));
    }
    Ok(())
}

#[tokio::test]
async fn test_window_keeps_three_newest() -> Result<()> {
    let world = World::new(LayoutStrategy::Containers);
    for id in [
        "20250101_000000",
        "20250102_000000",
        "20250103_000000",
        "20250104_000000",
    ] {
        world.seed(id, true).await;
    }

    let report = RetentionManager::new(world.store.clone())
        .reconcile(&world.series, &RetentionPolicy::keep(3))
        .await;
    assert_eq!(report.pruned, vec![format!("{OWNER}/run-a-20250101_000000")]);
    assert_eq!(
        world.remote_versions().await,
        vec!["20250102_000000", "20250103_000000", "20250104_000000"]
    );
    Ok(())
}

#[tokio::test]
async fn test_newest_without_marker_is_deleted() -> Result<()> {
    let world = World::new(LayoutStrategy::Branches);
    world.seed("20250101_000000", true).await;
    world.seed("20250102_000000", true).await;
    world.seed("20250105_000000", false).await;

    let resolver = Resolver::new(world.store.clone());
    let latest = resolver.resolve_latest(&world.series).await.unwrap();
    assert_eq!(latest.version, VersionId::parse("20250102_000000"));

    let report = RetentionManager::new(world.store.clone())
        .reconcile(&world.series, &RetentionPolicy::keep(3))
        .await;
    assert_eq!(report.swept, vec![format!("{OWNER}/run-a@20250105_000000")]);
    assert_eq!(
        world.remote_versions().await,
        vec!["20250101_000000", "20250102_000000"]
    );
    Ok(())
}

#[tokio::test]
async fn test_retention_count_matches_window() -> Result<()> {
    for total in 0..6usize {
        for keep in 0..5usize {
            let world = World::new(LayoutStrategy::Containers);
            for day in 0..total {
                world.seed(&format!("202501{:02}_000000", day + 1), true).await;
            }
            let before = world.remote_versions().await;

            RetentionManager::new(world.store.clone())
                .reconcile(&world.series, &RetentionPolicy::keep(keep))
                .await;

            let after = world.remote_versions().await;
            assert_eq!(after.len(), keep.min(total));
            assert_eq!(after.as_slice(), &before[before.len() - after.len()..]);
        }
    }
    Ok(())
}

#[tokio::test]
async fn test_no_progress_means_no_upload() -> Result<()> {
    let world = World::new(LayoutStrategy::Containers);
    let tracker = ProgressTracker::new(world.run_dir());
    assert_eq!(tracker.read_latest_step().await, STEP_UNSET);

    std::fs::write(world.run_dir().join(PROGRESS_FILE), "latest")?;
    assert_eq!(tracker.read_latest_step().await, STEP_UNSET);
    Ok(())
}

#[tokio::test]
async fn test_same_step_twice_gives_two_versions() -> Result<()> {
    let world = World::new(LayoutStrategy::Containers);
    let snapshot = world.write_snapshot(200);
    let uploader = uploader(&world, 5);

    let first = uploader.upload(&snapshot, &world.series, 200).await?;
    let second = uploader.upload(&snapshot, &world.series, 200).await?;
    assert_ne!(first.version, second.version);
    assert_eq!(world.remote_versions().await.len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_resolver_is_idempotent() -> Result<()> {
    let world = World::new(LayoutStrategy::Branches);
    world.seed("20250101_000000", true).await;
    world.seed("20250102_000000", true).await;

    let resolver = Resolver::new(world.store.clone());
    let first = resolver.resolve_latest(&world.series).await;
    let second = resolver.resolve_latest(&world.series).await;
    assert!(first.is_some());
    assert_eq!(first, second);
    Ok(())
}

#[tokio::test]
async fn test_series_do_not_cross() -> Result<()> {
    let world = World::new(LayoutStrategy::Containers);
    world.seed("20250101_000000", true).await;

    // `run` is a prefix of `run-a` but a different series
    let other = versioning::Series::new("run")?;
    let resolver = Resolver::new(world.store.clone());
    assert!(resolver.resolve_latest(&other).await.is_none());

    let report = RetentionManager::new(world.store.clone())
        .reconcile(&other, &RetentionPolicy::keep(0))
        .await;
    assert_eq!(report.deleted(), 0);
    assert_eq!(world.remote_versions().await, vec!["20250101_000000"]);
    Ok(())
}
