//! Checkpoint monitor entry point
//!
//! Watches a training output directory and uploads every new checkpoint as a
//! versioned snapshot until interrupted.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing::info;

use monitor::cli::StoreArgs;
use monitor::telemetry::filter_for;
use monitor::{init_tracing, open_version_store, shutdown_signal, PollLoop};
use sync_core::Error;
use versioning::{ProgressTracker, RetentionPolicy, Uploader};

#[derive(Debug, Parser)]
#[command(author, version, about = "Upload new training checkpoints as versioned snapshots")]
struct Cli {
    /// Directory the trainer writes checkpoints into
    #[arg(long, required_unless_present = "config")]
    input_path: Option<PathBuf>,

    /// Seconds between progress checks
    #[arg(long)]
    interval: Option<u64>,

    /// Number of complete versions to keep
    #[arg(long)]
    keep: Option<usize>,

    /// Seconds an incomplete version is protected from cleanup
    #[arg(long)]
    incomplete_grace: Option<u64>,

    #[command(flatten)]
    store: StoreArgs,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    init_tracing(&filter_for(env!("CARGO_CRATE_NAME")));
    let cli = Cli::parse();

    let mut config = cli.store.load()?;
    if let Some(input_path) = cli.input_path {
        config.monitor.input_path = input_path;
    }
    if let Some(secs) = cli.interval {
        config.monitor.poll_interval = Duration::from_secs(secs);
    }
    if let Some(keep) = cli.keep {
        config.monitor.keep_count = keep;
    }
    if let Some(secs) = cli.incomplete_grace {
        config.monitor.incomplete_grace = Duration::from_secs(secs);
    }
    config.validate()?;

    if !config.monitor.input_path.is_dir() {
        return Err(Error::SourceMissing {
            path: config.monitor.input_path.display().to_string(),
        }
        .into());
    }

    let store = open_version_store(&config.store).await?;
    let policy = RetentionPolicy::keep(config.monitor.keep_count)
        .with_grace(config.monitor.incomplete_grace);
    let uploader = Uploader::new(store, policy).with_progress_file(config.monitor.progress_file.clone());
    let tracker = ProgressTracker::from_config(&config.monitor);

    let mut poll = PollLoop::new(tracker, uploader, config.monitor.poll_interval)?;
    info!(
        series = %poll.series(),
        keep_count = config.monitor.keep_count,
        strategy = %config.store.strategy,
        "Checkpoint monitor started"
    );

    poll.run(shutdown_signal()).await;
    Ok(())
}
