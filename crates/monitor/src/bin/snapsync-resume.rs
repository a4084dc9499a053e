//! Restore bootstrap entry point
//!
//! Populates a local checkpoint directory from the newest complete version
//! before training starts. Finding nothing is a normal outcome for a fresh run.

use std::path::PathBuf;

use clap::Parser;
use tracing::info;

use monitor::cli::StoreArgs;
use monitor::telemetry::filter_for;
use monitor::{init_tracing, open_version_store};
use versioning::{restore, RestoreOutcome, RestoreRequest, Series};

#[derive(Debug, Parser)]
#[command(author, version, about = "Restore the latest complete checkpoint version")]
struct Cli {
    /// Local checkpoint directory to populate; its base name is the series
    #[arg(long)]
    input_path: PathBuf,

    /// Series name when it differs from the directory name
    #[arg(long)]
    series: Option<String>,

    /// Exact container (`owner/name`) or branch to restore instead of the latest
    #[arg(long)]
    version: Option<String>,

    /// Replace an existing local directory
    #[arg(long)]
    force: bool,

    #[command(flatten)]
    store: StoreArgs,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    init_tracing(&filter_for(env!("CARGO_CRATE_NAME")));
    let cli = Cli::parse();

    let mut config = cli.store.load()?;
    if let Some(version) = cli.version {
        config.restore.version = Some(version);
    }
    config.restore.force |= cli.force;
    config.validate()?;

    let store = open_version_store(&config.store).await?;
    let request = RestoreRequest {
        target: cli.input_path,
        series: cli.series.map(Series::new).transpose()?,
        version_override: config.restore.version.clone(),
        force: config.restore.force,
    };

    match restore(store, &request).await? {
        RestoreOutcome::Restored { container, summary } => {
            info!(
                container = %container,
                files = summary.files,
                bytes = summary.bytes,
                target = %request.target.display(),
                "Checkpoint restored"
            );
        }
        RestoreOutcome::AlreadyPresent => {
            info!(target = %request.target.display(), "Checkpoint already present, use --force to replace it");
        }
        RestoreOutcome::NothingFound => {
            info!(target = %request.target.display(), "No complete checkpoint version found, starting from scratch");
        }
    }
    Ok(())
}
