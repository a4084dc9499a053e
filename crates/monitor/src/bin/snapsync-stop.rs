//! Stop running checkpoint monitors

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn};

use monitor::stop::{DEFAULT_GRACE, DEFAULT_SIGNATURE};
use monitor::telemetry::filter_for;
use monitor::{find_processes, init_tracing, stop_process, StopOutcome};

#[derive(Debug, Parser)]
#[command(author, version, about = "Stop running checkpoint monitor processes")]
struct Cli {
    /// Command-line fragment identifying the monitor
    #[arg(long, default_value = DEFAULT_SIGNATURE)]
    signature: String,

    /// Seconds to wait after SIGTERM before sending SIGKILL
    #[arg(long, default_value_t = DEFAULT_GRACE.as_secs())]
    timeout: u64,
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing(&filter_for(env!("CARGO_CRATE_NAME")));
    let cli = Cli::parse();

    let processes = find_processes(&cli.signature);
    if processes.is_empty() {
        warn!(signature = %cli.signature, "No running monitor process found");
        return ExitCode::FAILURE;
    }

    let grace = Duration::from_secs(cli.timeout);
    let mut stopped = 0;
    for process in &processes {
        info!(pid = process.pid, cmdline = %process.cmdline, "Stopping process");
        let outcome = stop_process(process.pid, grace).await;
        match &outcome {
            StopOutcome::PermissionDenied => {
                error!(pid = process.pid, "Permission denied, try running as the process owner")
            }
            StopOutcome::Failed(reason) => error!(pid = process.pid, reason = %reason, "Failed to stop process"),
            other => info!(pid = process.pid, outcome = ?other, "Process stopped"),
        }
        if outcome.is_stopped() {
            stopped += 1;
        }
    }

    info!(found = processes.len(), stopped, "Stop summary");
    if stopped == processes.len() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
