//! Stop a running monitor from outside
//!
//! Finds processes by command-line signature, sends SIGTERM, waits for them
//! to exit and escalates to SIGKILL after the grace period.

use std::time::{Duration, Instant};

use sysinfo::{Pid, PidExt, Process, ProcessExt, ProcessStatus, System, SystemExt};
use tracing::{debug, info, warn};

/// Command-line signature of the monitor binary
pub const DEFAULT_SIGNATURE: &str = "snapsync-monitor";

/// How long a process gets to exit after SIGTERM
pub const DEFAULT_GRACE: Duration = Duration::from_secs(10);

const POLL_EVERY: Duration = Duration::from_secs(1);

/// A process whose command line matched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    pub pid: i32,
    pub cmdline: String,
}

/// How stopping one process ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopOutcome {
    /// Exited before it could be signalled
    AlreadyGone,

    /// Exited after SIGTERM
    Terminated,

    /// Needed SIGKILL
    Killed,

    /// Not allowed to signal it
    PermissionDenied,

    Failed(String),
}

impl StopOutcome {
    pub fn is_stopped(&self) -> bool {
        matches!(
            self,
            StopOutcome::AlreadyGone | StopOutcome::Terminated | StopOutcome::Killed
        )
    }
}

/// Processes whose command line contains `signature`, excluding this one
pub fn find_processes(signature: &str) -> Vec<ProcessInfo> {
    let mut system = System::new();
    system.refresh_processes();
    find_processes_in(&system, signature, std::process::id())
}

/// Match against an already refreshed process table
pub fn find_processes_in(system: &System, signature: &str, exclude_pid: u32) -> Vec<ProcessInfo> {
    let mut found: Vec<ProcessInfo> = system
        .processes()
        .iter()
        .filter(|(pid, process)| pid.as_u32() != exclude_pid && is_running(process))
        .filter_map(|(pid, process)| {
            let cmdline = command_line(process);
            cmdline.contains(signature).then(|| {
                debug!(pid = pid.as_u32(), cmdline = %cmdline, "Found matching process");
                ProcessInfo {
                    pid: pid.as_u32() as i32,
                    cmdline,
                }
            })
        })
        .collect();

    found.sort_by_key(|p| p.pid);
    found
}

fn command_line(process: &Process) -> String {
    // Kernel threads and some foreign processes expose no argv
    if process.cmd().is_empty() {
        process.name().to_string()
    } else {
        process.cmd().join(" ")
    }
}

fn is_running(process: &Process) -> bool {
    !matches!(process.status(), ProcessStatus::Zombie | ProcessStatus::Dead)
}

/// SIGTERM, wait up to `grace`, then SIGKILL
pub async fn stop_process(pid: i32, grace: Duration) -> StopOutcome {
    let mut system = System::new();
    match send_signal(pid, libc::SIGTERM) {
        Ok(()) => info!(pid, "Sent SIGTERM"),
        Err(outcome) => return outcome,
    }

    let deadline = Instant::now() + grace;
    while Instant::now() < deadline {
        if !is_alive(&mut system, pid) {
            info!(pid, "Process terminated");
            return StopOutcome::Terminated;
        }
        let left = deadline.saturating_duration_since(Instant::now());
        tokio::time::sleep(POLL_EVERY.min(left)).await;
    }
    if !is_alive(&mut system, pid) {
        info!(pid, "Process terminated");
        return StopOutcome::Terminated;
    }

    warn!(pid, grace_secs = grace.as_secs(), "Process still running, sending SIGKILL");
    match send_signal(pid, libc::SIGKILL) {
        Ok(()) => {}
        Err(StopOutcome::AlreadyGone) => return StopOutcome::Terminated,
        Err(outcome) => return outcome,
    }

    tokio::time::sleep(POLL_EVERY).await;
    if is_alive(&mut system, pid) {
        StopOutcome::Failed(format!("process {pid} survived SIGKILL"))
    } else {
        StopOutcome::Killed
    }
}

fn send_signal(pid: i32, signal: libc::c_int) -> std::result::Result<(), StopOutcome> {
    let rc = unsafe { libc::kill(pid, signal) };
    if rc == 0 {
        return Ok(());
    }
    Err(classify_signal_error(std::io::Error::last_os_error()))
}

fn classify_signal_error(err: std::io::Error) -> StopOutcome {
    match err.raw_os_error() {
        Some(libc::ESRCH) => StopOutcome::AlreadyGone,
        Some(libc::EPERM) => StopOutcome::PermissionDenied,
        _ => StopOutcome::Failed(err.to_string()),
    }
}

/// Still in the process table and not a zombie
fn is_alive(system: &mut System, pid: i32) -> bool {
    let pid = Pid::from_u32(pid as u32);
    if !system.refresh_process(pid) {
        return false;
    }
    system.process(pid).map(is_running).unwrap_or(false)
}
