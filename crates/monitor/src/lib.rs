//! Snapshot sync monitor
//!
//! Process-level pieces around the versioning protocol: the poll loop that
//! uploads new local snapshots, the store factory, shutdown handling,
//! tracing setup and the external stop utility.

pub mod cli;
pub mod poll;
pub mod shutdown;
pub mod stop;
pub mod store;
pub mod telemetry;

pub use poll::{PollLoop, TickOutcome};
pub use shutdown::shutdown_signal;
pub use stop::{find_processes, stop_process, ProcessInfo, StopOutcome};
pub use store::open_version_store;
pub use telemetry::init_tracing;
