//! Tracing setup shared by the binaries

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "monitor=info,versioning=info,storage=warn";

/// Default filter plus `info` for a binary's own target
pub fn filter_for(target: &str) -> String {
    format!("{DEFAULT_FILTER},{target}=info")
}

/// Install the global subscriber: `RUST_LOG` if set, `default_filter` otherwise
pub fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into());

    // A second install (tests, embedding) keeps the first subscriber
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
