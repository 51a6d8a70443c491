//! Log subscriber setup for the `archgate` binary.
//!
//! Library code only emits `tracing` events; installing a subscriber is the
//! binary's job.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Environment variable holding the log filter directives.
pub const LOG_ENV: &str = "ARCHGATE_LOG";
pub const DEFAULT_LOG_FILTER: &str = "warn";

pub fn log_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// Install the stderr fmt subscriber. A second call is a no-op.
pub fn init_logging() {
    let _ = tracing_subscriber::registry()
        .with(log_filter())
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .try_init();
}
