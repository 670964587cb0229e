//! Tracing subscriber setup for the harness binaries.
//!
//! Logs go to stderr so stdout stays free for drained tool output and
//! `--json` reports.

use crate::config::{LogFormat, LoggingConfig};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Filter from `RUST_LOG` if set, else the configured level.
pub fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber.
///
/// Returns `false` if a subscriber was already installed, which happens when
/// tests call this more than once.
pub fn init(config: &LoggingConfig) -> bool {
    let layer = match config.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .with_thread_names(true)
            .with_writer(std::io::stderr)
            .pretty()
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .compact()
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(layer.with_filter(env_filter(config)))
        .try_init()
        .is_ok()
}
