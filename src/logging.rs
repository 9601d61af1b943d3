//! Logging setup for the `study` binary.
//!
//! Diagnostics go to stderr through `tracing-subscriber`; stdout carries
//! only answers. Verbosity follows `RUST_LOG` and defaults to `info` for
//! this crate and `warn` for dependencies.

use anyhow::Result;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const DEFAULT_FILTER: &str = "warn,study_harness=info,study=info";

pub fn init() -> Result<()> {
    init_with(DEFAULT_FILTER)
}

/// Install the global subscriber. `fallback` is used when `RUST_LOG` is
/// unset or unparsable. Fails if a subscriber is already installed.
pub fn init_with(fallback: &str) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    let console_layer = fmt::layer()
        .with_target(false)
        .with_line_number(false)
        .with_file(false)
        .without_time()
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialise logging: {}", e))
}
