//! Tracing setup for the `iwpotest` binary.
//!
//! Diagnostics go to stderr; stdout carries only the run report.

use anyhow::{Result, anyhow};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use iwpotest_core::config::GeneralConfig;

/// Install the global subscriber from `[general]`.
///
/// `RUST_LOG`, when set, replaces `log_level`. `log_format` is `json`
/// (one object per line) or `pretty`. A second call fails.
pub fn init_tracing(config: &GeneralConfig) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match config.log_format.as_str() {
        "json" => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init(),
        "pretty" => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_writer(std::io::stderr),
            )
            .try_init(),
        other => {
            return Err(anyhow!(
                "unknown log format '{other}', expected 'json' or 'pretty'"
            ));
        }
    };
    installed.map_err(|e| anyhow!("tracing subscriber already installed: {e}"))
}
