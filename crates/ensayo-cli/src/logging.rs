//! Logging setup
//!
//! Logs go to stderr so reports on stdout stay machine-readable. `RUST_LOG`
//! wins over the level derived from `-v`/`-q`.

use crate::config::Verbosity;
use crate::error::{CliError, CliResult};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Build the level filter
#[must_use]
pub fn filter(verbosity: Verbosity) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.filter_directive()))
}

/// Install the global subscriber
pub fn init(verbosity: Verbosity, json: bool) -> CliResult<()> {
    let json_layer = json.then(|| {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_current_span(true)
            .with_target(true)
    });
    let text_layer = (!json).then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .compact()
    });

    tracing_subscriber::registry()
        .with(filter(verbosity))
        .with(json_layer)
        .with(text_layer)
        .try_init()
        .map_err(|e| CliError::config(format!("failed to install logger: {e}")))
}
