//! Tracing setup for `coffer-node`.
//!
//! Output goes to stderr; stdout is reserved for what `coffer-node address`
//! and `coffer-node version` print.

use clap::ValueEnum;
use tracing::Level;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Crates whose spans and events the node shows by default.
const COFFER_TARGETS: &[&str] = &["coffer_node", "coffer_core", "coffer_contracts"];

/// Per-request HTTP traces from the API layer.
const HTTP_TARGET: &str = "tower_http";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Colored, with source locations.
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Filter directives used when `RUST_LOG` is unset: every coffer crate at
/// `level`, HTTP traces one step quieter, everything else off.
pub fn default_directives(level: Level) -> String {
    let level_name = level.as_str().to_ascii_lowercase();
    let http = if level >= Level::DEBUG { "debug" } else { "info" };

    COFFER_TARGETS
        .iter()
        .map(|target| format!("{target}={level_name}"))
        .chain(std::iter::once(format!("{HTTP_TARGET}={http}")))
        .collect::<Vec<_>>()
        .join(",")
}

/// Installs the global subscriber. `RUST_LOG` wins over `level` when set.
///
/// Fails if a subscriber is already installed.
pub fn init_logging(level: Level, format: LogFormat) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_file(true)
                    .with_line_number(true),
            )
            .try_init()?,
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_current_span(false),
            )
            .try_init()?,
    }

    tracing::debug!(?format, %level, "logging initialized");
    Ok(())
}
