//! Tracing subscriber setup for the monitor binary.
//!
//! Output format follows `ENVIRONMENT`: JSON lines in production, coloured
//! text everywhere else. The level comes from `logging.level` unless
//! `RUST_LOG` is set.

use crate::config::{get_environment, LogLevel};
use tracing_subscriber::{
    fmt,
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
    EnvFilter,
};

/// HTTP client internals that are chatty at debug level
const QUIET_TARGETS: &[&str] = &["hyper=warn", "reqwest=warn", "h2=warn", "rustls=warn"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    pub fn for_environment(environment: &str) -> Self {
        match environment.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

/// Filter for the configured level with HTTP client noise capped at `warn`
pub fn level_filter(level: LogLevel) -> EnvFilter {
    QUIET_TARGETS
        .iter()
        .filter_map(|directive| directive.parse().ok())
        .fold(EnvFilter::new(level.as_directive()), |filter, directive| {
            filter.add_directive(directive)
        })
}

/// Install the global subscriber. Fails if one is already installed.
pub fn try_init_logging(level: LogLevel) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| level_filter(level));

    match LogFormat::for_environment(&get_environment()) {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_writer(std::io::stdout),
            )
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_ansi(true)
                    .with_writer(std::io::stdout),
            )
            .try_init(),
    }
}

/// Install the global subscriber, keeping an existing one if present
pub fn init_logging(level: LogLevel) {
    if let Err(e) = try_init_logging(level) {
        eprintln!("logging already initialised: {e}");
    }
}
