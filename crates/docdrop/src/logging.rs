//! Subscriber setup for the `docdrop` binary.
//!
//! The library emits through both `tracing` and the `log` facade; `log`
//! records are bridged into `tracing` so one subscriber sees everything.

use std::fmt;
use std::str::FromStr;

use tracing::level_filters::LevelFilter;
use tracing_subscriber::{fmt as fmt_layer, layer::SubscriberExt, EnvFilter, Registry};

use crate::error::LoggingError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per event
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("invalid log format: {}", other)),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Text => write!(f, "text"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

/// Maps the `-v` count to a default level: 0 = info, 1 = debug, 2+ = trace.
pub fn level_for_verbosity(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// Builds the filter: `RUST_LOG` when set, otherwise the verbosity level.
pub fn build_filter(verbosity: u8) -> Result<EnvFilter, LoggingError> {
    let filter = EnvFilter::builder()
        .with_default_directive(level_for_verbosity(verbosity).into())
        .from_env()?;
    Ok(filter)
}

/// Installs the global subscriber. Call once at startup.
pub fn init_logging(verbosity: u8, format: LogFormat) -> Result<(), LoggingError> {
    tracing_log::LogTracer::init()?;

    let filter = build_filter(verbosity)?;
    let registry = Registry::default().with(filter);

    match format {
        LogFormat::Text => {
            let subscriber = registry.with(
                fmt_layer::layer()
                    .with_writer(std::io::stderr)
                    .with_target(verbosity > 0)
                    .with_thread_names(verbosity > 0),
            );
            tracing::subscriber::set_global_default(subscriber)?;
        }
        LogFormat::Json => {
            let subscriber = registry.with(
                fmt_layer::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_current_span(true)
                    .with_span_list(false)
                    .with_thread_names(true),
            );
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }

    Ok(())
}
