//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber once per process
//! - Render `[ISO8601] [LEVEL] message fields` lines to stdout and the log file
//! - Configure log level from `RUST_LOG` or the config file
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - The log file is appended to, never truncated, and carries no ANSI codes

use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use thiserror::Error;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::{self, FormatEvent, FormatFields};
use tracing_subscriber::fmt::FmtContext;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::schema::ObservabilityConfig;

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("cannot open log file {path}: {source}")]
    LogFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("logging already initialized: {0}")]
    AlreadyInitialized(String),
}

/// Event formatter producing `[timestamp] [LEVEL] message key=value`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineFormat;

/// Prefix of every log line.
pub fn line_prefix(timestamp: DateTime<Utc>, level: &Level) -> String {
    format!(
        "[{}] [{}] ",
        timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
        level
    )
}

impl<S, N> FormatEvent<S, N> for LineFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        write!(writer, "{}", line_prefix(Utc::now(), event.metadata().level()))?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Install the global subscriber.
pub fn init_logging(config: &ObservabilityConfig) -> Result<(), LoggingError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let stdout_layer = tracing_subscriber::fmt::layer().event_format(LineFormat);

    let file_layer = match &config.log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|source| LoggingError::LogFile {
                    path: path.clone(),
                    source,
                })?;
            Some(
                tracing_subscriber::fmt::layer()
                    .event_format(LineFormat)
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_line_prefix_format() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(line_prefix(ts, &Level::WARN), "[2024-03-09T14:05:07.000Z] [WARN] ");
        assert_eq!(line_prefix(ts, &Level::INFO), "[2024-03-09T14:05:07.000Z] [INFO] ");
    }

    #[test]
    fn test_unwritable_log_file_reported() {
        let config = ObservabilityConfig {
            log_file: Some(PathBuf::from("/nonexistent-dir/for/logs/pipeline.log")),
            ..ObservabilityConfig::default()
        };
        assert!(matches!(init_logging(&config), Err(LoggingError::LogFile { .. })));
    }
}
