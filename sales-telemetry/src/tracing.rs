//! Tracing initialization for the job runner.

use chrono::{FixedOffset, Utc};
use std::fmt;
use thiserror::Error;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};

/// Timestamp layout of every log line.
const LOG_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Errors raised while installing the global subscriber.
#[derive(Debug, Error)]
pub enum TracingError {
    #[error("a global tracing subscriber is already installed: {0}")]
    AlreadyInitialized(#[from] TryInitError),
}

/// Formats event timestamps as wall-clock time at a fixed UTC offset.
#[derive(Debug, Clone, Copy)]
pub struct OffsetTime {
    offset: FixedOffset,
}

impl OffsetTime {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    fn format_now(&self) -> impl fmt::Display {
        Utc::now()
            .with_timezone(&self.offset)
            .format(LOG_TIMESTAMP_FORMAT)
    }
}

impl FormatTime for OffsetTime {
    fn format_time(&self, w: &mut Writer<'_>) -> fmt::Result {
        write!(w, "{}", self.format_now())
    }
}

/// Installs the global subscriber writing human-readable lines to stdout.
///
/// Filtering follows `RUST_LOG` and defaults to `info`. Timestamps are rendered at
/// `offset`, the same offset that defines the run date.
pub fn init_tracing(offset: FixedOffset) -> Result<(), TracingError> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_timer(OffsetTime::new(offset))
        .with_writer(std::io::stdout);

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .try_init()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    #[test]
    fn test_offset_time_renders_seconds_precision() {
        let offset = FixedOffset::west_opt(3 * 3600).unwrap();
        let rendered = OffsetTime::new(offset).format_now().to_string();

        assert!(NaiveDateTime::parse_from_str(&rendered, LOG_TIMESTAMP_FORMAT).is_ok());
        assert_eq!(rendered.len(), 19);
    }

    #[test]
    fn test_second_init_fails() {
        let offset = FixedOffset::east_opt(0).unwrap();
        let _ = init_tracing(offset);

        assert!(matches!(
            init_tracing(offset),
            Err(TracingError::AlreadyInitialized(_))
        ));
    }
}
