//! # structdb-logging
//!
//! `tracing` subscriber setup for binaries embedding structdb, plus an
//! in-memory capture layer for tests.
//!
//! Library crates only emit events; installing a subscriber is the
//! application's job, done once at startup with [`init_logging`].

#![deny(unsafe_code)]

pub mod capture;

pub use capture::{CapturedEvent, CapturedLogs, capture_logs};

use structdb_settings::LoggingSettings;
use thiserror::Error;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Errors raised while installing the global subscriber.
#[derive(Debug, Error)]
pub enum LoggingError {
    /// The configured level is not a valid filter directive.
    #[error("invalid log level directive {directive:?}: {detail}")]
    InvalidDirective {
        /// Directive text as configured.
        directive: String,
        /// Parser message.
        detail: String,
    },
    /// A global subscriber is already installed.
    #[error("a global tracing subscriber is already installed")]
    AlreadyInitialized,
}

/// Result type for logging setup.
pub type Result<T> = std::result::Result<T, LoggingError>;

/// Build the event filter: `RUST_LOG` wins, else the configured level.
pub fn env_filter(settings: &LoggingSettings) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&settings.level).map_err(|e| LoggingError::InvalidDirective {
        directive: settings.level.clone(),
        detail: e.to_string(),
    })
}

/// Install the global subscriber: an env filter plus a `fmt` layer on
/// stderr, JSON lines or compact text per settings.
pub fn init_logging(settings: &LoggingSettings) -> Result<()> {
    let filter = env_filter(settings)?;

    let json_layer = settings.json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_writer(std::io::stderr)
    });
    let text_layer = (!settings.json).then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_writer(std::io::stderr)
            .compact()
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .try_init()
        .map_err(|_| LoggingError::AlreadyInitialized)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_reports_already_initialized() {
        let settings = LoggingSettings::default();
        let _ = init_logging(&settings);
        assert!(matches!(
            init_logging(&settings),
            Err(LoggingError::AlreadyInitialized)
        ));
    }

    #[test]
    fn configured_level_builds_filter() {
        let settings = LoggingSettings {
            level: "structdb_store=debug,warn".to_string(),
            json: true,
        };
        assert!(env_filter(&settings).is_ok());
    }

    #[test]
    fn error_display() {
        let err = LoggingError::InvalidDirective {
            directive: "x".into(),
            detail: "bad".into(),
        };
        assert_eq!(err.to_string(), "invalid log level directive \"x\": bad");
    }
}
