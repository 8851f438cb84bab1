//! Logging for the ASHA sync engine
//!
//! Two concerns live here:
//!
//! - **Subscriber setup**: [`init_tracing`] installs a `tracing-subscriber`
//!   registry with an `EnvFilter` and either a pretty or a JSON fmt layer,
//!   both with RFC 3339 UTC timestamps.
//! - **PII redaction**: [`PiiRedactor`] scrubs free-text diagnostics
//!   (server error bodies, dead-letter reasons) before they are logged or
//!   persisted. Detected data types:
//!   - Email addresses: `sunita@example.org` → `s***@e***`
//!   - Indian mobile numbers: `+91 98765 43210` → `*******210`
//!   - Aadhaar numbers: `2345 6789 0123` → `XXXX-XXXX-0123`
//!   - IP addresses: `10.1.2.3` → `10.***.***.3`
//!   - Custom patterns
//!
//!   With `hash_for_correlation` enabled (the default) each value is replaced
//!   by a short SHA-256 digest instead, so the same number can be followed
//!   across log lines without being readable.
//!
//! # Example
//!
//! ```no_run
//! use logger_redacted::{init_tracing, redact, LoggerConfig};
//!
//! init_tracing(&LoggerConfig::for_environment("ASHA_ENV")).unwrap();
//! tracing::warn!(reason = %redact("rejected for 9876543210"), "Dropped item");
//! ```

pub mod config;
mod macros;
pub mod redactor;

pub use config::*;
pub use redactor::*;

use thiserror::Error;
use tracing_subscriber::{
    fmt::{self, time::ChronoUtc},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

#[derive(Error, Debug)]
pub enum LoggerError {
    #[error("Invalid redaction pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("Failed to initialise tracing: {0}")]
    Init(String),
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured filter directives.
pub fn init_tracing(config: &LoggerConfig) -> Result<(), LoggerError> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.filter_directives()))
        .map_err(|e| LoggerError::Init(e.to_string()))?;

    match config.format {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(config.ansi)
                    .with_level(true),
            )
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(false)
                    .json(),
            )
            .try_init(),
    }
    .map_err(|e| LoggerError::Init(e.to_string()))
}
