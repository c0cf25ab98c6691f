//! Logging setup for the `ddlsort` binary.
//!
//! Diagnostic logs go to stderr through `tracing` and stay silent unless
//! requested. User-facing progress is printed by [`crate::output`].
//!
//! # Environment Variables
//!
//! - `DDLSORT_DEBUG=true|1|yes` - Enable debug logging
//! - `DDLSORT_LOG_LEVEL=trace|debug|info|warn|error` - Set a specific level
//! - `DDLSORT_LOG_FORMAT=json|pretty|compact` - Output format (default: compact)

use std::env;
use std::sync::Once;

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

static INIT: Once = Once::new();

/// Check if debug logging is enabled via `DDLSORT_DEBUG`.
#[inline]
pub fn is_debug_enabled() -> bool {
    env::var("DDLSORT_DEBUG")
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false)
}

/// Resolve the log level from `DDLSORT_LOG_LEVEL`, the verbosity flag and
/// `DDLSORT_DEBUG`, in that order.
pub fn log_level(verbose: u8) -> &'static str {
    if let Ok(level) = env::var("DDLSORT_LOG_LEVEL") {
        match level.to_lowercase().as_str() {
            "trace" => return "trace",
            "debug" => return "debug",
            "info" => return "info",
            "warn" => return "warn",
            "error" => return "error",
            _ => {}
        }
    }

    match verbose {
        0 if is_debug_enabled() => "debug",
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Get the configured log format from `DDLSORT_LOG_FORMAT`.
pub fn log_format() -> &'static str {
    env::var("DDLSORT_LOG_FORMAT")
        .map(|f| match f.to_lowercase().as_str() {
            "json" => "json",
            "pretty" => "pretty",
            _ => "compact",
        })
        .unwrap_or("compact")
}

/// Initialize logging. Subsequent calls are no-ops.
///
/// Nothing is installed unless `verbose > 0`, `DDLSORT_DEBUG` or
/// `DDLSORT_LOG_LEVEL` asks for it.
pub fn init(verbose: u8) {
    INIT.call_once(|| {
        if verbose == 0 && !is_debug_enabled() && env::var("DDLSORT_LOG_LEVEL").is_err() {
            return;
        }

        let level = log_level(verbose);
        let filter = EnvFilter::try_new(format!(
            "ddlsort={},ddlsort_migrate={},ddlsort_cli={}",
            level, level, level
        ))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

        let registry = tracing_subscriber::registry().with(filter);
        let installed = match log_format() {
            "json" => registry
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .try_init(),
            "pretty" => registry
                .with(fmt::layer().pretty().with_writer(std::io::stderr))
                .try_init(),
            _ => registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .try_init(),
        };

        if installed.is_ok() {
            tracing::debug!(level, format = log_format(), "Logging initialized");
        }
    });
}
