//! Logging configuration for sql-warden.
//!
//! Logs go to stderr so command output on stdout stays machine-readable.

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_DIRECTIVE: &str = "info";

/// Initializes stderr logging filtered by `RUST_LOG`, defaulting to `info`.
pub fn init_stderr_logging() {
    init_stderr_logging_with(DEFAULT_DIRECTIVE);
}

/// Initializes stderr logging with a custom fallback directive.
pub fn init_stderr_logging_with(default_directive: &str) {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    tracing_subscriber::fmt()
        .with_env_filter(filter_from(rust_log.as_deref(), default_directive))
        .with_writer(std::io::stderr)
        .init();
}

/// Builds the filter from a `RUST_LOG` value, falling back to `default_directive`.
fn filter_from(rust_log: Option<&str>, default_directive: &str) -> EnvFilter {
    rust_log
        .filter(|raw| !raw.trim().is_empty())
        .and_then(|raw| EnvFilter::try_new(raw).ok())
        .unwrap_or_else(|| EnvFilter::new(default_directive))
}
