//! # Structured Logging
//!
//! Tracing setup for the server. In stdio transport mode all log output is
//! suppressed so nothing corrupts the line-framed protocol stream.

use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::errors::{KubegateError, Result};

static LOGGING_INITIALIZED: OnceCell<()> = OnceCell::new();

/// Initialize logging for the given numeric verbosity (0-9).
///
/// When `stdio_transport` is set, a no-op subscriber is installed instead:
/// stdout carries JSON-RPC frames and stderr writes would interleave with
/// client error handling.
pub fn init(log_level: i32, stdio_transport: bool) -> Result<()> {
    LOGGING_INITIALIZED
        .get_or_try_init(|| configure(log_level, stdio_transport))
        .map(|_| ())
}

fn configure(log_level: i32, stdio_transport: bool) -> Result<()> {
    if stdio_transport {
        // Install a filter that discards everything.
        return tracing_subscriber::registry()
            .with(EnvFilter::new("off"))
            .try_init()
            .map_err(|e| KubegateError::config(format!("Failed to initialize logging: {}", e)));
    }

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(directive_for_level(log_level)));

    let fmt_layer = fmt::layer().with_target(true).with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| KubegateError::config(format!("Failed to initialize logging: {}", e)))
}

/// Map the 0-9 verbosity scale to a tracing directive.
fn directive_for_level(level: i32) -> &'static str {
    match level {
        i32::MIN..=0 => "kubegate=info",
        1..=2 => "kubegate=debug",
        _ => "kubegate=trace",
    }
}
