//! Logging setup
//!
//! Diagnostics are written to stderr so they never interleave with the
//! passthrough output on stdout.

use anyhow::Result;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Selects the log format (`pretty` or `json`)
pub const LOG_FORMAT_ENV: &str = "GPUWATCH_LOG_FORMAT";

const DEFAULT_FILTER: &str = "gpuwatch=info";

/// Initialize the global tracing subscriber
///
/// # Environment Variables
///
/// - `RUST_LOG`: filter directives (default: `gpuwatch=info`)
/// - `GPUWATCH_LOG_FORMAT`: `json` for structured output, anything else for pretty
pub fn init_logging() -> Result<()> {
    let log_format = std::env::var(LOG_FORMAT_ENV).unwrap_or_else(|_| "pretty".to_string());

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(DEFAULT_FILTER))
        .map_err(|e| anyhow::anyhow!("Failed to create env filter: {}", e))?;

    match log_format.as_str() {
        "json" => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()?,
        _ => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().pretty().with_writer(std::io::stderr))
            .try_init()?,
    }

    Ok(())
}
