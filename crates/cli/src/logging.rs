// Logging setup

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when RUST_LOG is not set
const DEFAULT_FILTER: &str = "qcache_core=info,qcache_infra_redis=info,qcache_cli=info";

/// Install the global subscriber.
///
/// `QCACHE_LOG_FORMAT=json` switches to JSON lines; anything else is pretty.
/// Logs go to stderr so command output on stdout stays machine-readable.
pub fn init() -> Result<()> {
    let log_format = std::env::var("QCACHE_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(DEFAULT_FILTER))
        .context("Failed to create env filter")?;

    match log_format.as_str() {
        "json" => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
        _ => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().pretty().with_writer(std::io::stderr))
            .try_init(),
    }
    .context("Failed to install tracing subscriber")
}
