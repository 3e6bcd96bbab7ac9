//! Tracing subscriber setup for the daemon

use tracing_subscriber::EnvFilter;

/// Environment variable switching log output to JSON lines.
pub const LOG_JSON_ENV: &str = "DATAPUSH_LOG_JSON";

/// Install the global subscriber. `RUST_LOG` overrides the default `info`
/// filter.
///
/// Returns an error when a global subscriber is already installed.
pub fn init() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);

    let installed = if json_enabled(std::env::var(LOG_JSON_ENV).ok().as_deref()) {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))
}

fn json_enabled(raw: Option<&str>) -> bool {
    matches!(raw.map(str::trim), Some("1" | "true" | "TRUE" | "yes"))
}
