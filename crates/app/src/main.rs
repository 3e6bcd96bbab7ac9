//! `datapushd` - push job control plane daemon
//!
//! Loads `.env`, installs logging, wires the application context and runs
//! the background workers until ctrl-c.

use anyhow::Context;
use datapush_app::{logging, AppContext};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env before logging so RUST_LOG from the file applies.
    let dotenv = dotenvy::dotenv();
    logging::init()?;

    match dotenv {
        Ok(path) => info!(path = %path.display(), "loaded .env"),
        Err(e) => warn!(error = %e, "no .env loaded"),
    }

    info!(version = env!("CARGO_PKG_VERSION"), "datapushd starting");

    let ctx = AppContext::new().await.context("failed to initialise application context")?;
    info!("datapushd running; press ctrl-c to stop");

    tokio::signal::ctrl_c().await.context("failed to listen for ctrl-c")?;
    info!("shutdown signal received");

    ctx.shutdown().await.context("shutdown did not complete cleanly")?;
    info!("datapushd stopped");
    Ok(())
}
