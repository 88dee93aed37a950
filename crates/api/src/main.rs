//! Stress Level Detector - Main Entry Point

use anyhow::Context;
use api::{init_logging, run_server, AppConfig};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("failed to load configuration")?;
    init_logging(&config.log_level, config.log_json)?;

    info!("=== Stress Level Detector v{} ===", env!("CARGO_PKG_VERSION"));
    info!("Loading models and starting capture...");

    run_server(config).await.context("server failed")?;

    Ok(())
}
