use std::sync::Arc;

use anyhow::Context;
use transfer_worker::{build_service, start_server, WorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logger (set RUST_LOG=debug for verbose output)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Starting transfer worker...");
    let config = WorkerConfig::from_env();
    let service = Arc::new(build_service(&config));

    start_server(&config.bind_address, service)
        .await
        .context("Server error")?;
    Ok(())
}
