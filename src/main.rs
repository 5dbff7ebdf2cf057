use anyhow::{Context, Result};
use log::info;
use loadmaster_boom::{BoomServer, Config};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("🚀 LoadMaster boom server starting...");

    let config = Config::from_env()?;
    info!(
        "⚙️ {} RPS, {} concurrent requests, {:?} windows",
        config.limits.qps,
        config.limits.concurrency,
        config.limits.window
    );

    let server = BoomServer::start(config).await?;
    info!("🎧 Listening on {}", server.url());

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;

    info!("🛑 Shutting down");
    server.shutdown().await;

    Ok(())
}
