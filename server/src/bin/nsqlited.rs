use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use nsqlited_core::{Engine, EngineOptions};
use nsqlited_server::{Config, Server};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();

    tracing_subscriber::fmt().with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))).init();

    info!(
        data_directory = %config.data_directory.display(),
        listen_host = %config.listen_host,
        listen_port = config.listen_port,
        transaction_idle_timeout = %humantime::format_duration(config.transaction_idle_timeout),
        "starting NSQLited server"
    );

    let options = EngineOptions::new(&config.data_directory).transaction_idle_timeout(config.transaction_idle_timeout);
    let engine = Arc::new(Engine::open(options).await?);

    let server = Server::new(engine.clone(), &config);
    server.run().await?;

    engine.close().await;
    info!("goodbye! NSQLited server shut down");
    Ok(())
}
