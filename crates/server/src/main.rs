//! sitecache-mcp server entry point.
//!
//! Boots the offline cache controller and serves it as MCP tools on stdio.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use sitecache_client::{CacheController, ControllerSettings, FetchConfig, HttpNetwork, LifecycleState};
use sitecache_core::{AppConfig, CacheDb};
use tracing_subscriber::EnvFilter;

mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    tracing::info!("Starting sitecache-mcp for {} ({})", config.origin, config.store_name());

    let db = Arc::new(CacheDb::open(&config.db_path).await?);
    let network = Arc::new(HttpNetwork::new(FetchConfig::from(&config))?);
    let settings = ControllerSettings::from_config(&config)?;
    let controller = Arc::new(CacheController::launch(settings, network, db).await?);

    match controller.state().await {
        LifecycleState::Redundant => tracing::error!("no version is serving; requests will not be intercepted"),
        state => tracing::info!("controller {} {state}", controller.store_name()),
    }

    let handler = handler::SiteCacheServer::new(Arc::clone(&controller));
    let server = serve_server(handler, stdio()).await?;

    server.waiting().await?;
    controller.settle().await;

    Ok(())
}
