//! sitecache command line entry point.
//!
//! Drives the same controller and storage as the MCP server, one command per
//! invocation. Results are printed to stdout as JSON; logs go to stderr.

mod cli;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use sitecache_client::{
    CacheController, ControllerSettings, Destination, FetchConfig, FetchOutcome, HttpNetwork, LifecycleState, Method,
    Network, Request, ResponseSource, parse_request_url,
};
use sitecache_core::{AppConfig, CacheDb};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};

type Controller = CacheController<HttpNetwork, CacheDb>;

#[derive(Debug, Serialize)]
struct FetchReport {
    url: String,
    intercepted: bool,
    source: Option<ResponseSource>,
    status: u16,
    status_text: String,
    headers: Vec<(String, String)>,
    body: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_filter())))
        .with_writer(std::io::stderr)
        .init();

    let mut config = AppConfig::load().context("loading configuration")?;
    if let Some(db) = cli.db {
        config.db_path = db;
    }

    match cli.command {
        Commands::Start => {
            let controller = build_controller(&config).await?;
            controller.start().await?;
            print_status(&controller).await?;
        }
        Commands::Fetch { url, method, document } => {
            let controller = launch(&config).await?;
            let url = parse_request_url(&url, &controller.settings().origin)?;
            let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
                .with_context(|| format!("invalid method: {method}"))?;
            let destination = if document { Destination::Document } else { Destination::from_path(url.path()) };
            let request = Request::get(url).with_method(method).with_destination(destination);

            let report = fetch(&controller, &request).await?;
            controller.settle().await;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Message { kind } => {
            let controller = launch(&config).await?;
            controller.handle_message(kind).await?;
            print_status(&controller).await?;
        }
        Commands::Status => {
            let controller = build_controller(&config).await?;
            controller.resume().await?;
            print_status(&controller).await?;
        }
    }

    Ok(())
}

async fn build_parts(config: &AppConfig) -> Result<(ControllerSettings, HttpNetwork, CacheDb)> {
    let db = CacheDb::open(&config.db_path)
        .await
        .with_context(|| format!("opening {}", config.db_path.display()))?;
    let network = HttpNetwork::new(FetchConfig::from(config))?;
    let settings = ControllerSettings::from_config(config)?;
    Ok((settings, network, db))
}

async fn build_controller(config: &AppConfig) -> Result<Controller> {
    let (settings, network, db) = build_parts(config).await?;
    Ok(CacheController::new(settings, Arc::new(network), Arc::new(db)))
}

/// Resume the stored version, installing it first if needed. Falls back to
/// the version that already governs the scope when install fails.
async fn launch(config: &AppConfig) -> Result<Controller> {
    let (settings, network, db) = build_parts(config).await?;
    let controller = CacheController::launch(settings, Arc::new(network), Arc::new(db)).await?;

    match controller.state().await {
        LifecycleState::Redundant => tracing::warn!("no version is serving; requests go straight to the network"),
        state => tracing::info!("{} {state}", controller.store_name()),
    }
    Ok(controller)
}

async fn fetch(controller: &Controller, request: &Request) -> Result<FetchReport> {
    let (response, source) = match controller.handle_fetch(request).await? {
        FetchOutcome::Responded { response, source } => (response, Some(source)),
        FetchOutcome::NotIntercepted => (controller.network().fetch(request).await?, None),
    };

    Ok(FetchReport {
        url: request.url.to_string(),
        intercepted: source.is_some(),
        source,
        status: response.status,
        body: response.text().into_owned(),
        status_text: response.status_text,
        headers: response.headers,
    })
}

async fn print_status(controller: &Controller) -> Result<()> {
    let status = controller.status().await?;
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}
