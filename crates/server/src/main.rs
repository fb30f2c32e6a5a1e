//! anacache server entry point.
//!
//! Loads configuration, opens the store, registers the interception layer
//! and serves the MCP tools on stdio transport.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anacache_client::{ControlClient, FetchConfig, HttpNetwork, InterceptorConfig, LayerContainer};
use anacache_core::{AppConfig, CacheDb, SystemClock};
use anyhow::{Context, Result};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;

mod error;
mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load().context("loading configuration")?;
    tracing::info!(
        api = %config.api_base_url,
        prefix = %config.api_prefix,
        cache = %config.cache_name,
        db = %config.db_path.display(),
        "Starting anacache server on stdio transport"
    );

    let storage = CacheDb::open(&config.db_path)
        .await
        .with_context(|| format!("opening cache database {}", config.db_path.display()))?;
    let network = HttpNetwork::new(FetchConfig::from(&config))?;
    let interceptor_config = InterceptorConfig::from_app(&config)?;

    let container = Arc::new(LayerContainer::new(
        storage,
        Arc::new(network),
        Arc::new(SystemClock),
        interceptor_config,
    ));
    let client = Arc::new(ControlClient::from_config(container, &config));

    if !client.register().await {
        tracing::warn!("interception layer not registered, requests go straight to the network");
    }

    let handler = handler::AnacacheServer::new(client.clone(), Arc::new(config));
    let server = serve_server(handler, stdio()).await?;

    server.waiting().await?;
    client.unregister().await;
    if let Err(err) = client.container().storage().clone().close().await {
        tracing::warn!(error = %err, "failed to close cache database");
    }

    Ok(())
}
