//! offvault server entry point.
//!
//! Boots the offline cache worker, registers the configured version, and
//! serves MCP tools on stdio transport.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::{Context, Result};
use offvault_client::{FetchClient, FetchConfig, Registration};
use offvault_core::{AppConfig, CacheDb};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tokio_util::task::TaskTracker;
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
    tracing::info!(db = %config.db_path.display(), origin = %config.origin, cache = %config.cache_name(), "starting offvault on stdio transport");

    let db = CacheDb::open(&config.db_path).await.context("opening cache database")?;
    let fetcher = FetchClient::new(FetchConfig::from_app(&config)?)?;
    let registration = Registration::open(db, Arc::new(fetcher), TaskTracker::new()).await?;

    // An unreachable manifest must not keep the host down: the restored
    // version, if any, keeps serving and worker_update can retry.
    match registration.register(config.worker_config()?).await {
        Ok(outcome) => tracing::info!(?outcome, "worker registered"),
        Err(e) => tracing::warn!(error = %e, "worker registration failed"),
    }

    let handler = handler::OffvaultServer::new(tools::ServerState::new(registration.clone(), config));
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    tokio::select! {
        quit = server.waiting() => { quit?; }
        _ = tokio::signal::ctrl_c() => tracing::info!("interrupted"),
    }

    registration.flush().await;
    tracing::info!("background cache writes flushed");

    Ok(())
}
