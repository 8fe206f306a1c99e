//! reelcache server entry point.
//!
//! Loads configuration, opens the store database, installs the configured
//! version and serves MCP on stdio. Logging goes to stderr to avoid
//! interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;

use reelcache_client::{FetchClient, FetchConfig};
use reelcache_core::{AppConfig, CacheDb};

mod handler;
mod host;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    tracing::info!(
        db_path = %config.db_path.display(),
        origin = %config.origin,
        version_tag = %config.version_tag,
        "Starting reelcache server on stdio transport"
    );

    let storage = Arc::new(CacheDb::open(&config.db_path).await?);
    let network = Arc::new(FetchClient::new(FetchConfig::from(&config))?);
    let host = Arc::new(host::Host::new(config, storage, network)?);

    match host.boot().await {
        Ok(report) => tracing::info!(state = %report.state, "initial version installed"),
        Err(e) => tracing::error!(error = %e, "initial install failed"),
    }

    let handler = handler::ReelcacheServer::new(Arc::clone(&host));
    let server = serve_server(handler, stdio()).await?;

    server.waiting().await?;
    host.shutdown().await;

    Ok(())
}
