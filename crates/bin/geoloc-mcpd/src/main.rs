//! Daemon entry point for the geoloc MCP server.
//!
//! Loads configuration from the command line and environment, connects the
//! location store, and serves the MCP protocol over stdio or streamable HTTP.
//! The admin server runs alongside when enabled.

mod config;
mod database;

use std::sync::Arc;

use geoloc_admin::{AdminServer, AdminServerConfig, FixedWindowCounter};
use geoloc_core::control::LocationControlPlane;
use geoloc_core::enrich::{WikidataClient, WikipediaClient};
use geoloc_core::overpass::OverpassClient;
use geoloc_core::store::SurrealLocationStore;
use geoloc_mcp::server::{McpHttpServerConfig, serve_stdio, serve_streamable_http};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::{GeolocConfig, Transport};
use crate::database::{connect_database, probe_store};

fn init_tracing() {
    // Stdout carries the stdio MCP transport, so logs go to stderr.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    init_tracing();
    let config = GeolocConfig::from_args()?;

    let db = connect_database(&config).await?;
    let store = SurrealLocationStore::new(db);
    probe_store(&store).await?;

    let features = Arc::new(OverpassClient::with_config(config.overpass_config())?);
    let narrative = Arc::new(WikipediaClient::with_config(config.wikipedia_config())?);
    let facts = Arc::new(WikidataClient::with_config(config.wikidata_config())?);
    let control = Arc::new(LocationControlPlane::new(store, features, narrative, facts));

    if config.admin_serve {
        let counter = Arc::new(FixedWindowCounter::new(
            config.admin_rate_limit,
            config.admin_rate_window,
        ));
        let admin = AdminServer::new(
            control.clone(),
            counter,
            AdminServerConfig::new(config.admin_addr),
        );
        tokio::spawn(async move {
            if let Err(err) = admin.serve().await {
                error!(error = %err, "admin server stopped");
            }
        });
    }

    info!(transport = ?config.transport, "starting geoloc MCP server");
    match config.transport {
        Transport::Stdio => serve_stdio(control).await,
        Transport::Http => {
            serve_streamable_http(control, McpHttpServerConfig::new(config.mcp_http_addr)).await
        }
    }
}
