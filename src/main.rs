// Main entry point - Dependency injection and server setup
mod domain;
mod application;
mod infrastructure;
mod presentation;

use std::{net::SocketAddr, sync::Arc};
use anyhow::Context;
use tracing_subscriber::EnvFilter;

use crate::application::session_registry::SessionRegistry;
use crate::infrastructure::config::load_app_config;
use crate::infrastructure::file_store::FileDashboardStore;
use crate::infrastructure::http_source_client::HttpSourceClient;
use crate::infrastructure::sqlite_row_query::SqliteRowQuery;
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::router;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,dashboard_agent_core=debug")),
        )
        .init();

    // Load configuration
    let config = load_app_config()?;

    // Create collaborators (infrastructure layer)
    let client = Arc::new(HttpSourceClient::new(
        config.sources.query_endpoint.clone(),
        config.source_timeout(),
    )?);
    if config.sources.query_endpoint.is_none() {
        tracing::warn!("No query endpoint configured, PostgreSQL components will report errors");
    }
    let store = Arc::new(FileDashboardStore::new(&config.storage.dir));

    // Create services (application layer)
    let sessions = SessionRegistry::new(
        store,
        client,
        Arc::new(SqliteRowQuery),
        config.fetcher_settings(),
        config.autosave_debounce(),
    );

    // Create application state
    let state = Arc::new(AppState { sessions });

    // Build router (presentation layer)
    let router = router(state);

    // Start server
    let addr: SocketAddr = config
        .server
        .addr
        .parse()
        .with_context(|| format!("Invalid server address {}", config.server.addr))?;
    tracing::info!("Starting dashboard-agent-core on {}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router).await?;

    Ok(())
}
