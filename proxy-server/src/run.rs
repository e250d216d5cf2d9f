//! Server initialization and runtime.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::Method;
use tower_http::cors;
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::handlers::{AppState, mcp_router};
use crate::session::SessionRegistry;

/// Loads configuration, builds the wallet/treasurer/session registry, and
/// serves the `/mcp` surface until a shutdown signal arrives.
///
/// # Errors
///
/// Returns an error if configuration is invalid, or if the listener cannot
/// bind the configured address.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load();

    let wallet = config.build_wallet()?;
    let treasurer = config.build_treasurer(wallet);

    tracing::info!(
        host = %config.host,
        port = config.port,
        policy_api = config.treasurer_policy_api_url.is_some(),
        "Loaded configuration"
    );

    let state = Arc::new(AppState {
        registry: Arc::new(SessionRegistry::new()),
        treasurer,
        http_client: reqwest::Client::new(),
    });

    let app = mcp_router(state).layer(TraceLayer::new_for_http()).layer(
        cors::CorsLayer::new()
            .allow_origin(cors::Any)
            .allow_methods([Method::GET, Method::POST, Method::DELETE])
            .allow_headers(cors::Any),
    );

    let addr = SocketAddr::new(config.host, config.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("x402 MCP proxy listening on http://{addr}");

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    tracing::info!("Proxy shut down gracefully");
    Ok(())
}

/// Waits for Ctrl-C or SIGTERM (Unix) to initiate graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => tracing::info!("Received Ctrl-C, shutting down..."),
            _ = sigterm.recv() => tracing::info!("Received SIGTERM, shutting down..."),
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.expect("failed to listen for Ctrl-C");
        tracing::info!("Received Ctrl-C, shutting down...");
    }
}
