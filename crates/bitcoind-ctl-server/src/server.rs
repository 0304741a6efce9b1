//! HTTP server implementation using Axum.

use crate::handler::{handle_health, handle_start, handle_status, handle_stop};
use axum::{
    routing::{get, post},
    Router,
};
use bitcoind_ctl::{BitcoindController, CancellationToken};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Application state shared across handlers.
pub struct AppState {
    /// Controller selected at startup
    pub controller: Arc<dyn BitcoindController>,
    /// Cancelled on shutdown; every request context derives from it
    pub shutdown: CancellationToken,
    /// Upper bound for a single lifecycle call
    pub request_timeout: Duration,
}

/// Build the router for the lifecycle endpoints.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/bitcoind/start", post(handle_start))
        .route("/bitcoind/stop", post(handle_stop))
        .route("/bitcoind/status", get(handle_status))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server.
///
/// Returns the actual address the server is bound to (useful when port=0)
/// and the task serving it, which finishes once `state.shutdown` is cancelled.
pub async fn start_server(
    state: Arc<AppState>,
    host: &str,
    port: u16,
) -> anyhow::Result<(SocketAddr, JoinHandle<()>)> {
    let shutdown = state.shutdown.clone();
    let app = router(state);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    info!("Server listening on {}", actual_addr);

    let handle = tokio::spawn(async move {
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await;
        if let Err(e) = result {
            error!("Server error: {}", e);
        }
    });

    Ok((actual_addr, handle))
}
