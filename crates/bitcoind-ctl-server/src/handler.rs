//! HTTP handlers for the lifecycle endpoints.

use crate::server::AppState;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use bitcoind_ctl::{CallContext, DaemonError};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Query parameters of `POST /bitcoind/stop`.
#[derive(Debug, Default, Deserialize)]
pub struct StopParams {
    #[serde(default)]
    pub force: bool,
}

fn call_context(state: &AppState) -> CallContext {
    CallContext::with_token(state.shutdown.clone()).with_timeout(state.request_timeout)
}

fn error_response(operation: &str, err: DaemonError) -> Response {
    if err.is_transient() {
        debug!("{} failed: {}", operation, err);
    } else {
        warn!("{} failed: {}", operation, err);
    }
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": err.to_string(), "kind": err.kind() })),
    )
        .into_response()
}

fn ok_response() -> Response {
    (StatusCode::OK, Json(json!({ "ok": 1 }))).into_response()
}

/// Health check endpoint.
pub async fn handle_health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

/// `POST /bitcoind/start`
pub async fn handle_start(State(state): State<Arc<AppState>>) -> Response {
    let ctx = call_context(&state);
    match state.controller.start(&ctx).await {
        Ok(()) => ok_response(),
        Err(e) => error_response("start", e),
    }
}

/// `POST /bitcoind/stop[?force=true]`
///
/// Stopping a daemon that is already stopped succeeds.
pub async fn handle_stop(
    State(state): State<Arc<AppState>>,
    Query(params): Query<StopParams>,
) -> Response {
    let ctx = call_context(&state);
    debug!("stop requested (force={})", params.force);
    match state.controller.stop(&ctx, params.force).await {
        Ok(()) => ok_response(),
        Err(e) if e.is_stopped() => {
            info!("stop requested but bitcoind is already stopped ({})", e);
            ok_response()
        }
        Err(e) => error_response("stop", e),
    }
}

/// `GET /bitcoind/status`
pub async fn handle_status(State(state): State<Arc<AppState>>) -> Response {
    let ctx = call_context(&state);
    match state.controller.status(&ctx).await {
        Ok(status) => (StatusCode::OK, Json(status)).into_response(),
        Err(e) => error_response("status", e),
    }
}
