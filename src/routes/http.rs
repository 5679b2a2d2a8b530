// HTTP handlers: version, info, status, accepted types, exchange

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::{Deserialize, Serialize};

use super::{AppState, apply_accepted_types, request_exchange};
use crate::orchestrator::SamplingStatsSnapshot;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct StatusResponse {
    sampling: SamplingStatsSnapshot,
    accepted_types: Vec<String>,
    subscribers: usize,
    /// Open /ws/cpu-usage sockets.
    ws_connections: usize,
    messages_sent: u64,
    messages_undelivered: u64,
}

#[derive(Debug, Deserialize)]
pub(super) struct AcceptedTypesRequest {
    types: Vec<String>,
}

/// GET /version: returns service name and version (from Cargo.toml at build time).
pub(super) async fn version_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /api/info: static host identity.
pub(super) async fn api_info_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.host_info.as_ref().clone())
}

/// GET /api/status: sampling counters and transport state.
pub(super) async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(StatusResponse {
        sampling: state.stats.snapshot(),
        accepted_types: state.transport.accepted_types(),
        subscribers: state.transport.receiver_count(),
        ws_connections: state
            .ws_connections
            .load(std::sync::atomic::Ordering::Relaxed),
        messages_sent: state.transport.sent_total(),
        messages_undelivered: state.transport.undelivered_total(),
    })
}

/// PUT /api/accepted-types: the collector declares which message types it wants.
pub(super) async fn accepted_types_handler(
    State(state): State<AppState>,
    Json(body): Json<AcceptedTypesRequest>,
) -> impl IntoResponse {
    let accepted = apply_accepted_types(&state, body.types);
    Json(serde_json::json!({ "acceptedTypes": accepted }))
}

/// POST /api/exchange: send buffered points now.
pub(super) async fn exchange_handler(State(state): State<AppState>) -> StatusCode {
    if request_exchange(&state, true) {
        StatusCode::ACCEPTED
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
