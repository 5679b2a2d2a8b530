// HTTP + WebSocket routes

mod http;
mod ws;

use axum::{
    Router,
    routing::{get, post, put},
};
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use tokio::sync::mpsc;
use tower_http::cors::{Any, CorsLayer};

use crate::models::{CPU_USAGE_MESSAGE_TYPE, HostInfo};
use crate::orchestrator::SamplingStats;
use crate::transport::BroadcastTransport;
use crate::worker::ExchangeRequest;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) transport: Arc<BroadcastTransport>,
    pub(crate) stats: Arc<SamplingStats>,
    pub(crate) host_info: Arc<HostInfo>,
    pub(crate) exchange_tx: mpsc::Sender<ExchangeRequest>,
    pub(crate) ws_connections: Arc<AtomicUsize>,
}

pub fn app(
    transport: Arc<BroadcastTransport>,
    stats: Arc<SamplingStats>,
    host_info: Arc<HostInfo>,
    exchange_tx: mpsc::Sender<ExchangeRequest>,
    ws_connections: Arc<AtomicUsize>,
) -> Router {
    let state = AppState {
        transport,
        stats,
        host_info,
        exchange_tx,
        ws_connections,
    };
    Router::new()
        .route("/", get(|| async { "cpuusage: aggregate CPU utilization sampler" })) // GET /
        .route("/version", get(http::version_handler)) // GET /version
        .route("/api/info", get(http::api_info_handler)) // GET /api/info
        .route("/api/status", get(http::status_handler)) // GET /api/status
        .route("/api/accepted-types", put(http::accepted_types_handler)) // PUT /api/accepted-types
        .route("/api/exchange", post(http::exchange_handler)) // POST /api/exchange
        .route("/ws/cpu-usage", get(ws::ws_cpu_usage)) // WS /ws/cpu-usage
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}

/// Replaces the accepted types; CPU usage becoming accepted triggers an urgent exchange.
pub(crate) fn apply_accepted_types(state: &AppState, types: Vec<String>) -> Vec<String> {
    let newly = state.transport.set_accepted_types(types);
    if newly.iter().any(|t| t == CPU_USAGE_MESSAGE_TYPE) {
        request_exchange(state, true);
    }
    state.transport.accepted_types()
}

/// Returns false when the worker is gone.
pub(crate) fn request_exchange(state: &AppState, urgent: bool) -> bool {
    match state.exchange_tx.try_send(ExchangeRequest { urgent }) {
        Ok(()) => true,
        Err(mpsc::error::TrySendError::Full(_)) => {
            tracing::debug!("exchange already pending");
            true
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            tracing::warn!("exchange requested but sampling worker is not running");
            false
        }
    }
}
