// WebSocket stream of sent CPU usage messages

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use tokio::sync::broadcast;
use tokio::time::{Duration, timeout};

use super::{AppState, apply_accepted_types};
use crate::models::Envelope;

pub(super) const WS_PING_INTERVAL: Duration = Duration::from_secs(30);
pub(super) const WS_SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Frame a collector may send to declare the message types it accepts.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CollectorFrame {
    accepted_types: Vec<String>,
}

/// Decrements the connection count on drop (connect = +1, drop = -1).
struct WsConnectionGuard(Arc<AtomicUsize>);

impl Drop for WsConnectionGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, std::sync::atomic::Ordering::Relaxed);
    }
}

pub(super) async fn ws_cpu_usage(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| async move {
        // Subscribe before anything else so a message sent right after the upgrade is not missed.
        let mut rx = state.transport.subscribe();
        if let Err(e) = stream_cpu_usage(socket, &mut rx, &state).await {
            tracing::info!("CPU usage stream error: {}", e);
        }
    })
}

async fn stream_cpu_usage(
    socket: WebSocket,
    rx: &mut broadcast::Receiver<Envelope>,
    state: &AppState,
) -> anyhow::Result<()> {
    state
        .ws_connections
        .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    let _guard = WsConnectionGuard(state.ws_connections.clone());
    tracing::info!("Collector connected to CPU usage stream");

    let (mut sender, mut receiver) = socket.split();
    let mut ping_interval = tokio::time::interval_at(
        tokio::time::Instant::now() + WS_PING_INTERVAL,
        WS_PING_INTERVAL,
    );
    ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(envelope) => {
                        let json = serde_json::to_string(&envelope)?;
                        let r = timeout(WS_SEND_TIMEOUT, sender.send(Message::Text(json.into()))).await;
                        if r.is_err() || r.unwrap_or(Ok(())).is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("WebSocket /ws/cpu-usage client lagged, skipped {} messages", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<CollectorFrame>(text.as_str()) {
                            Ok(frame) => {
                                apply_accepted_types(state, frame.accepted_types);
                            }
                            Err(e) => tracing::debug!(error = %e, "ignoring unrecognised collector frame"),
                        }
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
            _ = ping_interval.tick() => {
                let r = timeout(WS_SEND_TIMEOUT, sender.send(Message::Ping(Bytes::new()))).await;
                if r.is_err() || r.unwrap_or(Ok(())).is_err() {
                    break;
                }
            }
        }
    }
    tracing::info!("Collector disconnected from CPU usage stream");
    Ok(())
}
