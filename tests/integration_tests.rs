// Integration tests: HTTP and WebSocket endpoints

use axum::http::StatusCode;
use axum_test::TestServer;
use cpuusage::models::{AccumulatedPoint, CPU_USAGE_MESSAGE_TYPE, CpuUsageMessage, Envelope, HostInfo};
use cpuusage::orchestrator::SamplingStats;
use cpuusage::routes;
use cpuusage::transport::{BroadcastTransport, Transport};
use cpuusage::worker::{EXCHANGE_REQUEST_CAPACITY, ExchangeRequest};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc;

struct TestApp {
    app: axum::Router,
    transport: Arc<BroadcastTransport>,
    exchange_rx: mpsc::Receiver<ExchangeRequest>,
    ws_connections: Arc<AtomicUsize>,
}

fn host_info() -> HostInfo {
    HostInfo {
        host_name: "test-host".into(),
        os_name: "Linux".into(),
        os_version: "1.0".into(),
        kernel_version: "6.1.0".into(),
        processor_name: "Test CPU".into(),
        logical_cores: 4,
    }
}

fn test_app(accepted: &[&str]) -> TestApp {
    let transport = Arc::new(BroadcastTransport::new(accepted.iter().copied(), 16));
    let (exchange_tx, exchange_rx) = mpsc::channel(EXCHANGE_REQUEST_CAPACITY);
    let ws_connections = Arc::new(AtomicUsize::new(0));
    let app = routes::app(
        transport.clone(),
        Arc::new(SamplingStats::default()),
        Arc::new(host_info()),
        exchange_tx,
        ws_connections.clone(),
    );
    TestApp {
        app,
        transport,
        exchange_rx,
        ws_connections,
    }
}

/// Build TestServer with http_transport (required for WebSocket tests).
fn test_server_with_http(app: axum::Router) -> TestServer {
    TestServer::builder().http_transport().build(app)
}

fn point(window_start: u64, ratio: f64) -> AccumulatedPoint {
    AccumulatedPoint {
        window_start,
        window_end: window_start + 300,
        ratio,
    }
}

#[tokio::test]
async fn test_root_endpoint() {
    let t = test_app(&[]);
    let server = TestServer::new(t.app);
    let response = server.get("/").await;
    response.assert_status_ok();
    response.assert_text("cpuusage: aggregate CPU utilization sampler");
}

#[tokio::test]
async fn test_version_endpoint() {
    let t = test_app(&[]);
    let server = TestServer::new(t.app);
    let response = server.get("/version").await;
    response.assert_status_ok();
    let json: serde_json::Value = response.json();
    assert_eq!(json.get("name").and_then(|v| v.as_str()), Some("cpuusage"));
    assert!(json.get("version").and_then(|v| v.as_str()).is_some());
}

#[tokio::test]
async fn test_api_info_returns_host_identity() {
    let t = test_app(&[]);
    let server = TestServer::new(t.app);
    let response = server.get("/api/info").await;
    response.assert_status_ok();
    let json: serde_json::Value = response.json();
    assert_eq!(json["hostName"], "test-host");
    assert_eq!(json["kernelVersion"], "6.1.0");
    assert_eq!(json["logicalCores"], 4);
}

#[tokio::test]
async fn test_api_status_reports_counters_and_accepted_types() {
    let t = test_app(&[CPU_USAGE_MESSAGE_TYPE]);
    t.transport
        .send(CpuUsageMessage::new(vec![point(0, 0.5)]), false)
        .unwrap();
    let server = TestServer::new(t.app);
    let response = server.get("/api/status").await;
    response.assert_status_ok();
    let json: serde_json::Value = response.json();
    assert_eq!(json["acceptedTypes"], serde_json::json!(["cpu-usage"]));
    assert_eq!(json["subscribers"], 0);
    assert_eq!(json["wsConnections"], 0);
    assert_eq!(json["messagesSent"], 0);
    assert_eq!(json["messagesUndelivered"], 1);
    assert_eq!(json["sampling"]["ticks"], 0);
    assert_eq!(json["sampling"]["pendingPoints"], 0);
}

#[tokio::test]
async fn test_accepting_cpu_usage_requests_urgent_exchange() {
    let mut t = test_app(&[]);
    let transport = t.transport.clone();
    let server = TestServer::new(t.app);

    let response = server
        .put("/api/accepted-types")
        .json(&serde_json::json!({ "types": ["cpu-usage", "other"] }))
        .await;
    response.assert_status_ok();
    let json: serde_json::Value = response.json();
    assert_eq!(json["acceptedTypes"], serde_json::json!(["cpu-usage", "other"]));
    assert!(transport.is_accepted(CPU_USAGE_MESSAGE_TYPE));
    assert_eq!(
        t.exchange_rx.try_recv().ok(),
        Some(ExchangeRequest { urgent: true })
    );
}

#[tokio::test]
async fn test_reaccepting_same_types_does_not_request_exchange() {
    let mut t = test_app(&[CPU_USAGE_MESSAGE_TYPE]);
    let server = TestServer::new(t.app);
    server
        .put("/api/accepted-types")
        .json(&serde_json::json!({ "types": ["cpu-usage"] }))
        .await
        .assert_status_ok();
    assert!(t.exchange_rx.try_recv().is_err());
}

#[tokio::test]
async fn test_withdrawing_acceptance() {
    let t = test_app(&[CPU_USAGE_MESSAGE_TYPE]);
    let transport = t.transport.clone();
    let server = TestServer::new(t.app);
    server
        .put("/api/accepted-types")
        .json(&serde_json::json!({ "types": [] }))
        .await
        .assert_status_ok();
    assert!(!transport.is_accepted(CPU_USAGE_MESSAGE_TYPE));
}

#[tokio::test]
async fn test_exchange_endpoint_queues_request() {
    let mut t = test_app(&[]);
    let server = TestServer::new(t.app);
    server
        .post("/api/exchange")
        .await
        .assert_status(StatusCode::ACCEPTED);
    assert_eq!(
        t.exchange_rx.try_recv().ok(),
        Some(ExchangeRequest { urgent: true })
    );
}

#[tokio::test]
async fn test_exchange_endpoint_without_worker_is_unavailable() {
    let t = test_app(&[]);
    drop(t.exchange_rx);
    let server = TestServer::new(t.app);
    server
        .post("/api/exchange")
        .await
        .assert_status(StatusCode::SERVICE_UNAVAILABLE);
}

// --- WebSocket tests (require http_transport + ws feature) ---

#[tokio::test]
async fn test_ws_cpu_usage_receives_sent_message() {
    let t = test_app(&[CPU_USAGE_MESSAGE_TYPE]);
    let transport = t.transport.clone();
    let server = test_server_with_http(t.app);
    let mut ws = server
        .get_websocket("/ws/cpu-usage")
        .await
        .into_websocket()
        .await;

    let message = CpuUsageMessage::new(vec![point(0, 0.25), point(300, 0.75)]);
    let to_send = message.clone();
    tokio::spawn(async move {
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
        let _ = transport.send(to_send, true);
    });

    let text = ws.receive_text().await;
    let envelope: Envelope = serde_json::from_str(&text).unwrap();
    assert!(envelope.urgent);
    assert_eq!(envelope.message, message);

    let raw: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(raw["message"]["type"], "cpu-usage");
    assert_eq!(raw["message"]["cpuUsages"][1]["windowStart"], 300);
}

#[tokio::test]
async fn test_ws_collector_frame_updates_accepted_types() {
    let t = test_app(&[]);
    let transport = t.transport.clone();
    let server = test_server_with_http(t.app);
    let mut ws = server
        .get_websocket("/ws/cpu-usage")
        .await
        .into_websocket()
        .await;

    ws.send_text(r#"{"acceptedTypes":["cpu-usage"]}"#).await;

    let deadline = tokio::time::Instant::now() + tokio::time::Duration::from_secs(3);
    while !transport.is_accepted(CPU_USAGE_MESSAGE_TYPE) {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for accepted types update"
        );
        tokio::time::sleep(tokio::time::Duration::from_millis(20)).await;
    }
}

async fn wait_for_connections(connections: &AtomicUsize, expected: usize) {
    let deadline = tokio::time::Instant::now() + tokio::time::Duration::from_secs(3);
    while connections.load(Ordering::Relaxed) != expected {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {expected} WebSocket connections"
        );
        tokio::time::sleep(tokio::time::Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn test_ws_connections_reported_in_status() {
    let t = test_app(&[]);
    let connections = t.ws_connections.clone();
    let server = test_server_with_http(t.app);
    let ws = server
        .get_websocket("/ws/cpu-usage")
        .await
        .into_websocket()
        .await;

    wait_for_connections(&connections, 1).await;
    let json: serde_json::Value = server.get("/api/status").await.json();
    assert_eq!(json["wsConnections"], 1);
    assert_eq!(json["subscribers"], 1);

    ws.close().await;
    wait_for_connections(&connections, 0).await;
    let json: serde_json::Value = server.get("/api/status").await.json();
    assert_eq!(json["wsConnections"], 0);
}
