// Worker integration test: spawn, tick, serve exchange requests, shutdown

mod common;

use common::{RecordingTransport, ScriptedSource, sample};
use cpuusage::models::CPU_USAGE_MESSAGE_TYPE;
use cpuusage::orchestrator::{OrchestratorConfig, SamplingOrchestrator};
use cpuusage::sample_store::{LAST_SAMPLE_KEY, MemorySampleStore, SampleStore};
use cpuusage::worker::{
    EXCHANGE_REQUEST_CAPACITY, ExchangeRequest, WorkerConfig, WorkerDeps, spawn,
};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Duration;

fn orchestrator_config() -> OrchestratorConfig {
    OrchestratorConfig {
        step_size_secs: 300,
        tick_interval_secs: 30,
        coverage_min_percent: 0.8,
    }
}

fn worker_config() -> WorkerConfig {
    WorkerConfig {
        tick_interval: Duration::from_millis(25),
        monitor_interval: Duration::from_secs(3600),
        exchange_interval: Duration::from_secs(3600),
    }
}

#[tokio::test]
async fn worker_spawn_ticks_and_shutdown_persists_sample() {
    let source = Arc::new(ScriptedSource::new(vec![
        Some(sample(100, 100)),
        Some(sample(110, 130)),
        Some(sample(120, 160)),
    ]));
    let store = Arc::new(MemorySampleStore::new());
    let transport = Arc::new(RecordingTransport::accepting(&[CPU_USAGE_MESSAGE_TYPE]));
    let orchestrator = Arc::new(SamplingOrchestrator::new(
        source.clone(),
        store.clone(),
        transport,
        orchestrator_config(),
        0,
    ));

    let (_exchange_tx, exchange_rx) = mpsc::channel(EXCHANGE_REQUEST_CAPACITY);
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let handle = spawn(
        orchestrator.clone(),
        WorkerDeps {
            exchange_rx,
            shutdown_rx,
        },
        worker_config(),
    );

    tokio::time::sleep(Duration::from_millis(150)).await;
    let _ = shutdown_tx.send(());
    handle.await.unwrap();

    assert!(source.reads() >= 2, "worker should tick more than once");
    assert!(orchestrator.stats().snapshot().ticks >= 2);
    assert!(store.get(LAST_SAMPLE_KEY).await.unwrap().is_some());
}

#[tokio::test]
async fn worker_sends_buffered_points_on_request() {
    // 12 manual ticks close the first window before the worker starts
    let script = (0..12u64)
        .map(|i| Some(sample(1_000 + i * 10, 5_000 + i * 10)))
        .collect();
    let source = Arc::new(ScriptedSource::new(script));
    let store = Arc::new(MemorySampleStore::new());
    let transport = Arc::new(RecordingTransport::accepting(&[CPU_USAGE_MESSAGE_TYPE]));
    let orchestrator = Arc::new(SamplingOrchestrator::new(
        source,
        store,
        transport.clone(),
        orchestrator_config(),
        0,
    ));
    for i in 0..12u64 {
        orchestrator.run_tick(i * 30).await;
    }
    assert_eq!(orchestrator.pending_points(), 1);

    let (exchange_tx, exchange_rx) = mpsc::channel(EXCHANGE_REQUEST_CAPACITY);
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let handle = spawn(
        orchestrator.clone(),
        WorkerDeps {
            exchange_rx,
            shutdown_rx,
        },
        WorkerConfig {
            tick_interval: Duration::from_secs(3600),
            ..worker_config()
        },
    );

    exchange_tx
        .send(ExchangeRequest { urgent: true })
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    let _ = shutdown_tx.send(());
    handle.await.unwrap();

    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].1, "requested exchange is urgent");
    assert_eq!(sent[0].0.cpu_usages[0].window_start, 0);
    assert!((sent[0].0.cpu_usages[0].ratio - 0.5).abs() < 1e-9);
    assert_eq!(orchestrator.pending_points(), 0);
}
