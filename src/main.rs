use anyhow::Result;
use cpuusage::*;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use tokio::sync::mpsc;
use tokio::time::Duration;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    let app_config = config::AppConfig::load()?;

    let host_info = Arc::new(
        tokio::task::spawn_blocking(counter_source::read_host_info)
            .await
            .map_err(|e| anyhow::anyhow!("host info task join: {}", e))?,
    );
    tracing::info!(
        host = %host_info.host_name,
        kernel = %host_info.kernel_version,
        logical_cores = host_info.logical_cores,
        "sampling aggregate CPU usage"
    );

    let store = Arc::new(sample_store::SqliteSampleStore::connect(&app_config.database.path).await?);
    store.init().await?;

    let source = Arc::new(counter_source::ProcStatSource::new(
        &app_config.sampling.stat_file,
    ));
    tracing::info!(
        stat_file = %source.path().display(),
        step_size_secs = app_config.sampling.step_size_secs,
        "reading CPU counters"
    );
    let transport = Arc::new(transport::BroadcastTransport::new(
        app_config.transport.accepted_types.clone(),
        app_config.transport.broadcast_capacity,
    ));

    let orchestrator = Arc::new(orchestrator::SamplingOrchestrator::new(
        source,
        store,
        transport.clone(),
        orchestrator::OrchestratorConfig {
            step_size_secs: app_config.sampling.step_size_secs,
            tick_interval_secs: app_config.sampling.interval_secs,
            coverage_min_percent: app_config.sampling.coverage_min_percent,
        },
        worker::unix_now(),
    ));
    orchestrator.restore().await;

    let (exchange_tx, exchange_rx) = mpsc::channel(worker::EXCHANGE_REQUEST_CAPACITY);
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

    let worker_handle = worker::spawn(
        orchestrator.clone(),
        worker::WorkerDeps {
            exchange_rx,
            shutdown_rx,
        },
        worker::WorkerConfig {
            tick_interval: Duration::from_secs(app_config.sampling.interval_secs),
            monitor_interval: Duration::from_secs(app_config.sampling.monitor_interval_secs),
            exchange_interval: Duration::from_secs(app_config.transport.exchange_interval_secs),
        },
    );

    let app = routes::app(
        transport,
        orchestrator.stats(),
        host_info,
        exchange_tx,
        Arc::new(AtomicUsize::new(0)),
    );
    let addr = format!("{}:{}", app_config.server.host, app_config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", addr);

    tokio::select! {
        result = axum::serve(listener, app) => {
            result?;
        }
        _ = shutdown_signal() => {
            tracing::info!("Received shutdown signal");
            let _ = shutdown_tx.send(());
            let _ = worker_handle.await;
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(s) => s,
                Err(_) => {
                    let _ = tokio::signal::ctrl_c().await;
                    return;
                }
            };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
