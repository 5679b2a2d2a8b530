// Background sampling worker: owns the schedule (tick, coverage log, periodic exchange)
// and serves urgent exchange requests from the HTTP layer.

use crate::counter_source::CounterSource;
use crate::orchestrator::SamplingOrchestrator;
use crate::sample_store::SampleStore;
use crate::transport::Transport;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Duration, Instant, interval, interval_at};
use tracing::Instrument;

/// Capacity of the exchange request channel; extra requests while one is pending are dropped.
pub const EXCHANGE_REQUEST_CAPACITY: usize = 8;

/// Ask the worker to drain and send buffered points now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExchangeRequest {
    pub urgent: bool,
}

/// Worker timing config.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub tick_interval: Duration,
    /// How often to log sampling coverage.
    pub monitor_interval: Duration,
    /// How often to send buffered points without being asked.
    pub exchange_interval: Duration,
}

/// Channels the worker listens on besides its timers.
pub struct WorkerDeps {
    pub exchange_rx: mpsc::Receiver<ExchangeRequest>,
    pub shutdown_rx: oneshot::Receiver<()>,
}

/// Seconds since the Unix epoch; 0 (logged) if the clock is before the epoch.
pub fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, operation = "get_timestamp", "system time error");
            0
        })
}

pub fn spawn<C, S, T>(
    orchestrator: Arc<SamplingOrchestrator<C, S, T>>,
    deps: WorkerDeps,
    config: WorkerConfig,
) -> tokio::task::JoinHandle<()>
where
    C: CounterSource,
    S: SampleStore,
    T: Transport,
{
    let WorkerDeps {
        mut exchange_rx,
        mut shutdown_rx,
    } = deps;
    let WorkerConfig {
        tick_interval,
        monitor_interval,
        exchange_interval,
    } = config;

    let worker_span = tracing::span!(
        tracing::Level::DEBUG,
        "worker",
        tick_interval_ms = tick_interval.as_millis() as u64
    );

    tokio::spawn(
        async move {
            let mut tick = interval(tick_interval);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            let mut monitor_tick = interval_at(Instant::now() + monitor_interval, monitor_interval);
            monitor_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            let mut exchange_tick = interval_at(Instant::now() + exchange_interval, exchange_interval);
            exchange_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = tick.tick() => {
                        orchestrator.run_tick(unix_now()).await;
                    }
                    _ = monitor_tick.tick() => {
                        orchestrator.log_coverage(unix_now());
                    }
                    _ = exchange_tick.tick() => {
                        let sent = orchestrator.exchange(false);
                        tracing::debug!(operation = "exchange", points_sent = sent, "periodic exchange");
                    }
                    Some(request) = exchange_rx.recv() => {
                        let sent = orchestrator.exchange(request.urgent);
                        tracing::debug!(operation = "exchange", points_sent = sent, urgent = request.urgent, "requested exchange");
                    }
                    _ = &mut shutdown_rx => {
                        tracing::debug!("Worker shutting down");
                        break;
                    }
                }
            }
            orchestrator.log_coverage(unix_now());
        }
        .instrument(worker_span),
    )
}
