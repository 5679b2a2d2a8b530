// Sampling tick: read counters, compute utilization, fold into the window, buffer closed windows.
// The outgoing buffer is drained by `exchange`, which may run while a tick is in progress.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;

use crate::accumulator::WindowAccumulator;
use crate::counter_source::CounterSource;
use crate::coverage::{CoverageMonitor, CoverageReport};
use crate::models::{AccumulatedPoint, CPU_USAGE_MESSAGE_TYPE, CpuUsageMessage};
use crate::sample_store::{ACCUMULATOR_KEY, LAST_SAMPLE_KEY, SampleStore};
use crate::transport::Transport;
use crate::utilization::{self, Utilization};

/// Below this share of expected ticks the coverage log is a warning.
pub const DEFAULT_COVERAGE_MIN_PERCENT: f64 = 0.8;

const COVERAGE_EVENT_NAME: &str = "CPU usage snapshot";

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Window width in seconds.
    pub step_size_secs: u64,
    /// Expected seconds between ticks, for coverage accounting.
    pub tick_interval_secs: u64,
    pub coverage_min_percent: f64,
}

/// Counters shared with the HTTP status endpoint.
#[derive(Debug, Default)]
pub struct SamplingStats {
    ticks: AtomicU64,
    read_failures: AtomicU64,
    first_samples: AtomicU64,
    ratios: AtomicU64,
    resets_detected: AtomicU64,
    degenerate_windows: AtomicU64,
    out_of_range: AtomicU64,
    points_emitted: AtomicU64,
    points_sent: AtomicU64,
    pending_points: AtomicU64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SamplingStatsSnapshot {
    pub ticks: u64,
    pub read_failures: u64,
    pub first_samples: u64,
    pub ratios: u64,
    pub resets_detected: u64,
    pub degenerate_windows: u64,
    pub out_of_range: u64,
    pub points_emitted: u64,
    pub points_sent: u64,
    pub pending_points: u64,
}

impl SamplingStats {
    pub fn snapshot(&self) -> SamplingStatsSnapshot {
        SamplingStatsSnapshot {
            ticks: self.ticks.load(Ordering::Relaxed),
            read_failures: self.read_failures.load(Ordering::Relaxed),
            first_samples: self.first_samples.load(Ordering::Relaxed),
            ratios: self.ratios.load(Ordering::Relaxed),
            resets_detected: self.resets_detected.load(Ordering::Relaxed),
            degenerate_windows: self.degenerate_windows.load(Ordering::Relaxed),
            out_of_range: self.out_of_range.load(Ordering::Relaxed),
            points_emitted: self.points_emitted.load(Ordering::Relaxed),
            points_sent: self.points_sent.load(Ordering::Relaxed),
            pending_points: self.pending_points.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Counters could not be read; nothing was persisted or accumulated.
    ReadFailed,
    Computed {
        utilization: Utilization,
        point: Option<AccumulatedPoint>,
    },
}

pub struct SamplingOrchestrator<C, S, T> {
    source: Arc<C>,
    store: Arc<S>,
    transport: Arc<T>,
    accumulator: Mutex<WindowAccumulator>,
    outgoing: Mutex<Vec<AccumulatedPoint>>,
    coverage: Mutex<CoverageMonitor>,
    stats: Arc<SamplingStats>,
}

impl<C, S, T> SamplingOrchestrator<C, S, T>
where
    C: CounterSource,
    S: SampleStore,
    T: Transport,
{
    pub fn new(
        source: Arc<C>,
        store: Arc<S>,
        transport: Arc<T>,
        config: OrchestratorConfig,
        now: u64,
    ) -> Self {
        Self {
            source,
            store,
            transport,
            accumulator: Mutex::new(WindowAccumulator::new(config.step_size_secs)),
            outgoing: Mutex::new(Vec::new()),
            coverage: Mutex::new(CoverageMonitor::new(
                COVERAGE_EVENT_NAME,
                config.tick_interval_secs,
                config.coverage_min_percent,
                now,
            )),
            stats: Arc::new(SamplingStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<SamplingStats> {
        self.stats.clone()
    }

    /// Reloads the open window persisted by a previous run. Returns whether one was restored.
    pub async fn restore(&self) -> bool {
        let state = match self.store.get_window(ACCUMULATOR_KEY).await {
            Ok(Some(state)) => state,
            Ok(None) => return false,
            Err(e) => {
                tracing::warn!(error = %e, operation = "get_window", "could not load accumulator window");
                return false;
            }
        };
        let (restored, step_size) = {
            let mut accumulator = lock(&self.accumulator);
            (
                accumulator.restore(ACCUMULATOR_KEY, state),
                accumulator.step_size(),
            )
        };
        if restored {
            tracing::info!(
                window_start = state.window_start,
                last_timestamp = state.last_timestamp,
                "accumulator window restored"
            );
        } else {
            tracing::info!(
                stored_step_size = state.step_size,
                step_size,
                window_start = state.window_start,
                "persisted accumulator window does not match current step size or is inconsistent; starting fresh"
            );
        }
        restored
    }

    /// One sampling tick at `now` (seconds since the Unix epoch).
    pub async fn run_tick(&self, now: u64) -> TickOutcome {
        lock(&self.coverage).ping();
        self.stats.ticks.fetch_add(1, Ordering::Relaxed);

        let source = self.source.clone();
        let sample = match tokio::task::spawn_blocking(move || source.read()).await {
            Ok(Ok(sample)) => sample,
            Ok(Err(e)) => {
                tracing::warn!(
                    error = %e,
                    operation = "read_counters",
                    "CPU counters unavailable, CPU usage cannot be computed"
                );
                self.stats.read_failures.fetch_add(1, Ordering::Relaxed);
                return TickOutcome::ReadFailed;
            }
            Err(e) => {
                tracing::warn!(error = %e, operation = "read_counters", "counter read task join");
                self.stats.read_failures.fetch_add(1, Ordering::Relaxed);
                return TickOutcome::ReadFailed;
            }
        };

        let previous = match self.store.get(LAST_SAMPLE_KEY).await {
            Ok(previous) => previous,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    operation = "get_sample",
                    "could not load previous sample; treating as first"
                );
                None
            }
        };

        let computation = utilization::compute(&sample, previous.as_ref());
        if let Err(e) = self
            .store
            .set(LAST_SAMPLE_KEY, &computation.next_previous)
            .await
        {
            tracing::warn!(error = %e, operation = "set_sample", "could not persist sample");
        }

        let utilization = computation.utilization;
        self.record(&utilization);
        let Some(ratio) = utilization.ratio() else {
            return TickOutcome::Computed {
                utilization,
                point: None,
            };
        };

        let (point, window) = {
            let mut accumulator = lock(&self.accumulator);
            let point = accumulator.add(ACCUMULATOR_KEY, now, ratio);
            (point, accumulator.state(ACCUMULATOR_KEY).copied())
        };
        if let Some(window) = window
            && let Err(e) = self.store.set_window(ACCUMULATOR_KEY, &window).await
        {
            tracing::warn!(error = %e, operation = "set_window", "could not persist accumulator window");
        }

        if let Some(point) = point {
            let mut outgoing = lock(&self.outgoing);
            outgoing.push(point);
            self.stats
                .pending_points
                .store(outgoing.len() as u64, Ordering::Relaxed);
            self.stats.points_emitted.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(
                window_start = point.window_start,
                window_end = point.window_end,
                ratio = point.ratio,
                "cpu usage window closed"
            );
        }

        TickOutcome::Computed { utilization, point }
    }

    /// Empties the outgoing buffer, oldest point first.
    pub fn drain_outgoing(&self) -> Vec<AccumulatedPoint> {
        let mut outgoing = lock(&self.outgoing);
        self.stats.pending_points.store(0, Ordering::Relaxed);
        std::mem::take(&mut *outgoing)
    }

    pub fn pending_points(&self) -> usize {
        lock(&self.outgoing).len()
    }

    /// Sends buffered points if the collector accepts CPU usage. Returns how many were sent.
    pub fn exchange(&self, urgent: bool) -> usize {
        if !self.transport.is_accepted(CPU_USAGE_MESSAGE_TYPE) {
            tracing::debug!(
                message_type = CPU_USAGE_MESSAGE_TYPE,
                "message type not accepted; keeping points buffered"
            );
            return 0;
        }
        let points = self.drain_outgoing();
        if points.is_empty() {
            return 0;
        }
        let n = points.len();
        match self.transport.send(CpuUsageMessage::new(points.clone()), urgent) {
            Ok(()) => {
                self.stats.points_sent.fetch_add(n as u64, Ordering::Relaxed);
                n
            }
            Err(e) => {
                tracing::warn!(error = %e, operation = "send", points = n, "cpu usage send failed; points kept for next exchange");
                self.requeue(points);
                0
            }
        }
    }

    /// Puts unsent points back ahead of anything buffered since the drain.
    fn requeue(&self, mut points: Vec<AccumulatedPoint>) {
        let mut outgoing = lock(&self.outgoing);
        points.append(&mut outgoing);
        *outgoing = points;
        self.stats
            .pending_points
            .store(outgoing.len() as u64, Ordering::Relaxed);
    }

    pub fn log_coverage(&self, now: u64) -> CoverageReport {
        lock(&self.coverage).log(now)
    }

    fn record(&self, utilization: &Utilization) {
        match *utilization {
            Utilization::Ratio(_) => {
                self.stats.ratios.fetch_add(1, Ordering::Relaxed);
            }
            Utilization::FirstSample => {
                self.stats.first_samples.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("first CPU sample recorded");
            }
            Utilization::ResetDetected { category } => {
                self.stats.resets_detected.fetch_add(1, Ordering::Relaxed);
                tracing::info!(category, "CPU counter went backwards (reboot?); skipping tick");
            }
            Utilization::DegenerateWindow => {
                self.stats.degenerate_windows.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("no CPU time elapsed between samples");
            }
            Utilization::OutOfRange(ratio) => {
                self.stats.out_of_range.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(ratio, "CPU utilization out of range; discarded");
            }
        }
    }
}

fn lock<X>(m: &Mutex<X>) -> MutexGuard<'_, X> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}
