// Outbound delivery of CPU usage messages to the collector.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock};
use std::time::{Duration, Instant};

use tokio::sync::broadcast;

use crate::models::{CpuUsageMessage, Envelope};

/// Rate limit for the "no subscribers" log line.
const NO_RECEIVERS_LOG_INTERVAL: Duration = Duration::from_secs(60);

pub trait Transport: Send + Sync + 'static {
    /// Whether the collector currently wants messages of this type.
    fn is_accepted(&self, message_type: &str) -> bool;

    fn send(&self, message: CpuUsageMessage, urgent: bool) -> anyhow::Result<()>;
}

/// Fans messages out to every WebSocket subscriber. Messages sent while nobody is
/// subscribed are dropped.
pub struct BroadcastTransport {
    accepted: RwLock<BTreeSet<String>>,
    tx: broadcast::Sender<Envelope>,
    sent_total: AtomicU64,
    undelivered_total: AtomicU64,
    last_no_receivers_log: Mutex<Option<Instant>>,
}

impl BroadcastTransport {
    pub fn new<I, S>(accepted_types: I, capacity: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            accepted: RwLock::new(accepted_types.into_iter().map(Into::into).collect()),
            tx,
            sent_total: AtomicU64::new(0),
            undelivered_total: AtomicU64::new(0),
            last_no_receivers_log: Mutex::new(None),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Envelope> {
        self.tx.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn accepted_types(&self) -> Vec<String> {
        self.accepted
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    /// Replaces the accepted set and returns the types that were not accepted before.
    pub fn set_accepted_types<I, S>(&self, types: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let next: BTreeSet<String> = types.into_iter().map(Into::into).collect();
        let mut accepted = self.accepted.write().unwrap_or_else(|e| e.into_inner());
        let newly: Vec<String> = next.difference(&accepted).cloned().collect();
        tracing::info!(accepted_types = ?next, "accepted message types updated");
        *accepted = next;
        newly
    }

    pub fn sent_total(&self) -> u64 {
        self.sent_total.load(Ordering::Relaxed)
    }

    pub fn undelivered_total(&self) -> u64 {
        self.undelivered_total.load(Ordering::Relaxed)
    }
}

impl Transport for BroadcastTransport {
    fn is_accepted(&self, message_type: &str) -> bool {
        self.accepted
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains(message_type)
    }

    fn send(&self, message: CpuUsageMessage, urgent: bool) -> anyhow::Result<()> {
        let points = message.cpu_usages.len();
        match self.tx.send(Envelope { urgent, message }) {
            Ok(receivers) => {
                self.sent_total.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    operation = "send",
                    points,
                    receivers,
                    urgent,
                    "cpu usage message sent"
                );
            }
            Err(_) => {
                self.undelivered_total.fetch_add(1, Ordering::Relaxed);
                let mut last = self
                    .last_no_receivers_log
                    .lock()
                    .unwrap_or_else(|e| e.into_inner());
                if last.is_none_or(|t| t.elapsed() >= NO_RECEIVERS_LOG_INTERVAL) {
                    tracing::debug!(
                        operation = "send",
                        points,
                        "No collector connected; cpu usage message dropped"
                    );
                    *last = Some(Instant::now());
                }
            }
        }
        Ok(())
    }
}
