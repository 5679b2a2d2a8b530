// Completed utilization windows and the message that carries them to the collector.

use serde::{Deserialize, Serialize};

/// Message type the collector must accept before points are drained.
pub const CPU_USAGE_MESSAGE_TYPE: &str = "cpu-usage";

/// One closed window. Timestamps are seconds since the Unix epoch, `window_start < window_end`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccumulatedPoint {
    pub window_start: u64,
    pub window_end: u64,
    /// Time-weighted mean utilization over the window, in `[0, 1]`.
    pub ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CpuUsageMessage {
    #[serde(rename = "type")]
    pub message_type: String,
    pub cpu_usages: Vec<AccumulatedPoint>,
}

impl CpuUsageMessage {
    pub fn new(cpu_usages: Vec<AccumulatedPoint>) -> Self {
        Self {
            message_type: CPU_USAGE_MESSAGE_TYPE.into(),
            cpu_usages,
        }
    }
}

/// What the transport puts on the wire: the message plus its delivery priority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub urgent: bool,
    pub message: CpuUsageMessage,
}
