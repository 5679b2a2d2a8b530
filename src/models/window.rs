// Open accumulator window; persisted so a restart does not lose a partially filled bucket.

use serde::{Deserialize, Serialize};
use wincode::{SchemaRead, SchemaWrite};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, SchemaRead, SchemaWrite)]
#[serde(rename_all = "camelCase")]
pub struct WindowState {
    /// Width the window was opened with; state from a different width is not restored.
    pub step_size: u64,
    pub window_start: u64,
    pub last_timestamp: u64,
    /// Sum of `ratio * seconds` credited to this window so far.
    pub weighted_sum: f64,
    /// Seconds of this window covered by ratios.
    pub covered: u64,
}
