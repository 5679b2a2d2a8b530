// Static host identity

use serde::{Deserialize, Serialize};

/// Fetched once at startup and exposed via GET /api/info.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostInfo {
    pub host_name: String,
    pub os_name: String,
    pub os_version: String,
    pub kernel_version: String,
    pub processor_name: String,
    pub logical_cores: u32,
}
