use serde::Deserialize;

use crate::counter_source::DEFAULT_STAT_FILE;
use crate::models::CPU_USAGE_MESSAGE_TYPE;
use crate::orchestrator::DEFAULT_COVERAGE_MIN_PERCENT;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub sampling: SamplingConfig,
    #[serde(default)]
    pub transport: TransportConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite file holding the previous sample and the open window.
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SamplingConfig {
    #[serde(default = "default_stat_file")]
    pub stat_file: String,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Width of one reported window.
    #[serde(default = "default_step_size_secs")]
    pub step_size_secs: u64,
    /// How often to log sampling coverage.
    #[serde(default = "default_monitor_interval_secs")]
    pub monitor_interval_secs: u64,
    #[serde(default = "default_coverage_min_percent")]
    pub coverage_min_percent: f64,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            stat_file: default_stat_file(),
            interval_secs: default_interval_secs(),
            step_size_secs: default_step_size_secs(),
            monitor_interval_secs: default_monitor_interval_secs(),
            coverage_min_percent: default_coverage_min_percent(),
        }
    }
}

fn default_stat_file() -> String {
    DEFAULT_STAT_FILE.into()
}

fn default_interval_secs() -> u64 {
    30
}

fn default_step_size_secs() -> u64 {
    300
}

fn default_monitor_interval_secs() -> u64 {
    3600
}

fn default_coverage_min_percent() -> f64 {
    DEFAULT_COVERAGE_MIN_PERCENT
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransportConfig {
    /// Message types the collector accepts at startup; can be changed at runtime.
    #[serde(default = "default_accepted_types")]
    pub accepted_types: Vec<String>,
    #[serde(default = "default_exchange_interval_secs")]
    pub exchange_interval_secs: u64,
    /// Max number of messages kept for /ws/cpu-usage subscribers (slow clients may lag).
    #[serde(default = "default_broadcast_capacity")]
    pub broadcast_capacity: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            accepted_types: default_accepted_types(),
            exchange_interval_secs: default_exchange_interval_secs(),
            broadcast_capacity: default_broadcast_capacity(),
        }
    }
}

fn default_accepted_types() -> Vec<String> {
    vec![CPU_USAGE_MESSAGE_TYPE.into()]
}

fn default_exchange_interval_secs() -> u64 {
    900
}

fn default_broadcast_capacity() -> usize {
    64
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.server.port > 0,
            "server.port must be between 1 and 65535, got {}",
            self.server.port
        );
        anyhow::ensure!(
            !self.database.path.is_empty(),
            "database.path must be non-empty"
        );
        anyhow::ensure!(
            !self.sampling.stat_file.is_empty(),
            "sampling.stat_file must be non-empty"
        );
        anyhow::ensure!(
            self.sampling.interval_secs > 0,
            "sampling.interval_secs must be > 0, got {}",
            self.sampling.interval_secs
        );
        anyhow::ensure!(
            self.sampling.step_size_secs >= self.sampling.interval_secs,
            "sampling.step_size_secs must be >= sampling.interval_secs ({}), got {}",
            self.sampling.interval_secs,
            self.sampling.step_size_secs
        );
        anyhow::ensure!(
            self.sampling.monitor_interval_secs > 0,
            "sampling.monitor_interval_secs must be > 0, got {}",
            self.sampling.monitor_interval_secs
        );
        anyhow::ensure!(
            self.sampling.coverage_min_percent > 0.0 && self.sampling.coverage_min_percent <= 1.0,
            "sampling.coverage_min_percent must be in (0, 1], got {}",
            self.sampling.coverage_min_percent
        );
        anyhow::ensure!(
            self.transport.exchange_interval_secs > 0,
            "transport.exchange_interval_secs must be > 0, got {}",
            self.transport.exchange_interval_secs
        );
        anyhow::ensure!(
            self.transport.broadcast_capacity > 0,
            "transport.broadcast_capacity must be > 0, got {}",
            self.transport.broadcast_capacity
        );
        Ok(())
    }
}
