// In-process store: same contract as SQLite, nothing survives a restart.

use std::collections::HashMap;
use std::sync::Mutex;

use super::SampleStore;
use crate::models::{RawSample, WindowState};

#[derive(Debug, Default)]
pub struct MemorySampleStore {
    samples: Mutex<HashMap<String, RawSample>>,
    windows: Mutex<HashMap<String, WindowState>>,
}

impl MemorySampleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SampleStore for MemorySampleStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<RawSample>> {
        let samples = self
            .samples
            .lock()
            .map_err(|e| anyhow::anyhow!("sample store lock poisoned: {}", e))?;
        Ok(samples.get(key).copied())
    }

    async fn set(&self, key: &str, sample: &RawSample) -> anyhow::Result<()> {
        let mut samples = self
            .samples
            .lock()
            .map_err(|e| anyhow::anyhow!("sample store lock poisoned: {}", e))?;
        samples.insert(key.to_string(), *sample);
        Ok(())
    }

    async fn get_window(&self, key: &str) -> anyhow::Result<Option<WindowState>> {
        let windows = self
            .windows
            .lock()
            .map_err(|e| anyhow::anyhow!("window store lock poisoned: {}", e))?;
        Ok(windows.get(key).copied())
    }

    async fn set_window(&self, key: &str, state: &WindowState) -> anyhow::Result<()> {
        let mut windows = self
            .windows
            .lock()
            .map_err(|e| anyhow::anyhow!("window store lock poisoned: {}", e))?;
        windows.insert(key.to_string(), *state);
        Ok(())
    }
}
