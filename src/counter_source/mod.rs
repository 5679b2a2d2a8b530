// Cumulative CPU counters from the kernel's aggregate `cpu` record.

mod host;
mod linux;

pub use host::read_host_info;

use crate::models::RawSample;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_STAT_FILE: &str = "/proc/stat";

/// Counters every kernel exposes: user, nice, system, idle.
const MIN_COUNTERS: usize = 4;

#[derive(Debug, Error)]
pub enum CounterError {
    #[error("could not read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed cpu record: {0}")]
    Parse(String),
}

/// Something that can produce a fresh [`RawSample`]. Reads must be quick and synchronous.
pub trait CounterSource: Send + Sync + 'static {
    fn read(&self) -> Result<RawSample, CounterError>;
}

/// Reads the first line of a `/proc/stat` formatted file.
#[derive(Debug, Clone)]
pub struct ProcStatSource {
    path: PathBuf,
}

impl Default for ProcStatSource {
    fn default() -> Self {
        Self::new(DEFAULT_STAT_FILE)
    }
}

impl ProcStatSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CounterSource for ProcStatSource {
    fn read(&self) -> Result<RawSample, CounterError> {
        let line = linux::read_first_line(&self.path).map_err(|source| CounterError::Read {
            path: self.path.clone(),
            source,
        })?;
        parse_cpu_line(&line)
    }
}

/// Parse `cpu  user nice system idle iowait irq softirq steal guest guest_nice`.
///
/// Older kernels print fewer columns; the missing trailing categories read as 0.
pub fn parse_cpu_line(line: &str) -> Result<RawSample, CounterError> {
    let mut parts = line.split_whitespace();
    match parts.next() {
        Some("cpu") => {}
        Some(label) => {
            return Err(CounterError::Parse(format!(
                "expected aggregate \"cpu\" label, got {:?}",
                label
            )));
        }
        None => return Err(CounterError::Parse("empty record".into())),
    }

    let mut counters = [0u64; 10];
    let mut n = 0;
    for (slot, field) in counters.iter_mut().zip(parts) {
        *slot = field
            .parse()
            .map_err(|e| CounterError::Parse(format!("field {:?}: {}", field, e)))?;
        n += 1;
    }
    if n < MIN_COUNTERS {
        return Err(CounterError::Parse(format!(
            "expected at least {} counters, got {}",
            MIN_COUNTERS, n
        )));
    }
    Ok(RawSample::from_counters(counters))
}
