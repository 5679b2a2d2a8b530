// Shared test helpers
#![allow(dead_code)]

use cpuusage::counter_source::{CounterError, CounterSource};
use cpuusage::models::{CpuUsageMessage, RawSample};
use cpuusage::transport::Transport;
use std::collections::{BTreeSet, VecDeque};
use std::path::PathBuf;
use std::sync::Mutex;

/// Sample with only user and idle set.
pub fn sample(user: u64, idle: u64) -> RawSample {
    RawSample {
        user,
        idle,
        ..RawSample::default()
    }
}

/// Counter source replaying a script; `None` entries fail like a missing /proc/stat.
/// Once the script is exhausted the last sample is repeated.
pub struct ScriptedSource {
    script: Mutex<VecDeque<Option<RawSample>>>,
    last: Mutex<Option<RawSample>>,
    reads: Mutex<u64>,
}

impl ScriptedSource {
    pub fn new(script: Vec<Option<RawSample>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(None),
            reads: Mutex::new(0),
        }
    }

    pub fn reads(&self) -> u64 {
        *self.reads.lock().unwrap()
    }
}

impl CounterSource for ScriptedSource {
    fn read(&self) -> Result<RawSample, CounterError> {
        *self.reads.lock().unwrap() += 1;
        let next = self.script.lock().unwrap().pop_front();
        let next = match next {
            Some(entry) => entry,
            None => *self.last.lock().unwrap(),
        };
        match next {
            Some(s) => {
                *self.last.lock().unwrap() = Some(s);
                Ok(s)
            }
            None => Err(CounterError::Read {
                path: PathBuf::from("/proc/stat"),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "scripted failure"),
            }),
        }
    }
}

/// Transport that records what it was asked to send.
pub struct RecordingTransport {
    accepted: Mutex<BTreeSet<String>>,
    sent: Mutex<Vec<(CpuUsageMessage, bool)>>,
}

impl RecordingTransport {
    pub fn accepting(types: &[&str]) -> Self {
        Self {
            accepted: Mutex::new(types.iter().map(|t| t.to_string()).collect()),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn accept(&self, message_type: &str) {
        self.accepted.lock().unwrap().insert(message_type.to_string());
    }

    pub fn sent(&self) -> Vec<(CpuUsageMessage, bool)> {
        self.sent.lock().unwrap().clone()
    }
}

impl Transport for RecordingTransport {
    fn is_accepted(&self, message_type: &str) -> bool {
        self.accepted.lock().unwrap().contains(message_type)
    }

    fn send(&self, message: CpuUsageMessage, urgent: bool) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push((message, urgent));
        Ok(())
    }
}
