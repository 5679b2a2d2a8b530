// Raw cumulative CPU counters, one per time category of the aggregate `cpu` record.

use serde::{Deserialize, Serialize};
use wincode::{SchemaRead, SchemaWrite};

/// Category names in the order the kernel prints them.
pub const CPU_CATEGORIES: [&str; 10] = [
    "user",
    "nice",
    "system",
    "idle",
    "iowait",
    "irq",
    "softirq",
    "steal",
    "guest",
    "guest_nice",
];

/// Position of `idle` in [`CPU_CATEGORIES`].
pub const IDLE_INDEX: usize = 3;

/// Cumulative USER_HZ ticks since boot, per category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, SchemaRead, SchemaWrite)]
#[serde(rename_all = "camelCase")]
pub struct RawSample {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
    pub irq: u64,
    pub softirq: u64,
    pub steal: u64,
    pub guest: u64,
    pub guest_nice: u64,
}

impl RawSample {
    pub fn from_counters(c: [u64; 10]) -> Self {
        Self {
            user: c[0],
            nice: c[1],
            system: c[2],
            idle: c[3],
            iowait: c[4],
            irq: c[5],
            softirq: c[6],
            steal: c[7],
            guest: c[8],
            guest_nice: c[9],
        }
    }

    /// Counters in [`CPU_CATEGORIES`] order.
    pub fn counters(&self) -> [u64; 10] {
        [
            self.user,
            self.nice,
            self.system,
            self.idle,
            self.iowait,
            self.irq,
            self.softirq,
            self.steal,
            self.guest,
            self.guest_nice,
        ]
    }
}
