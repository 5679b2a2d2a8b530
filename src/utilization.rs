// Utilization between two cumulative counter samples.
//
// The sample to remember for the next tick is returned alongside the result and is always
// the new sample, whatever the outcome.

use crate::models::{CPU_CATEGORIES, IDLE_INDEX, RawSample};

/// Outcome of comparing a sample against the one before it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Utilization {
    /// Fraction of elapsed CPU time that was not idle, in `[0, 1]`.
    Ratio(f64),
    /// Nothing to compare against yet.
    FirstSample,
    /// A counter went backwards; the machine most likely rebooted.
    ResetDetected { category: &'static str },
    /// No CPU time elapsed between the samples.
    DegenerateWindow,
    /// Computed value fell outside `[0, 1]`.
    OutOfRange(f64),
}

impl Utilization {
    pub fn ratio(&self) -> Option<f64> {
        match *self {
            Utilization::Ratio(r) => Some(r),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Computation {
    pub utilization: Utilization,
    /// Sample to persist as the previous one for the next tick.
    pub next_previous: RawSample,
}

pub fn compute(new_sample: &RawSample, previous: Option<&RawSample>) -> Computation {
    let utilization = match previous {
        Some(previous) => utilization_between(previous, new_sample),
        None => Utilization::FirstSample,
    };
    Computation {
        utilization,
        next_previous: *new_sample,
    }
}

/// Ratio of non-idle to total elapsed ticks between `previous` and `current`.
pub fn utilization_between(previous: &RawSample, current: &RawSample) -> Utilization {
    let mut used: u128 = 0;
    let mut idle: u128 = 0;
    for (i, (prev, cur)) in previous
        .counters()
        .into_iter()
        .zip(current.counters())
        .enumerate()
    {
        let Some(delta) = cur.checked_sub(prev) else {
            return Utilization::ResetDetected {
                category: CPU_CATEGORIES[i],
            };
        };
        if i == IDLE_INDEX {
            idle = delta as u128;
        } else {
            used += delta as u128;
        }
    }

    let divisor = used + idle;
    if divisor == 0 {
        return Utilization::DegenerateWindow;
    }
    checked_ratio(used as f64 / divisor as f64)
}

/// Rejects anything outside `[0, 1]`, NaN included.
pub fn checked_ratio(ratio: f64) -> Utilization {
    if (0.0..=1.0).contains(&ratio) {
        Utilization::Ratio(ratio)
    } else {
        Utilization::OutOfRange(ratio)
    }
}
