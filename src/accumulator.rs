// Time-bucketing of utilization ratios into fixed-width windows, one open window per key.

use std::collections::HashMap;

use crate::models::{AccumulatedPoint, WindowState};

/// Folds `(timestamp, value)` pairs into windows of `step_size` seconds aligned to the epoch.
#[derive(Debug)]
pub struct WindowAccumulator {
    step_size: u64,
    windows: HashMap<String, WindowState>,
}

impl WindowAccumulator {
    /// `step_size` is clamped to at least one second.
    pub fn new(step_size: u64) -> Self {
        Self {
            step_size: step_size.max(1),
            windows: HashMap::new(),
        }
    }

    pub fn step_size(&self) -> u64 {
        self.step_size
    }

    /// Credits `value` for the time since the previous call on `key` and returns the
    /// window that closed, if `timestamp` crossed a boundary.
    pub fn add(&mut self, key: &str, timestamp: u64, value: f64) -> Option<AccumulatedPoint> {
        let step = self.step_size;
        let Some(state) = self.windows.get_mut(key) else {
            self.windows
                .insert(key.to_string(), open_window(step, timestamp));
            return None;
        };

        if timestamp < state.last_timestamp {
            tracing::debug!(
                key,
                timestamp,
                last_timestamp = state.last_timestamp,
                "timestamp went backwards; reopening window"
            );
            *state = open_window(step, timestamp);
            return None;
        }

        let window_end = state.window_start + step;
        if timestamp < window_end {
            let span = timestamp - state.last_timestamp;
            state.weighted_sum += value * span as f64;
            state.covered += span;
            state.last_timestamp = timestamp;
            return None;
        }

        if timestamp >= window_end + step {
            tracing::debug!(
                key,
                window_start = state.window_start,
                timestamp,
                "gap spans more than one window; dropping partial window"
            );
            *state = carried_window(step, boundary(step, timestamp), timestamp, value);
            return None;
        }

        let span = window_end - state.last_timestamp;
        let weighted_sum = state.weighted_sum + value * span as f64;
        let covered = state.covered + span;
        let point = AccumulatedPoint {
            window_start: state.window_start,
            window_end,
            ratio: weighted_sum / covered as f64,
        };
        *state = carried_window(step, window_end, timestamp, value);
        Some(point)
    }

    /// Open window for `key`, for persistence.
    pub fn state(&self, key: &str) -> Option<&WindowState> {
        self.windows.get(key)
    }

    /// Reinstates a persisted window. Returns false (and keeps nothing) when the state was
    /// recorded with a different step size or does not describe an open window.
    pub fn restore(&mut self, key: &str, state: WindowState) -> bool {
        if !is_consistent(self.step_size, &state) {
            return false;
        }
        self.windows.insert(key.to_string(), state);
        true
    }
}

/// Aligned, open at `last_timestamp`, and holding a mean that can only land in `[0, 1]`.
fn is_consistent(step: u64, state: &WindowState) -> bool {
    if state.step_size != step || state.window_start % step != 0 {
        return false;
    }
    let Some(window_end) = state.window_start.checked_add(step) else {
        return false;
    };
    if state.last_timestamp < state.window_start || state.last_timestamp >= window_end {
        return false;
    }
    state.covered <= state.last_timestamp - state.window_start
        && state.weighted_sum.is_finite()
        && state.weighted_sum >= 0.0
        && state.weighted_sum <= state.covered as f64
}

fn boundary(step: u64, timestamp: u64) -> u64 {
    (timestamp / step) * step
}

fn open_window(step: u64, timestamp: u64) -> WindowState {
    WindowState {
        step_size: step,
        window_start: boundary(step, timestamp),
        last_timestamp: timestamp,
        weighted_sum: 0.0,
        covered: 0,
    }
}

/// Window starting at `start` already credited with `value` up to `timestamp`.
fn carried_window(step: u64, start: u64, timestamp: u64, value: f64) -> WindowState {
    let covered = timestamp - start;
    WindowState {
        step_size: step,
        window_start: start,
        last_timestamp: timestamp,
        weighted_sum: value * covered as f64,
        covered,
    }
}
