// Coverage of a periodic event: how many of the expected occurrences actually happened.

/// Counts pings against the number expected from `repeat_interval` and reports the ratio.
#[derive(Debug, Clone)]
pub struct CoverageMonitor {
    event_name: String,
    repeat_interval: u64,
    min_percent: f64,
    count: u64,
    total_count: u64,
    start: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoverageReport {
    pub count: u64,
    pub expected: u64,
    /// `count / expected`, 1.0 while nothing is expected yet.
    pub percent: f64,
    pub elapsed_secs: u64,
    pub below_threshold: bool,
}

impl CoverageMonitor {
    /// `repeat_interval` in seconds (clamped to at least 1); `min_percent` in `(0, 1]`.
    pub fn new(event_name: impl Into<String>, repeat_interval: u64, min_percent: f64, now: u64) -> Self {
        Self {
            event_name: event_name.into(),
            repeat_interval: repeat_interval.max(1),
            min_percent,
            count: 0,
            total_count: 0,
            start: now,
        }
    }

    pub fn ping(&mut self) {
        self.count += 1;
        self.total_count += 1;
    }

    /// Pings since the monitor was created.
    pub fn total_count(&self) -> u64 {
        self.total_count
    }

    pub fn report(&self, now: u64) -> CoverageReport {
        let elapsed_secs = now.saturating_sub(self.start);
        let expected = elapsed_secs / self.repeat_interval;
        let percent = if expected == 0 {
            1.0
        } else {
            self.count as f64 / expected as f64
        };
        CoverageReport {
            count: self.count,
            expected,
            percent,
            elapsed_secs,
            below_threshold: percent < self.min_percent,
        }
    }

    /// Logs the current report (warn when below threshold) and starts a new period.
    pub fn log(&mut self, now: u64) -> CoverageReport {
        let report = self.report(now);
        let percent = report.percent * 100.0;
        if report.below_threshold {
            tracing::warn!(
                event = %self.event_name,
                count = report.count,
                expected = report.expected,
                elapsed_secs = report.elapsed_secs,
                "{} of {} expected {} events ({:.2}%) occurred",
                report.count,
                report.expected,
                self.event_name,
                percent
            );
        } else {
            tracing::info!(
                event = %self.event_name,
                count = report.count,
                expected = report.expected,
                elapsed_secs = report.elapsed_secs,
                "{} of {} expected {} events ({:.2}%) occurred",
                report.count,
                report.expected,
                self.event_name,
                percent
            );
        }
        self.count = 0;
        self.start = now;
        report
    }
}
