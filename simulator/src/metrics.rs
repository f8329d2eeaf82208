//! Run summary.

use std::time::Duration;

/// Outcome counters and lookup latencies of a scenario run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// Checked steps that met their expectation.
    pub passed: u64,
    /// Indexes of checked steps that did not.
    pub failed_steps: Vec<usize>,
    /// Latency samples (µs) of rate and convert steps.
    latency_samples: Vec<u64>,
}

impl RunSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_pass(&mut self) {
        self.passed += 1;
    }

    pub fn record_failure(&mut self, step: usize) {
        self.failed_steps.push(step);
    }

    /// Record how long a lookup took.
    pub fn record_lookup(&mut self, elapsed: Duration) {
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.latency_samples.push(micros);
    }

    /// Number of checked steps.
    pub fn checked(&self) -> u64 {
        self.passed + self.failed_steps.len() as u64
    }

    pub fn all_passed(&self) -> bool {
        self.failed_steps.is_empty()
    }

    /// Average lookup latency in µs.
    pub fn average_latency_us(&self) -> u64 {
        if self.latency_samples.is_empty() {
            return 0;
        }

        let sum: u64 = self.latency_samples.iter().sum();
        sum / self.latency_samples.len() as u64
    }

    /// Slowest lookup in µs. Uncached lookups dominate it.
    pub fn max_latency_us(&self) -> u64 {
        self.latency_samples.iter().copied().max().unwrap_or(0)
    }
}
