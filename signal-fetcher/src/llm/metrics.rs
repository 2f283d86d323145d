//! Fetch performance metrics
//!
//! Tracks per-attempt outcomes and gateway latency so a batch run can log
//! how the backend behaved.

use std::time::{Duration, Instant};

/// Counters and latency samples for gateway calls made by the fetcher
#[derive(Debug, Clone, Default)]
pub struct FetchMetrics {
    /// Gateway calls made, including retries
    pub attempts: u64,

    /// Attempts that produced a usable analysis
    pub successes: u64,

    /// Attempts that returned an error or an unusable shape
    pub failures: u64,

    /// Symbols that exhausted their retries
    pub exhausted: u64,

    /// Latency of every attempt, in call order (milliseconds)
    pub latencies_ms: Vec<u64>,
}

impl FetchMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_attempt(&mut self, success: bool, latency: Duration) {
        self.attempts += 1;
        if success {
            self.successes += 1;
        } else {
            self.failures += 1;
        }
        self.latencies_ms.push(latency.as_millis() as u64);
    }

    pub fn record_exhausted(&mut self) {
        self.exhausted += 1;
    }

    pub fn avg_latency_ms(&self) -> f64 {
        if self.latencies_ms.is_empty() {
            0.0
        } else {
            self.latencies_ms.iter().sum::<u64>() as f64 / self.latencies_ms.len() as f64
        }
    }

    /// Latency percentile, `None` before any attempt
    pub fn latency_percentile(&self, p: f64) -> Option<u64> {
        if self.latencies_ms.is_empty() {
            return None;
        }
        let mut sorted = self.latencies_ms.clone();
        sorted.sort_unstable();
        Some(percentile(&sorted, p))
    }

    /// Report metrics to tracing logs
    pub fn report(&self) {
        tracing::info!(
            "Fetch metrics: attempts={}, successes={}, failures={}, exhausted={}, avg={:.0}ms, p50={:?}ms, p90={:?}ms",
            self.attempts,
            self.successes,
            self.failures,
            self.exhausted,
            self.avg_latency_ms(),
            self.latency_percentile(50.0),
            self.latency_percentile(90.0),
        );
    }
}

/// Timer helper for measuring operation latency
pub struct MetricsTimer {
    start: Instant,
}

impl MetricsTimer {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Stop the timer and return elapsed duration
    pub fn stop(self) -> Duration {
        self.start.elapsed()
    }
}

/// Nearest-rank percentile over sorted data
fn percentile(sorted_data: &[u64], p: f64) -> u64 {
    let len = sorted_data.len();
    let idx = (p / 100.0 * (len - 1) as f64).round() as usize;
    sorted_data[idx.min(len - 1)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_attempts() {
        let mut metrics = FetchMetrics::new();
        metrics.record_attempt(false, Duration::from_millis(30));
        metrics.record_attempt(true, Duration::from_millis(10));
        metrics.record_exhausted();

        assert_eq!(metrics.attempts, 2);
        assert_eq!(metrics.successes, 1);
        assert_eq!(metrics.failures, 1);
        assert_eq!(metrics.exhausted, 1);
        assert_eq!(metrics.avg_latency_ms(), 20.0);
    }

    #[test]
    fn test_percentile() {
        let data = vec![1, 2, 3, 4, 5];
        assert_eq!(percentile(&data, 0.0), 1);
        assert_eq!(percentile(&data, 50.0), 3);
        assert_eq!(percentile(&data, 100.0), 5);
    }

    #[test]
    fn test_empty_metrics() {
        let metrics = FetchMetrics::new();
        assert_eq!(metrics.latency_percentile(50.0), None);
        assert_eq!(metrics.avg_latency_ms(), 0.0);
    }

    #[test]
    fn test_timer() {
        let timer = MetricsTimer::start();
        std::thread::sleep(Duration::from_millis(10));
        assert!(timer.stop().as_millis() >= 10);
    }
}
