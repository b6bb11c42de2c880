//! Client-side request counters.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
/// Snapshot of client metrics at a point in time.
pub struct MetricsSnapshot {
    /// Number of engine calls started.
    pub requests_total: u64,
    /// Number of channel attempts, including retries.
    pub attempts_total: u64,
    /// Number of retries after a transient failure.
    pub retries_total: u64,
    /// Number of calls that returned a decoded response.
    pub successes_total: u64,
    /// Number of calls that returned a transport failure.
    pub failures_total: u64,
    /// Number of calls whose response failed to decode.
    pub decode_errors_total: u64,
    /// Number of attempts abandoned at the per-attempt deadline.
    pub timeouts_total: u64,
    /// Number of user callbacks that panicked.
    pub callback_faults_total: u64,
}

/// Thread-safe client metrics collector.
#[derive(Default)]
pub struct ClientMetrics {
    requests_total: AtomicU64,
    attempts_total: AtomicU64,
    retries_total: AtomicU64,
    successes_total: AtomicU64,
    failures_total: AtomicU64,
    decode_errors_total: AtomicU64,
    timeouts_total: AtomicU64,
    callback_faults_total: AtomicU64,
}

impl std::fmt::Debug for ClientMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientMetrics")
            .field("snapshot", &self.snapshot())
            .finish()
    }
}

impl ClientMetrics {
    /// Creates a collector with all counters at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn inc_requests(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_attempts(&self) {
        self.attempts_total.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_retries(&self) {
        self.retries_total.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_successes(&self) {
        self.successes_total.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_failures(&self) {
        self.failures_total.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_decode_errors(&self) {
        self.decode_errors_total.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_timeouts(&self) {
        self.timeouts_total.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_callback_faults(&self) {
        self.callback_faults_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a snapshot of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_total: self.requests_total.load(Ordering::Relaxed),
            attempts_total: self.attempts_total.load(Ordering::Relaxed),
            retries_total: self.retries_total.load(Ordering::Relaxed),
            successes_total: self.successes_total.load(Ordering::Relaxed),
            failures_total: self.failures_total.load(Ordering::Relaxed),
            decode_errors_total: self.decode_errors_total.load(Ordering::Relaxed),
            timeouts_total: self.timeouts_total.load(Ordering::Relaxed),
            callback_faults_total: self.callback_faults_total.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_metrics_are_zero() {
        let metrics = ClientMetrics::new();
        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_counters_increment() {
        let metrics = ClientMetrics::new();
        metrics.inc_requests();
        metrics.inc_attempts();
        metrics.inc_attempts();
        metrics.inc_retries();
        metrics.inc_successes();
        metrics.inc_callback_faults();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.requests_total, 1);
        assert_eq!(snapshot.attempts_total, 2);
        assert_eq!(snapshot.retries_total, 1);
        assert_eq!(snapshot.successes_total, 1);
        assert_eq!(snapshot.failures_total, 0);
        assert_eq!(snapshot.callback_faults_total, 1);
    }

    #[test]
    fn test_snapshot_serializes() {
        let metrics = ClientMetrics::new();
        metrics.inc_failures();
        metrics.inc_timeouts();
        metrics.inc_decode_errors();
        let json = serde_json::to_string(&metrics.snapshot()).unwrap();
        assert!(json.contains("\"failures_total\":1"));
        assert!(json.contains("\"timeouts_total\":1"));
        assert!(json.contains("\"decode_errors_total\":1"));
    }

    #[test]
    fn test_debug_format() {
        let metrics = ClientMetrics::new();
        assert!(format!("{metrics:?}").contains("ClientMetrics"));
    }
}
