use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Process-wide performance counters. Initialized once, mutated after every
/// request completion, never reset during normal operation. The rolling
/// average is derived from atomic totals at snapshot time so concurrent
/// updates cannot lose each other.
#[derive(Debug, Default)]
pub struct EngineMetrics {
    requests_processed: AtomicU64,
    errors: AtomicU64,
    succeeded: AtomicU64,
    total_response_ms: AtomicU64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub requests_processed: u64,
    pub errors: u64,
    pub avg_response_ms: f64,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&self, response_ms: u64) {
        self.requests_processed.fetch_add(1, Ordering::Relaxed);
        self.succeeded.fetch_add(1, Ordering::Relaxed);
        self.total_response_ms
            .fetch_add(response_ms, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.requests_processed.fetch_add(1, Ordering::Relaxed);
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let succeeded = self.succeeded.load(Ordering::Relaxed);
        let total_ms = self.total_response_ms.load(Ordering::Relaxed);
        MetricsSnapshot {
            requests_processed: self.requests_processed.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            avg_response_ms: if succeeded == 0 {
                0.0
            } else {
                total_ms as f64 / succeeded as f64
            },
        }
    }
}
