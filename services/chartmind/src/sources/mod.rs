//! HTTP clients for the external collaborators: vision/OCR sidecar and news

pub mod news;
pub mod vision;

use chrono::{DateTime, TimeZone, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::types::SourceHealth;

/// Timeout applied to every outbound request
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Success/failure bookkeeping so health checks need no extra requests
pub(crate) struct HealthTracker {
    /// Millis since epoch of the last success
    last_success_ms: AtomicU64,
    /// Millis since epoch of the last failure
    last_failure_ms: AtomicU64,
    success_count: AtomicU64,
    failure_count: AtomicU64,
    last_latency_ms: AtomicU64,
    last_error: Mutex<Option<String>>,
}

impl HealthTracker {
    pub(crate) fn new() -> Self {
        Self {
            last_success_ms: AtomicU64::new(0),
            last_failure_ms: AtomicU64::new(0),
            success_count: AtomicU64::new(0),
            failure_count: AtomicU64::new(0),
            last_latency_ms: AtomicU64::new(0),
            last_error: Mutex::new(None),
        }
    }

    pub(crate) fn record_success(&self, latency_ms: u64) {
        let now_ms = Utc::now().timestamp_millis() as u64;
        self.last_success_ms.store(now_ms, Ordering::Relaxed);
        self.last_latency_ms.store(latency_ms, Ordering::Relaxed);
        self.success_count.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self, error: &str) {
        let now_ms = Utc::now().timestamp_millis() as u64;
        self.last_failure_ms.store(now_ms, Ordering::Relaxed);
        self.failure_count.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut last) = self.last_error.lock() {
            *last = Some(error.to_string());
        }
    }

    fn is_healthy(&self) -> bool {
        let last_success = self.last_success_ms.load(Ordering::Relaxed);
        let last_failure = self.last_failure_ms.load(Ordering::Relaxed);

        // no calls yet counts as healthy
        last_failure == 0 || last_success > last_failure
    }

    fn success_rate(&self) -> f64 {
        let successes = self.success_count.load(Ordering::Relaxed);
        let failures = self.failure_count.load(Ordering::Relaxed);
        let total = successes + failures;
        if total == 0 {
            return 1.0;
        }
        successes as f64 / total as f64
    }

    pub(crate) fn snapshot(&self, source: &str) -> SourceHealth {
        let last_success_ms = self.last_success_ms.load(Ordering::Relaxed);
        let last_success: Option<DateTime<Utc>> = if last_success_ms > 0 {
            Utc.timestamp_millis_opt(last_success_ms as i64).single()
        } else {
            None
        };

        SourceHealth {
            source: source.to_string(),
            is_healthy: self.is_healthy(),
            last_success,
            last_error: self.last_error.lock().ok().and_then(|e| e.clone()),
            success_rate: self.success_rate(),
            avg_latency_ms: self.last_latency_ms.load(Ordering::Relaxed),
        }
    }
}
