//! Retry logic.
//!
//! # Responsibilities
//! - Determine if a request is retryable (idempotent methods only)
//! - Enforce a retry budget (fraction of recent traffic)
//!
//! # Design Decisions
//! - Never retry POST/PATCH (non-idempotent)
//! - Connection errors are always retryable for idempotent methods;
//!   among response codes only 502/503/504 are
//! - Jittered backoff (see backoff.rs) prevents thundering herd
//! - Budget prevents retry storms under load

use std::sync::atomic::{AtomicU64, Ordering};

use axum::http::{Method, StatusCode};

/// Tracks a sliding ratio of retries to requests.
///
/// Counters decay by halving once the request count passes a window size,
/// which is cheap and close enough to a true sliding window for budget
/// enforcement.
#[derive(Debug)]
pub struct RetryBudget {
    requests: AtomicU64,
    retries: AtomicU64,
    ratio: f32,
    window: u64,
    /// Retries always allowed regardless of ratio, so low-traffic periods
    /// can still retry.
    min_retries: u64,
}

impl RetryBudget {
    pub fn new(ratio: f32, window: u64) -> Self {
        Self {
            requests: AtomicU64::new(0),
            retries: AtomicU64::new(0),
            ratio,
            window: window.max(1),
            min_retries: 10,
        }
    }

    /// Record an incoming (first-attempt) request.
    pub fn record_request(&self) {
        let count = self.requests.fetch_add(1, Ordering::Relaxed) + 1;
        if count >= self.window * 2 {
            // Decay both counters, keeping the ratio roughly intact.
            self.requests.store(count / 2, Ordering::Relaxed);
            let retries = self.retries.load(Ordering::Relaxed);
            self.retries.store(retries / 2, Ordering::Relaxed);
        }
    }

    /// Check whether a retry is within budget, and consume it if so.
    pub fn can_retry(&self) -> bool {
        let requests = self.requests.load(Ordering::Relaxed);
        let retries = self.retries.load(Ordering::Relaxed);

        let budget = (requests as f64 * self.ratio as f64) as u64 + self.min_retries;
        if retries >= budget {
            return false;
        }
        self.retries.fetch_add(1, Ordering::Relaxed);
        true
    }
}

/// Decide whether a request attempt may be retried.
///
/// `connect_error` is true when the upstream was never reached; in that
/// case there is no status to inspect.
pub fn is_retryable(method: &Method, status: Option<StatusCode>, connect_error: bool) -> bool {
    if !method.is_idempotent() {
        return false;
    }

    if connect_error {
        return true;
    }

    matches!(
        status,
        Some(StatusCode::BAD_GATEWAY)
            | Some(StatusCode::SERVICE_UNAVAILABLE)
            | Some(StatusCode::GATEWAY_TIMEOUT)
    )
}
