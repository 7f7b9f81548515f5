//! Per-IP rate limiting middleware.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};

use crate::config::schema::RateLimitConfig;
use crate::observability::metrics;

/// A simple token bucket.
struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn new(capacity: f64) -> Self {
        Self {
            tokens: capacity,
            last_update: Instant::now(),
        }
    }

    fn try_acquire(&mut self, capacity: f64, refill_rate: f64) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64();

        // Refill tokens
        self.tokens = (self.tokens + elapsed * refill_rate).min(capacity);
        self.last_update = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Shared state for the per-IP rate limiter.
pub struct RateLimiterState {
    buckets: Mutex<HashMap<String, TokenBucket>>,
    rps: f64,
    burst: f64,
    /// Buckets idle longer than this are dropped; an idle bucket refills
    /// to capacity anyway, so nothing observable is lost.
    idle_expiry: Duration,
}

impl RateLimiterState {
    pub fn new(config: &RateLimitConfig) -> Self {
        let rps = config.requests_per_second as f64;
        let burst = config.burst_size as f64;
        // Several full refill windows, with a floor for high-rate configs.
        let refill_secs = (burst / rps.max(1.0)).max(1.0);
        Self {
            buckets: Mutex::new(HashMap::new()),
            rps,
            burst,
            idle_expiry: Duration::from_secs_f64(refill_secs * 4.0),
        }
    }

    fn check(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut buckets = self.buckets.lock().expect("rate limiter mutex poisoned");
        prune_idle(&mut buckets, now, self.idle_expiry);

        let bucket = buckets
            .entry(key.to_string())
            .or_insert_with(|| TokenBucket::new(self.burst));

        bucket.try_acquire(self.burst, self.rps)
    }
}

/// Drop buckets that have been idle past the expiry, so the map stays
/// bounded under client-IP churn.
fn prune_idle(buckets: &mut HashMap<String, TokenBucket>, now: Instant, expiry: Duration) {
    buckets.retain(|_, bucket| now.saturating_duration_since(bucket.last_update) < expiry);
}

/// Middleware function for per-IP rate limiting.
pub async fn rate_limit_middleware(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<Arc<RateLimiterState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let key = addr.ip().to_string();

    if state.check(&key) {
        next.run(request).await
    } else {
        tracing::warn!(client = %key, "Rate limit exceeded");
        metrics::record_rate_limited("rps_limit");
        let mut response = Response::new(Body::from("Rate limit exceeded"));
        *response.status_mut() = StatusCode::TOO_MANY_REQUESTS;
        response
    }
}
