//! A single server inside an upstream pool.
//!
//! # Responsibilities
//! - Hold the server authority (host:port, possibly a compose DNS name)
//! - Track active connections (for least-connections balancing)
//! - Enforce max connection limits
//! - Track health state (Healthy/Unhealthy) with flap damping

use std::ops::Deref;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;

use url::Url;

/// Health state enum.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    Unknown = 0,
    Healthy = 1,
    Unhealthy = 2,
}

impl From<u8> for HealthState {
    fn from(val: u8) -> Self {
        match val {
            1 => HealthState::Healthy,
            2 => HealthState::Unhealthy,
            _ => HealthState::Unknown,
        }
    }
}

/// A single upstream server.
///
/// Addresses are authorities, not socket addresses: inside the deployment
/// network the upstreams are reached by service name (`gateway:8000`),
/// resolved by the HTTP connector at request time.
#[derive(Debug)]
pub struct UpstreamServer {
    /// The authority of the server (e.g. "gateway:8000").
    pub address: String,
    /// Pre-parsed base URL.
    pub base_url: Url,
    /// Maximum concurrent connections allowed.
    pub max_connections: usize,
    /// Number of currently active connections.
    pub active_connections: AtomicUsize,

    /// Current health state (0=Unknown, 1=Healthy, 2=Unhealthy).
    pub state: AtomicU8,
    /// Consecutive failure count.
    pub consecutive_failures: AtomicUsize,
    /// Consecutive success count.
    pub consecutive_successes: AtomicUsize,
}

impl UpstreamServer {
    /// Create a new server. Returns None if the address is not a usable
    /// authority (validation normally rejects these earlier).
    pub fn new(address: impl Into<String>, max_connections: usize) -> Option<Self> {
        let address = address.into();
        let base_url = Url::parse(&format!("http://{}", address)).ok()?;
        base_url.host_str()?;
        Some(Self {
            address,
            base_url,
            max_connections,
            active_connections: AtomicUsize::new(0),
            state: AtomicU8::new(HealthState::Unknown as u8),
            consecutive_failures: AtomicUsize::new(0),
            consecutive_successes: AtomicUsize::new(0),
        })
    }

    /// Get the current number of active connections.
    pub fn connection_count(&self) -> usize {
        self.active_connections.load(Ordering::Relaxed)
    }

    /// Try to create a connection guard that increments the count.
    /// Fails when the server is at its connection cap.
    pub fn try_create_guard(self: &Arc<Self>) -> Option<ConnectionGuard> {
        let mut prev = self.active_connections.load(Ordering::Relaxed);
        loop {
            if prev >= self.max_connections {
                return None;
            }
            match self.active_connections.compare_exchange_weak(
                prev,
                prev + 1,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(x) => prev = x,
            }
        }
        Some(ConnectionGuard {
            server: self.clone(),
        })
    }

    // --- Health Logic ---

    /// Return true if the server is usable (Healthy or Unknown).
    pub fn is_healthy(&self) -> bool {
        self.state.load(Ordering::Relaxed) != (HealthState::Unhealthy as u8)
    }

    /// Report a successful request/check.
    pub fn mark_success(&self, healthy_threshold: usize) {
        self.consecutive_failures.store(0, Ordering::Relaxed);

        if self.state.load(Ordering::Relaxed) == (HealthState::Healthy as u8) {
            return;
        }

        let successes = self.consecutive_successes.fetch_add(1, Ordering::Relaxed) + 1;
        if successes >= healthy_threshold {
            self.state.store(HealthState::Healthy as u8, Ordering::Relaxed);
            tracing::info!(address = %self.address, "Upstream server marked healthy");
        }
    }

    /// Report a failed request/check.
    pub fn mark_failure(&self, unhealthy_threshold: usize) {
        self.consecutive_successes.store(0, Ordering::Relaxed);

        if self.state.load(Ordering::Relaxed) == (HealthState::Unhealthy as u8) {
            return;
        }

        let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
        if failures >= unhealthy_threshold {
            self.state.store(HealthState::Unhealthy as u8, Ordering::Relaxed);
            tracing::warn!(address = %self.address, "Upstream server marked unhealthy");
        }
    }
}

/// RAII guard that releases the connection slot on drop.
#[derive(Debug)]
pub struct ConnectionGuard {
    pub server: Arc<UpstreamServer>,
}

impl Deref for ConnectionGuard {
    type Target = UpstreamServer;
    fn deref(&self) -> &Self::Target {
        &self.server
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.server
            .active_connections
            .fetch_sub(1, Ordering::Relaxed);
    }
}
