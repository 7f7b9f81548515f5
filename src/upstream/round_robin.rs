//! Round-robin balancing strategy.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::upstream::server::UpstreamServer;
use crate::upstream::Balance;

/// Round-robin selector.
/// Stores an internal counter to rotate through servers, skipping
/// unhealthy ones.
#[derive(Debug, Default)]
pub struct RoundRobin {
    counter: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Balance for RoundRobin {
    fn next_server(&self, servers: &[Arc<UpstreamServer>]) -> Option<Arc<UpstreamServer>> {
        if servers.is_empty() {
            return None;
        }

        let start = self.counter.fetch_add(1, Ordering::Relaxed);
        let len = servers.len();

        // Bounded scan so a pool of all-unhealthy servers yields None
        // instead of spinning.
        for i in 0..len {
            let server = &servers[(start + i) % len];
            if server.is_healthy() {
                return Some(server.clone());
            }
        }
        None
    }
}
