//! Least-connections balancing strategy.

use std::sync::Arc;

use crate::upstream::server::UpstreamServer;
use crate::upstream::Balance;

/// Picks the healthy server with the fewest active connections.
///
/// Ties resolve to the earliest server in the pool, which is stable and
/// cheap; the connection counts diverge immediately under load anyway.
#[derive(Debug, Default)]
pub struct LeastConnections;

impl LeastConnections {
    pub fn new() -> Self {
        Self
    }
}

impl Balance for LeastConnections {
    fn next_server(&self, servers: &[Arc<UpstreamServer>]) -> Option<Arc<UpstreamServer>> {
        servers
            .iter()
            .filter(|s| s.is_healthy())
            .min_by_key(|s| s.connection_count())
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefers_idle_server() {
        let lb = LeastConnections::new();
        let s1 = Arc::new(UpstreamServer::new("127.0.0.1:8000", 100).unwrap());
        let s2 = Arc::new(UpstreamServer::new("127.0.0.1:8001", 100).unwrap());

        let _busy = s1.try_create_guard().unwrap();
        let servers = vec![s1, s2.clone()];

        assert_eq!(lb.next_server(&servers).unwrap().address, s2.address);
    }

    #[test]
    fn test_skips_unhealthy() {
        let lb = LeastConnections::new();
        let s1 = Arc::new(UpstreamServer::new("127.0.0.1:8000", 100).unwrap());
        let s2 = Arc::new(UpstreamServer::new("127.0.0.1:8001", 100).unwrap());
        s1.mark_failure(1);

        let _busy = s2.try_create_guard().unwrap();
        let servers = vec![s1, s2.clone()];

        // s2 is busier but s1 is down.
        assert_eq!(lb.next_server(&servers).unwrap().address, s2.address);
    }
}
