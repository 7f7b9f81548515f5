//! Upstream pool management.
//!
//! # Responsibilities
//! - Build named pools of servers from configuration
//! - Apply the configured balancing strategy to select servers
//! - Provide connection guards for tracking

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::UpstreamConfig;
use crate::config::schema::BalanceStrategy;
use crate::upstream::least_conn::LeastConnections;
use crate::upstream::round_robin::RoundRobin;
use crate::upstream::server::{ConnectionGuard, UpstreamServer};
use crate::upstream::Balance;

struct Pool {
    servers: Vec<Arc<UpstreamServer>>,
    balance: Box<dyn Balance>,
}

/// Manages the named upstream pools.
pub struct UpstreamManager {
    pools: HashMap<String, Pool>,
}

impl UpstreamManager {
    /// Create the manager from configuration. Invalid server addresses are
    /// skipped with a warning; validation normally catches them first.
    pub fn new(configs: Vec<UpstreamConfig>) -> Self {
        let mut pools = HashMap::new();

        for config in configs {
            let mut servers = Vec::new();
            for server in &config.servers {
                match UpstreamServer::new(server.address.clone(), server.max_connections) {
                    Some(s) => servers.push(Arc::new(s)),
                    None => {
                        tracing::warn!(
                            upstream = %config.name,
                            address = %server.address,
                            "Skipping invalid upstream server address"
                        );
                    }
                }
            }

            let balance: Box<dyn Balance> = match config.balance {
                BalanceStrategy::RoundRobin => Box::new(RoundRobin::new()),
                BalanceStrategy::LeastConnections => Box::new(LeastConnections::new()),
            };

            pools.insert(config.name, Pool { servers, balance });
        }

        Self { pools }
    }

    /// Select a server from the named pool.
    /// Returns a guard that decrements the connection count on drop.
    pub fn get(&self, pool_name: &str) -> Option<ConnectionGuard> {
        let pool = match self.pools.get(pool_name) {
            Some(p) => p,
            None => {
                tracing::debug!(pool = %pool_name, "Unknown upstream pool");
                return None;
            }
        };

        match pool.balance.next_server(&pool.servers) {
            Some(server) => server.try_create_guard(),
            None => {
                tracing::debug!(
                    pool = %pool_name,
                    server_count = pool.servers.len(),
                    "No healthy servers in pool"
                );
                None
            }
        }
    }

    /// All servers across all pools (for health checking).
    pub fn all_servers(&self) -> Vec<Arc<UpstreamServer>> {
        self.pools
            .values()
            .flat_map(|pool| pool.servers.iter())
            .cloned()
            .collect()
    }
}
