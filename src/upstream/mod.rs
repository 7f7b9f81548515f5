//! Upstream subsystem: named server pools in the nginx sense.
//!
//! # Data Flow
//! ```text
//! Route matched → upstream pool name
//!     → pool.rs (look up pool)
//!     → Balance strategy:
//!         - round_robin.rs (rotate through servers)
//!         - least_conn.rs (fewest active connections)
//!     → server.rs (connection guard, health state)
//!     → Forward or report no-healthy-server
//! ```
//!
//! # Design Decisions
//! - Strategies are stateless apart from a rotation counter; servers track
//!   their own connection counts
//! - Unhealthy servers are excluded from selection
//! - Connection caps are enforced with RAII guards

pub mod least_conn;
pub mod pool;
pub mod round_robin;
pub mod server;

use std::sync::Arc;

pub use pool::UpstreamManager;
pub use server::{ConnectionGuard, HealthState, UpstreamServer};

/// Strategy for picking a server out of a pool.
pub trait Balance: Send + Sync {
    /// Select the next server, or None if no healthy server is available.
    fn next_server(&self, servers: &[Arc<UpstreamServer>]) -> Option<Arc<UpstreamServer>>;
}
