//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (active.rs):
//!     Periodic timer
//!     → Probe each upstream server
//!     → mark_success / mark_failure on the server
//!
//! Passive health checks (in the proxy handler):
//!     Connect error or 502/503/504 observed
//!     → mark_failure
//!     Other responses → mark_success
//! ```
//!
//! # Design Decisions
//! - Active and passive checks are complementary and share the same
//!   threshold state machine (see upstream::server)
//! - 4xx responses are NOT failures (client error, not upstream)
//! - State transitions require consecutive successes/failures to
//!   prevent flapping

pub mod active;

pub use active::HealthMonitor;
