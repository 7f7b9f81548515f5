//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → rate_limit.rs (per-IP token bucket, optional)
//!     → limits.rs (per-route body size, 413 on violation)
//!     → headers.rs (strip hop-by-hop, add X-Forwarded-*)
//!     → Pass to routing
//! ```
//!
//! # Design Decisions
//! - Fail closed: reject on any security check failure
//! - No trust in client input

pub mod headers;
pub mod limits;
pub mod rate_limit;
