//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Request arrives
//!     → matcher.rs (host / exact path / path prefix conditions)
//!     → router.rs (priority-ordered table, first match wins)
//!     → RouteAction:
//!         Redirect  → answered by the server directly
//!         Forward   → upstream pool selection + path rewrite
//! ```
//!
//! # Design Decisions
//! - Matching is pure; the table holds no connection state
//! - Exact-path routes outrank prefix routes via priority, which is how
//!   `/api/v1` redirects while `/api/v1/...` forwards
//! - Prefix stripping mirrors `proxy_pass` with a URI part: the matched
//!   location prefix is removed before forwarding

pub mod matcher;
pub mod router;

pub use router::{forward_path_and_query, Route, RouteAction, Router};
