//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (bind, accept via axum::serve)
//!     → tls.rs (optional TLS termination)
//!     → Hand off to HTTP layer
//! ```

pub mod listener;
pub mod tls;

pub use listener::{bind, ListenerError};
