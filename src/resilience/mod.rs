//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Forward attempt fails (connect error or 502/503/504)
//!     → retries.rs (is it retryable? is the budget intact?)
//!     → backoff.rs (jittered exponential delay)
//!     → next attempt against a freshly selected server
//! ```
//!
//! # Design Decisions
//! - Only idempotent methods with buffered bodies are retried
//! - The budget is global, not per-route

pub mod backoff;
pub mod retries;

pub use backoff::calculate_backoff;
pub use retries::{is_retryable, RetryBudget};
