//! Request size limits.
//!
//! # Responsibilities
//! - Enforce the per-route maximum request body size
//!
//! # Design Decisions
//! - Declared Content-Length is checked before any forwarding, so a
//!   1000 MB cap never buffers 1000 MB to find out
//! - Requests without Content-Length are additionally bounded by the
//!   global tower-http body limit layer
//! - Violations return 413 Payload Too Large

use axum::http::header::{HeaderMap, CONTENT_LENGTH};

/// True if the declared Content-Length exceeds `limit` bytes.
///
/// A missing or malformed Content-Length is not a violation here; the
/// streaming limit layer still applies.
pub fn content_length_exceeds(headers: &HeaderMap, limit: usize) -> bool {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .map(|len| len > limit as u64)
        .unwrap_or(false)
}
