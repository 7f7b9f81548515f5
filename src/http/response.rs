//! Response construction and transformation.
//!
//! # Responsibilities
//! - Build redirect responses for redirect routes
//! - Strip hop-by-hop headers from upstream responses
//!
//! # Design Decisions
//! - Response bodies are streamed, never buffered
//! - The upstream's status and remaining headers pass through unchanged

use axum::body::Body;
use axum::http::header::{HeaderValue, LOCATION};
use axum::http::{Response, StatusCode};

use crate::security::headers::strip_hop_by_hop;

/// Build a redirect response for a redirect route.
pub fn redirect(status: StatusCode, location: &str) -> Response<Body> {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = status;
    match HeaderValue::from_str(location) {
        Ok(value) => {
            response.headers_mut().insert(LOCATION, value);
        }
        Err(_) => {
            // A location that is not a legal header value is a config bug.
            *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        }
    }
    response
}

/// Prepare an upstream response for the client.
pub fn sanitize<B>(mut response: Response<B>) -> Response<B> {
    strip_hop_by_hop(response.headers_mut());
    response
}
