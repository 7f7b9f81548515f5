//! Header hygiene for forwarded requests and responses.
//!
//! # Responsibilities
//! - Strip hop-by-hop headers in both directions
//! - Append X-Forwarded-For / X-Forwarded-Proto on forwarded requests
//!
//! # Design Decisions
//! - Existing X-Forwarded-For entries are appended to, not replaced, so
//!   chains of proxies stay visible
//! - Hop-by-hop headers listed in RFC 7230 §6.1 are never forwarded

use std::net::IpAddr;

use axum::http::header::{HeaderMap, HeaderName, HeaderValue};

const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailers",
    "transfer-encoding",
    "upgrade",
];

/// True if a header must not cross the proxy boundary.
pub fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(&name.as_str())
}

/// Remove hop-by-hop headers in place.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let doomed: Vec<HeaderName> = headers
        .keys()
        .filter(|name| is_hop_by_hop(name))
        .cloned()
        .collect();
    for name in doomed {
        headers.remove(name);
    }
}

/// Add the standard forwarding headers for an upstream request.
pub fn append_forwarding_headers(headers: &mut HeaderMap, client_ip: IpAddr, tls: bool) {
    let client = client_ip.to_string();
    let forwarded_for = match headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        Some(existing) => format!("{}, {}", existing, client),
        None => client,
    };
    if let Ok(value) = HeaderValue::from_str(&forwarded_for) {
        headers.insert("x-forwarded-for", value);
    }

    let proto = if tls { "https" } else { "http" };
    headers.insert("x-forwarded-proto", HeaderValue::from_static(proto));
}
