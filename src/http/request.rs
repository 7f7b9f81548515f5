//! Request identification and preparation.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4) as early as possible
//! - Preserve an incoming x-request-id if the client already set one
//! - Make the ID available to handlers via a request extension
//!
//! # Design Decisions
//! - The ID is propagated to the upstream so gateway logs correlate with
//!   proxy logs

use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::header::HeaderValue;
use axum::http::Request;
use tower::{Layer, Service};
use uuid::Uuid;

/// Header carrying the correlation ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// The request's correlation ID, stored as a request extension.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Convenience accessor for the correlation ID.
pub trait RequestIdExt {
    fn request_id(&self) -> Option<&str>;
}

impl RequestIdExt for Request<Body> {
    fn request_id(&self) -> Option<&str> {
        self.extensions().get::<RequestId>().map(|id| id.0.as_str())
    }
}

/// Layer that assigns request IDs.
#[derive(Debug, Clone, Default)]
pub struct RequestIdLayer;

impl<S> Layer<S> for RequestIdLayer {
    type Service = RequestIdService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestIdService { inner }
    }
}

/// Service that stamps each request with an ID.
#[derive(Debug, Clone)]
pub struct RequestIdService<S> {
    inner: S,
}

impl<S> Service<Request<Body>> for RequestIdService<S>
where
    S: Service<Request<Body>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let id = req
            .headers()
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        if let Ok(value) = HeaderValue::from_str(&id) {
            req.headers_mut().insert(X_REQUEST_ID, value);
        }
        req.extensions_mut().insert(RequestId(id));

        self.inner.call(req)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone)]
    struct Probe;

    impl Service<Request<Body>> for Probe {
        type Response = Request<Body>;
        type Error = std::convert::Infallible;
        type Future =
            std::future::Ready<Result<Self::Response, Self::Error>>;

        fn poll_ready(&mut self, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, req: Request<Body>) -> Self::Future {
            std::future::ready(Ok(req))
        }
    }

    #[tokio::test]
    async fn test_assigns_id_when_missing() {
        let mut service = RequestIdLayer.layer(Probe);
        let req = Request::builder().body(Body::default()).unwrap();

        let seen = service.call(req).await.unwrap();
        let header = seen.headers().get(X_REQUEST_ID).unwrap();
        assert_eq!(seen.request_id().unwrap(), header.to_str().unwrap());
        // Round-trips as a UUID.
        assert!(Uuid::parse_str(seen.request_id().unwrap()).is_ok());
    }

    #[tokio::test]
    async fn test_preserves_client_id() {
        let mut service = RequestIdLayer.layer(Probe);
        let req = Request::builder()
            .header(X_REQUEST_ID, "client-chosen")
            .body(Body::default())
            .unwrap();

        let seen = service.call(req).await.unwrap();
        assert_eq!(seen.request_id(), Some("client-chosen"));
    }
}
