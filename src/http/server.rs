//! HTTP server setup and the proxy handler.
//!
//! # Responsibilities
//! - Create the Axum router with the catch-all proxy handler
//! - Wire up middleware (tracing, request ID, timeouts, body limits,
//!   concurrency cap, optional rate limiting)
//! - Dispatch requests through the routing table
//! - Forward requests to upstream servers (with retries for idempotent
//!   requests) or answer redirect routes directly
//! - Passive health marking from observed outcomes
//! - Apply configuration updates by swapping the compiled routing state

use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use axum::{
    body::{Body, Bytes},
    extract::{ConnectInfo, DefaultBodyLimit, State},
    http::uri::{Authority, PathAndQuery, Scheme},
    http::{header, Request, Response, StatusCode, Uri},
    response::IntoResponse,
    routing::any,
    Router,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::schema::{HealthCheckConfig, RetryConfig, SecurityConfig};
use crate::config::ProxyConfig;
use crate::health::HealthMonitor;
use crate::http::request::{RequestIdLayer, X_REQUEST_ID};
use crate::http::response;
use crate::net::tls::load_tls_config;
use crate::observability::metrics;
use crate::resilience::{calculate_backoff, is_retryable, RetryBudget};
use crate::routing::{forward_path_and_query, RouteAction, Router as RouteTable};
use crate::security::headers::{append_forwarding_headers, strip_hop_by_hop};
use crate::security::limits::content_length_exceeds;
use crate::security::rate_limit::{rate_limit_middleware, RateLimiterState};
use crate::upstream::UpstreamManager;

/// Bodies up to this size are buffered so idempotent requests can be
/// retried; larger bodies are streamed in a single attempt.
const RETRY_BUFFER_LIMIT: usize = 1024 * 1024;

/// The routing state that is swapped atomically on config reload.
pub struct RoutingState {
    pub table: RouteTable,
    pub upstreams: Arc<UpstreamManager>,
}

impl RoutingState {
    pub fn from_config(config: &ProxyConfig) -> Self {
        Self {
            table: RouteTable::from_config(config.routes.clone()),
            upstreams: Arc::new(UpstreamManager::new(config.upstreams.clone())),
        }
    }
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub routing: Arc<ArcSwap<RoutingState>>,
    pub client: Client<HttpConnector, Body>,
    pub health_config: HealthCheckConfig,
    pub retry_config: RetryConfig,
    pub retry_budget: Arc<RetryBudget>,
    pub security_config: SecurityConfig,
    /// Whether the listener terminates TLS (for X-Forwarded-Proto).
    pub tls_enabled: bool,
}

/// HTTP server for the reverse proxy.
pub struct HttpServer {
    app: Router,
    config: ProxyConfig,
    routing: Arc<ArcSwap<RoutingState>>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ProxyConfig) -> Self {
        let routing = Arc::new(ArcSwap::from_pointee(RoutingState::from_config(&config)));

        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        let retry_budget = Arc::new(RetryBudget::new(config.retries.budget_ratio, 100));

        let state = AppState {
            routing: routing.clone(),
            client,
            health_config: config.health_check.clone(),
            retry_config: config.retries.clone(),
            retry_budget,
            security_config: config.security.clone(),
            tls_enabled: config.listener.tls.is_some(),
        };

        let app = Self::build_router(&config, state);
        Self {
            app,
            config,
            routing,
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        let mut router = Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state);

        if config.rate_limit.enabled {
            let limiter = Arc::new(RateLimiterState::new(&config.rate_limit));
            router = router.layer(axum::middleware::from_fn_with_state(
                limiter,
                rate_limit_middleware,
            ));
        }

        router
            // Streamed bodies are bounded by the global limit layer; the
            // per-route caps reject oversized declared lengths earlier.
            .layer(DefaultBodyLimit::disable())
            .layer(RequestBodyLimitLayer::new(config.security.max_body_size))
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.timeouts.request_secs,
            )))
            .layer(GlobalConcurrencyLimitLayer::new(
                config.listener.max_connections,
            ))
            .layer(RequestIdLayer)
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server until shutdown.
    ///
    /// Configuration updates arriving on `config_updates` swap the routing
    /// state atomically; listener and middleware changes need a restart.
    pub async fn run(
        self,
        listener: TcpListener,
        config_updates: mpsc::UnboundedReceiver<ProxyConfig>,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        // Active health monitoring, restarted on reload so it probes the
        // current server set.
        let monitor_stop = spawn_monitor(
            self.routing.load().upstreams.clone(),
            self.config.health_check.clone(),
        );

        // Reload task: swap routing state, restart the monitor.
        let routing = self.routing.clone();
        let initial_health = self.config.health_check.clone();
        let reload_shutdown = shutdown.resubscribe();
        tokio::spawn(async move {
            apply_config_updates(
                routing,
                config_updates,
                monitor_stop,
                initial_health,
                reload_shutdown,
            )
            .await;
        });

        let app = self
            .app
            .into_make_service_with_connect_info::<SocketAddr>();

        if let Some(tls) = &self.config.listener.tls {
            let tls_config = load_tls_config(
                std::path::Path::new(&tls.cert_path),
                std::path::Path::new(&tls.key_path),
            )
            .await?;

            let handle = axum_server::Handle::new();
            let drain_handle = handle.clone();
            let mut tls_shutdown = shutdown.resubscribe();
            tokio::spawn(async move {
                let _ = tls_shutdown.recv().await;
                drain_handle.graceful_shutdown(Some(Duration::from_secs(30)));
            });

            axum_server::from_tcp_rustls(listener.into_std()?, tls_config)
                .handle(handle)
                .serve(app)
                .await?;
        } else {
            let mut plain_shutdown = shutdown;
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = plain_shutdown.recv().await;
                    tracing::info!("Shutdown signal received, draining connections");
                })
                .await?;
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }
}

fn spawn_monitor(
    upstreams: Arc<UpstreamManager>,
    config: HealthCheckConfig,
) -> broadcast::Sender<()> {
    let (stop_tx, stop_rx) = broadcast::channel(1);
    let monitor = HealthMonitor::new(upstreams, config);
    tokio::spawn(async move {
        monitor.run(stop_rx).await;
    });
    stop_tx
}

async fn apply_config_updates(
    routing: Arc<ArcSwap<RoutingState>>,
    mut config_updates: mpsc::UnboundedReceiver<ProxyConfig>,
    mut monitor_stop: broadcast::Sender<()>,
    mut health_config: HealthCheckConfig,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            update = config_updates.recv() => {
                let Some(new_config) = update else { break };

                let new_state = Arc::new(RoutingState::from_config(&new_config));
                let upstreams = new_state.upstreams.clone();
                routing.store(new_state);
                health_config = new_config.health_check.clone();

                let _ = monitor_stop.send(());
                monitor_stop = spawn_monitor(upstreams, health_config.clone());

                tracing::info!(
                    routes = routing.load().table.len(),
                    "Configuration applied; listener and middleware changes require restart"
                );
            }
            _ = shutdown.recv() => break,
        }
    }
}

/// How the request body travels to the upstream.
enum ForwardBody {
    /// Small idempotent bodies, cloneable across retry attempts.
    Buffered(Bytes),
    /// Everything else: forwarded as-is, single attempt.
    Stream(Option<Body>),
}

/// Main proxy handler.
/// Looks up the route, answers redirects, or selects an upstream server
/// and forwards.
async fn proxy_handler(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> impl IntoResponse {
    let start_time = Instant::now();
    let request_id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    let path = request.uri().path().to_string();
    let method = request.method().clone();
    let method_str = method.to_string();

    tracing::debug!(
        request_id = %request_id,
        method = %method,
        path = %path,
        "Proxying request"
    );

    // The routing state is pinned for the duration of this request;
    // reloads affect the next request.
    let routing = state.routing.load_full();

    // 1. Match route
    let route = match routing.table.match_request(&request) {
        Some(r) => r,
        None => {
            tracing::warn!(request_id = %request_id, path = %path, "No route matched");
            metrics::record_request(&method_str, 404, "none", start_time);
            return (StatusCode::NOT_FOUND, "No matching route found").into_response();
        }
    };

    // 2. Redirect routes are answered directly.
    let (pool, strip_prefix, max_body_bytes) = match &route.action {
        RouteAction::Redirect { status, location } => {
            tracing::debug!(
                request_id = %request_id,
                route = %route.name,
                location = %location,
                "Redirecting"
            );
            metrics::record_request(&method_str, status.as_u16(), &route.name, start_time);
            return response::redirect(*status, location).into_response();
        }
        RouteAction::Forward {
            upstream,
            strip_prefix,
            max_body_bytes,
        } => (upstream.clone(), strip_prefix.clone(), *max_body_bytes),
    };

    // 3. Per-route body cap (e.g. 1000 MB on the API route).
    let route_limit = max_body_bytes.unwrap_or(state.security_config.max_body_size);
    if content_length_exceeds(request.headers(), route_limit) {
        tracing::warn!(
            request_id = %request_id,
            route = %route.name,
            limit = route_limit,
            "Declared request body exceeds route limit"
        );
        metrics::record_request(&method_str, 413, &route.name, start_time);
        return (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response();
    }

    let (parts, body) = request.into_parts();

    // 4. Buffer small idempotent bodies so they can be retried.
    let declared_length = parts
        .headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(0);
    let mut forward_body = if state.retry_config.enabled
        && method.is_idempotent()
        && declared_length <= RETRY_BUFFER_LIMIT
    {
        match axum::body::to_bytes(body, RETRY_BUFFER_LIMIT).await {
            Ok(bytes) => ForwardBody::Buffered(bytes),
            Err(_) => {
                metrics::record_request(&method_str, 400, &route.name, start_time);
                return (StatusCode::BAD_REQUEST, "Unreadable request body").into_response();
            }
        }
    } else {
        ForwardBody::Stream(Some(body))
    };

    state.retry_budget.record_request();

    let max_attempts = match forward_body {
        ForwardBody::Buffered(_) => state.retry_config.max_attempts.max(1),
        ForwardBody::Stream(_) => 1,
    };

    let forwarded_path = forward_path_and_query(&parts.uri, strip_prefix.as_deref());

    // 5. Attempt loop
    let mut attempts = 0;
    loop {
        attempts += 1;

        // Select upstream server
        let guard = match routing.upstreams.get(&pool) {
            Some(g) => g,
            None => {
                tracing::warn!(request_id = %request_id, pool = %pool, "No healthy upstream servers");
                metrics::record_request(&method_str, 503, &route.name, start_time);
                return (StatusCode::SERVICE_UNAVAILABLE, "No healthy upstream servers")
                    .into_response();
            }
        };

        // Construct the upstream request for this attempt
        let uri = {
            let mut uri_parts = axum::http::uri::Parts::default();
            uri_parts.scheme = Some(Scheme::HTTP);
            uri_parts.authority = Authority::from_str(&guard.address).ok();
            uri_parts.path_and_query = PathAndQuery::from_str(&forwarded_path).ok();
            match Uri::from_parts(uri_parts) {
                Ok(uri) => uri,
                Err(e) => {
                    tracing::error!(request_id = %request_id, error = %e, "Failed to build upstream URI");
                    metrics::record_request(&method_str, 500, &route.name, start_time);
                    return StatusCode::INTERNAL_SERVER_ERROR.into_response();
                }
            }
        };

        let mut builder = Request::builder().method(method.clone()).uri(uri);
        if let Some(headers) = builder.headers_mut() {
            for (k, v) in parts.headers.iter() {
                headers.insert(k.clone(), v.clone());
            }
            strip_hop_by_hop(headers);
            // Let the client set Host from the upstream authority, the way
            // proxy_pass rewrites it.
            headers.remove(header::HOST);
            if state.security_config.forwarding_headers {
                append_forwarding_headers(headers, addr.ip(), state.tls_enabled);
            }
            if let Ok(value) = header::HeaderValue::from_str(&request_id) {
                headers.insert(X_REQUEST_ID, value);
            }
        }

        let attempt_body = match &mut forward_body {
            ForwardBody::Buffered(bytes) => Body::from(bytes.clone()),
            ForwardBody::Stream(body) => match body.take() {
                Some(body) => body,
                None => {
                    // Single-attempt invariant: a streamed body is never
                    // reused.
                    metrics::record_request(&method_str, 502, &route.name, start_time);
                    return (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response();
                }
            },
        };

        let req = match builder.body(attempt_body) {
            Ok(req) => req,
            Err(e) => {
                tracing::error!(request_id = %request_id, error = %e, "Failed to build upstream request");
                metrics::record_request(&method_str, 500, &route.name, start_time);
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        };

        // Forward
        match state.client.request(req).await {
            Ok(upstream_response) => {
                let status = upstream_response.status();

                // Passive health marking: only gateway-style failures count.
                // Every attempt's outcome is recorded, including ones that
                // are about to be retried.
                match status {
                    StatusCode::BAD_GATEWAY
                    | StatusCode::SERVICE_UNAVAILABLE
                    | StatusCode::GATEWAY_TIMEOUT => {
                        guard.mark_failure(state.health_config.unhealthy_threshold as usize);
                    }
                    _ => {
                        guard.mark_success(state.health_config.healthy_threshold as usize);
                    }
                }

                if attempts < max_attempts
                    && is_retryable(&method, Some(status), false)
                    && state.retry_budget.can_retry()
                {
                    let backoff = calculate_backoff(
                        attempts,
                        state.retry_config.base_delay_ms,
                        state.retry_config.max_delay_ms,
                    );
                    tracing::info!(
                        request_id = %request_id,
                        attempt = attempts,
                        delay = ?backoff,
                        status = %status,
                        "Retrying request"
                    );
                    tokio::time::sleep(backoff).await;
                    continue;
                }

                metrics::record_request(&method_str, status.as_u16(), &route.name, start_time);

                let (response_parts, response_body) = upstream_response.into_parts();
                let response = Response::from_parts(response_parts, Body::new(response_body));
                return response::sanitize(response).into_response();
            }
            Err(e) => {
                tracing::error!(
                    request_id = %request_id,
                    attempt = attempts,
                    error = %e,
                    "Upstream error"
                );
                guard.mark_failure(state.health_config.unhealthy_threshold as usize);

                if attempts < max_attempts
                    && is_retryable(&method, None, true)
                    && state.retry_budget.can_retry()
                {
                    let backoff = calculate_backoff(
                        attempts,
                        state.retry_config.base_delay_ms,
                        state.retry_config.max_delay_ms,
                    );
                    tracing::info!(
                        request_id = %request_id,
                        attempt = attempts,
                        delay = ?backoff,
                        "Retrying after network error"
                    );
                    tokio::time::sleep(backoff).await;
                    continue;
                }

                metrics::record_request(&method_str, 502, &route.name, start_time);
                return (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response();
            }
        }
    }
}
