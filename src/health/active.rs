//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe every upstream server
//! - Update server health state based on results

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::sync::broadcast;
use tokio::time;

use crate::config::schema::HealthCheckConfig;
use crate::observability::metrics;
use crate::upstream::UpstreamManager;

pub struct HealthMonitor {
    upstreams: Arc<UpstreamManager>,
    config: HealthCheckConfig,
    client: Client<HttpConnector, Body>,
}

impl HealthMonitor {
    pub fn new(upstreams: Arc<UpstreamManager>, config: HealthCheckConfig) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        Self {
            upstreams,
            config,
            client,
        }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if !self.config.enabled {
            tracing::info!("Active health checks disabled");
            return;
        }

        tracing::info!(
            interval = self.config.interval_secs,
            path = %self.config.path,
            "Health monitor starting"
        );

        let interval = Duration::from_secs(self.config.interval_secs);
        let mut ticker = time::interval(interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check_all().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    async fn check_all(&self) {
        for server in self.upstreams.all_servers() {
            let uri_string = format!("http://{}{}", server.address, self.config.path);

            let request = match Request::builder()
                .method("GET")
                .uri(uri_string)
                .header("user-agent", "artifact-proxy-health-check")
                .body(Body::empty())
            {
                Ok(req) => req,
                Err(e) => {
                    tracing::error!("Failed to build health check request: {}", e);
                    continue;
                }
            };

            let timeout = Duration::from_secs(self.config.timeout_secs);
            let response_future = self.client.request(request);

            let healthy = match time::timeout(timeout, response_future).await {
                Ok(Ok(response)) => {
                    let success = response.status().is_success();
                    if !success {
                        tracing::warn!(
                            address = %server.address,
                            status = %response.status(),
                            "Health check failed: non-success status"
                        );
                    }
                    success
                }
                Ok(Err(e)) => {
                    tracing::warn!(
                        address = %server.address,
                        error = %e,
                        "Health check failed: connection error"
                    );
                    false
                }
                Err(_) => {
                    tracing::warn!(address = %server.address, "Health check failed: timeout");
                    false
                }
            };

            if healthy {
                server.mark_success(self.config.healthy_threshold as usize);
            } else {
                server.mark_failure(self.config.unhealthy_threshold as usize);
            }

            metrics::record_upstream_health(&server.address, server.is_healthy());
        }
    }
}
