//! Shared utilities for integration testing.

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use artifact_proxy::{HttpServer, ProxyConfig, Shutdown};

/// A config wired to test upstreams: health checks off, gateway and edge
/// pools pointed at the given mock addresses.
#[allow(dead_code)]
pub fn test_config(proxy: SocketAddr, gateway: SocketAddr, edge: SocketAddr) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.listener.bind_address = proxy.to_string();
    config.health_check.enabled = false;

    for upstream in &mut config.upstreams {
        let address = match upstream.name.as_str() {
            "gateway" => gateway.to_string(),
            _ => edge.to_string(),
        };
        for server in &mut upstream.servers {
            server.address = address.clone();
        }
    }
    config
}

/// Start the proxy on `addr`, returning the shutdown coordinator and the
/// config update channel.
#[allow(dead_code)]
pub async fn start_proxy(
    config: ProxyConfig,
    addr: SocketAddr,
) -> (Shutdown, mpsc::UnboundedSender<ProxyConfig>) {
    let shutdown = Shutdown::new();
    let (update_tx, update_rx) = mpsc::unbounded_channel();

    let server = HttpServer::new(config);
    let listener = TcpListener::bind(addr).await.unwrap();
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, update_rx, server_shutdown).await;
    });

    tokio::time::sleep(Duration::from_millis(500)).await;
    (shutdown, update_tx)
}

/// A client that never follows redirects and never reuses connections,
/// so each request exercises the full proxy path.
#[allow(dead_code)]
pub fn test_client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// Start a simple mock upstream that returns a fixed response.
#[allow(dead_code)]
pub async fn start_mock_upstream(addr: SocketAddr, response: &'static str) {
    let listener = TcpListener::bind(addr).await.unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    tokio::spawn(async move {
                        let mut buf = [0u8; 8192];
                        let _ = socket.read(&mut buf).await;
                        let response_str = format!(
                            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            response.len(),
                            response
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    });
                }
                Err(_) => break,
            }
        }
    });
}

/// Start a mock upstream that echoes back a tag and the request target,
/// so tests can assert what path the proxy actually forwarded.
#[allow(dead_code)]
pub async fn start_echo_upstream(addr: SocketAddr, tag: &'static str) {
    let listener = TcpListener::bind(addr).await.unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    tokio::spawn(async move {
                        let mut buf = vec![0u8; 8192];
                        let n = socket.read(&mut buf).await.unwrap_or(0);
                        let raw = String::from_utf8_lossy(&buf[..n]);
                        // "METHOD /path?query HTTP/1.1"
                        let target = raw
                            .lines()
                            .next()
                            .and_then(|line| line.split_whitespace().nth(1))
                            .unwrap_or("?");

                        let body = format!("{} {}", tag, target);
                        let response_str = format!(
                            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    });
                }
                Err(_) => break,
            }
        }
    });
}

/// Start a programmable mock upstream with async support.
#[allow(dead_code)]
pub async fn start_programmable_upstream<F, Fut>(addr: SocketAddr, f: F)
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind(addr).await.unwrap();
    let f = std::sync::Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let mut buf = [0u8; 8192];
                        let _ = socket.read(&mut buf).await;
                        let (status, body) = f().await;
                        let status_text = match status {
                            200 => "200 OK",
                            404 => "404 Not Found",
                            429 => "429 Too Many Requests",
                            500 => "500 Internal Server Error",
                            502 => "502 Bad Gateway",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };

                        let response_str = format!(
                            "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    });
                }
                Err(_) => break,
            }
        }
    });
}
