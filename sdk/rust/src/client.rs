//! Thin client for the gateway image API.
//!
//! Each method performs exactly one underlying HTTP operation. Failures are
//! logged once (the error's Display form) and then returned to the caller
//! unchanged, so callers see the original `reqwest::Error`.

use bytes::Bytes;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Identifier of a stored object: the bucket it lives in plus its name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRef {
    pub bucket: String,
    pub name: String,
}

/// An image query, forwarded to the gateway verbatim.
///
/// The gateway owns the query schema; the SDK treats it as opaque JSON so
/// new server-side filters need no client release.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageQuery(pub serde_json::Value);

impl Default for ImageQuery {
    /// The empty query, matching every image.
    fn default() -> Self {
        Self(serde_json::json!({}))
    }
}

/// One page of query results.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct QueryResponse {
    /// The IDs of all images found by the query.
    pub image_ids: Vec<ObjectRef>,

    /// The page number this response is for.
    pub page_num: u32,

    /// True if this is the final page. The last page may be empty.
    pub is_last_page: bool,
}

/// Client for the gateway image API.
pub struct ArtifactClient {
    client: Client,
    base_url: String,
}

impl ArtifactClient {
    /// Create a client targeting the proxy's public address, e.g.
    /// `http://localhost:8081`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    /// Create a client with a caller-supplied `reqwest::Client` (custom
    /// timeouts, pools, proxies).
    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { client, base_url }
    }

    /// Query for images matching `query`, returning one page of IDs.
    pub async fn query_images(
        &self,
        query: &ImageQuery,
        page_num: u32,
        results_per_page: u32,
    ) -> Result<QueryResponse, reqwest::Error> {
        self.try_query_images(query, page_num, results_per_page)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Image query failed");
                e
            })
    }

    async fn try_query_images(
        &self,
        query: &ImageQuery,
        page_num: u32,
        results_per_page: u32,
    ) -> Result<QueryResponse, reqwest::Error> {
        self.client
            .post(format!("{}/api/v1/images/query", self.base_url))
            .query(&[
                ("page_num", page_num),
                ("results_per_page", results_per_page),
            ])
            .json(query)
            .send()
            .await?
            .error_for_status()?
            .json::<QueryResponse>()
            .await
    }

    /// Load the thumbnail for the image at `(bucket, name)`.
    /// Returns the raw image bytes unchanged.
    pub async fn load_thumbnail(
        &self,
        bucket: &str,
        name: &str,
    ) -> Result<Bytes, reqwest::Error> {
        self.try_load_thumbnail(bucket, name).await.map_err(|e| {
            tracing::error!(error = %e, "Thumbnail load failed");
            e
        })
    }

    async fn try_load_thumbnail(
        &self,
        bucket: &str,
        name: &str,
    ) -> Result<Bytes, reqwest::Error> {
        self.client
            .get(format!(
                "{}/api/v1/images/thumbnail/{}/{}",
                self.base_url, bucket, name
            ))
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::net::SocketAddr;
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;
    use tracing::instrument::WithSubscriber;

    /// Writer that collects formatted log output into a shared buffer.
    #[derive(Clone, Default)]
    struct LogCapture(Arc<Mutex<Vec<u8>>>);

    impl LogCapture {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).to_string()
        }

        fn subscriber(&self) -> impl tracing::Subscriber + Send + Sync + 'static {
            tracing_subscriber::fmt()
                .with_writer(self.clone())
                .with_ansi(false)
                .finish()
        }
    }

    impl io::Write for LogCapture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for LogCapture {
        type Writer = LogCapture;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    /// Serve exactly one canned HTTP response, capturing the raw request.
    async fn mock_once(
        status_line: &'static str,
        content_type: &'static str,
        body: &'static [u8],
    ) -> (SocketAddr, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();

            let mut raw = Vec::new();
            let mut chunk = [0u8; 4096];
            loop {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                raw.extend_from_slice(&chunk[..n]);
                if let Some(header_end) = find_header_end(&raw) {
                    let headers = String::from_utf8_lossy(&raw[..header_end]).to_lowercase();
                    let body_len = headers
                        .lines()
                        .find_map(|l| l.strip_prefix("content-length:"))
                        .and_then(|v| v.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    if raw.len() >= header_end + 4 + body_len {
                        break;
                    }
                }
            }

            let response = [
                format!(
                    "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    status_line,
                    content_type,
                    body.len()
                )
                .into_bytes(),
                body.to_vec(),
            ]
            .concat();
            let _ = socket.write_all(&response).await;
            let _ = socket.shutdown().await;

            let _ = tx.send(String::from_utf8_lossy(&raw).to_string());
        });

        (addr, rx)
    }

    fn find_header_end(raw: &[u8]) -> Option<usize> {
        raw.windows(4).position(|w| w == b"\r\n\r\n")
    }

    #[tokio::test]
    async fn test_query_forwards_arguments_and_maps_fields() {
        let (addr, captured) = mock_once(
            "200 OK",
            "application/json",
            br#"{"image_ids":[{"bucket":"uav","name":"a"},{"bucket":"uav","name":"b"}],"page_num":3,"is_last_page":true}"#,
        )
        .await;

        let client = ArtifactClient::new(format!("http://{}", addr));
        let query = ImageQuery(serde_json::json!({"platform_type": "ground"}));
        let page = client.query_images(&query, 3, 50).await.unwrap();

        assert_eq!(
            page,
            QueryResponse {
                image_ids: vec![
                    ObjectRef {
                        bucket: "uav".to_string(),
                        name: "a".to_string()
                    },
                    ObjectRef {
                        bucket: "uav".to_string(),
                        name: "b".to_string()
                    },
                ],
                page_num: 3,
                is_last_page: true,
            }
        );

        let raw = captured.await.unwrap();
        assert!(raw.starts_with("POST /api/v1/images/query?"));
        assert!(raw.contains("page_num=3"));
        assert!(raw.contains("results_per_page=50"));
        // Query body forwarded unchanged.
        assert!(raw.contains(r#"{"platform_type":"ground"}"#));
    }

    #[tokio::test]
    async fn test_empty_query_round_trip() {
        let (addr, captured) = mock_once(
            "200 OK",
            "application/json",
            br#"{"image_ids":[],"page_num":1,"is_last_page":false}"#,
        )
        .await;

        let client = ArtifactClient::new(format!("http://{}", addr));
        let page = client
            .query_images(&ImageQuery::default(), 1, 50)
            .await
            .unwrap();

        assert!(page.image_ids.is_empty());
        assert_eq!(page.page_num, 1);
        assert!(!page.is_last_page);

        let raw = captured.await.unwrap();
        assert!(raw.contains("{}"));
    }

    #[tokio::test]
    async fn test_thumbnail_bytes_pass_through() {
        let (addr, captured) =
            mock_once("200 OK", "image/jpeg", b"\xff\xd8fake-jpeg-bytes").await;

        let client = ArtifactClient::new(format!("http://{}", addr));
        let data = client.load_thumbnail("photos", "img0001.jpg").await.unwrap();

        assert_eq!(&data[..], b"\xff\xd8fake-jpeg-bytes");

        let raw = captured.await.unwrap();
        assert!(raw.starts_with("GET /api/v1/images/thumbnail/photos/img0001.jpg"));
    }

    #[tokio::test]
    async fn test_query_error_propagates() {
        // Bind then drop, so the port refuses connections.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = ArtifactClient::new(format!("http://{}", addr));
        let err = client
            .query_images(&ImageQuery::default(), 1, 50)
            .await
            .unwrap_err();
        assert!(err.is_connect() || err.is_request());
    }

    #[tokio::test]
    async fn test_thumbnail_error_status_propagates() {
        let (addr, _captured) = mock_once(
            "404 Not Found",
            "application/json",
            br#"{"detail":"Requested image thumbnail could not be found."}"#,
        )
        .await;

        let client = ArtifactClient::new(format!("http://{}", addr));
        let err = client.load_thumbnail("photos", "missing").await.unwrap_err();
        assert_eq!(err.status().map(|s| s.as_u16()), Some(404));
    }

    #[tokio::test]
    async fn test_query_failure_logged_exactly_once() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let capture = LogCapture::default();
        let client = ArtifactClient::new(format!("http://{}", addr));
        let err = client
            .query_images(&ImageQuery::default(), 1, 50)
            .with_subscriber(capture.subscriber())
            .await
            .unwrap_err();
        assert!(err.is_connect() || err.is_request());

        assert_eq!(capture.contents().matches("Image query failed").count(), 1);
    }

    #[tokio::test]
    async fn test_thumbnail_failure_logged_exactly_once() {
        let (addr, _captured) = mock_once(
            "404 Not Found",
            "application/json",
            br#"{"detail":"Requested image thumbnail could not be found."}"#,
        )
        .await;

        let capture = LogCapture::default();
        let client = ArtifactClient::new(format!("http://{}", addr));
        let err = client
            .load_thumbnail("photos", "missing")
            .with_subscriber(capture.subscriber())
            .await
            .unwrap_err();
        assert_eq!(err.status().map(|s| s.as_u16()), Some(404));

        assert_eq!(capture.contents().matches("Thumbnail load failed").count(), 1);
    }

    #[tokio::test]
    async fn test_success_logs_no_errors() {
        let (addr, _captured) = mock_once(
            "200 OK",
            "application/json",
            br#"{"image_ids":[],"page_num":1,"is_last_page":true}"#,
        )
        .await;

        let capture = LogCapture::default();
        let client = ArtifactClient::new(format!("http://{}", addr));
        client
            .query_images(&ImageQuery::default(), 1, 50)
            .with_subscriber(capture.subscriber())
            .await
            .unwrap();

        assert_eq!(capture.contents().matches("failed").count(), 0);
    }

    #[test]
    fn test_base_url_trailing_slash_normalized() {
        let client = ArtifactClient::new("http://localhost:8081/");
        assert_eq!(client.base_url, "http://localhost:8081");
    }
}
