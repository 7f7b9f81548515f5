//! End-to-end tests driving the proxy through the SDK: queries and
//! thumbnail loads travel the full path through the routing table to the
//! gateway pool.

mod common;

use std::net::SocketAddr;

use artifact_sdk::{ArtifactClient, ImageQuery, ObjectRef};
use common::{start_mock_upstream, start_proxy, start_programmable_upstream, test_config};

#[tokio::test]
async fn test_query_through_proxy() {
    let proxy_addr: SocketAddr = "127.0.0.1:29121".parse().unwrap();
    let gateway_addr: SocketAddr = "127.0.0.1:29231".parse().unwrap();
    let edge_addr: SocketAddr = "127.0.0.1:29232".parse().unwrap();

    start_programmable_upstream(gateway_addr, || async {
        (
            200,
            r#"{"image_ids":[{"bucket":"uav","name":"frame-17.png"}],"page_num":2,"is_last_page":false}"#
                .to_string(),
        )
    })
    .await;
    start_mock_upstream(edge_addr, "edge").await;

    let (shutdown, _updates) =
        start_proxy(test_config(proxy_addr, gateway_addr, edge_addr), proxy_addr).await;

    let client = ArtifactClient::new(format!("http://{}", proxy_addr));
    let page = client
        .query_images(&ImageQuery::default(), 2, 25)
        .await
        .unwrap();

    assert_eq!(
        page.image_ids,
        vec![ObjectRef {
            bucket: "uav".to_string(),
            name: "frame-17.png".to_string()
        }]
    );
    assert_eq!(page.page_num, 2);
    assert!(!page.is_last_page);

    shutdown.trigger();
}

#[tokio::test]
async fn test_thumbnail_through_proxy() {
    let proxy_addr: SocketAddr = "127.0.0.1:29122".parse().unwrap();
    let gateway_addr: SocketAddr = "127.0.0.1:29233".parse().unwrap();
    let edge_addr: SocketAddr = "127.0.0.1:29234".parse().unwrap();

    start_mock_upstream(gateway_addr, "raw-thumbnail-bytes").await;
    start_mock_upstream(edge_addr, "edge").await;

    let (shutdown, _updates) =
        start_proxy(test_config(proxy_addr, gateway_addr, edge_addr), proxy_addr).await;

    let client = ArtifactClient::new(format!("http://{}", proxy_addr));
    let data = client.load_thumbnail("uav", "frame-17.png").await.unwrap();
    assert_eq!(&data[..], b"raw-thumbnail-bytes");

    shutdown.trigger();
}

#[tokio::test]
async fn test_gateway_error_propagates_through_proxy() {
    let proxy_addr: SocketAddr = "127.0.0.1:29123".parse().unwrap();
    let gateway_addr: SocketAddr = "127.0.0.1:29235".parse().unwrap();
    let edge_addr: SocketAddr = "127.0.0.1:29236".parse().unwrap();

    start_programmable_upstream(gateway_addr, || async {
        (404, r#"{"detail":"Requested image thumbnail could not be found."}"#.to_string())
    })
    .await;
    start_mock_upstream(edge_addr, "edge").await;

    let (shutdown, _updates) =
        start_proxy(test_config(proxy_addr, gateway_addr, edge_addr), proxy_addr).await;

    let client = ArtifactClient::new(format!("http://{}", proxy_addr));
    let err = client.load_thumbnail("uav", "missing.png").await.unwrap_err();
    assert_eq!(err.status().map(|s| s.as_u16()), Some(404));

    shutdown.trigger();
}
