#![allow(clippy::unwrap_used)]
// Integration tests for `LocalClient` using wiremock.

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use bigblue_api::{LocalClient, TransportConfig};

fn client() -> LocalClient {
    LocalClient::new(&TransportConfig::default()).unwrap()
}

/// `host:port` of the mock server, the way a device advertises it.
fn address(server: &MockServer) -> String {
    server.address().to_string()
}

#[tokio::test]
async fn test_probe_and_fetch() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "code": 0 })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/devices/last_data"))
        .and(body_json(json!({ "bleMac": "AA:01" })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "code": 0, "data": { "totalSoc": 500 } })),
        )
        .mount(&server)
        .await;

    let local = client();
    assert!(local.probe(&address(&server)).await);

    let record = local.fetch_telemetry(&address(&server), "AA:01").await.unwrap();
    assert_eq!(record.get("totalSoc"), Some(&json!(500)));
}

#[tokio::test]
async fn test_failures_are_swallowed() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/status"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/devices/last_data"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "code": 1002, "data": null })))
        .mount(&server)
        .await;

    let local = client();
    assert!(!local.probe(&address(&server)).await);
    assert!(local.fetch_telemetry(&address(&server), "AA:01").await.is_none());
    assert!(local.fetch_telemetry("", "AA:01").await.is_none());
}

#[tokio::test]
async fn test_slow_device_times_out() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/devices/last_data"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "code": 0, "data": { "totalSoc": 1 } }))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let transport = TransportConfig {
        local_timeout: Duration::from_millis(100),
        ..TransportConfig::default()
    };
    let local = LocalClient::new(&transport).unwrap();
    assert!(local.fetch_telemetry(&address(&server), "AA:01").await.is_none());
}

#[tokio::test]
async fn test_unreachable_address_reports_unavailable() {
    let local = client();
    // Nothing listens on the discard port.
    assert!(!local.probe("127.0.0.1:9").await);
}
