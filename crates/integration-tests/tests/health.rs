mod harness;

use harness::config::ConfigBuilder;
use harness::mock_backend::MockBackend;
use harness::server::TestServer;

#[tokio::test]
async fn health_endpoint_returns_ok() {
    let mock = MockBackend::start("unused").await.unwrap();
    let config = ConfigBuilder::new().with_backend(&mock.base_url()).build();

    let server = TestServer::start(config).await.unwrap();

    let resp = server.client().get(server.url("/health")).send().await.unwrap();

    assert_eq!(resp.status(), 200);

    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn health_endpoint_disabled() {
    let mock = MockBackend::start("unused").await.unwrap();
    let config = ConfigBuilder::new()
        .with_backend(&mock.base_url())
        .without_health()
        .build();

    let server = TestServer::start(config).await.unwrap();

    let resp = server.client().get(server.url("/health")).send().await.unwrap();

    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn health_does_not_touch_backend() {
    let mock = MockBackend::start("unused").await.unwrap();
    let config = ConfigBuilder::new().with_backend(&mock.base_url()).build();

    let server = TestServer::start(config).await.unwrap();
    server.client().get(server.url("/health")).send().await.unwrap();

    assert!(mock.requests().is_empty());
}
