use std::time::{Duration, Instant};

use http::StatusCode;
use pretty_assertions::assert_eq;
use url::Url;
use webqueue_lib::{DestinationKey, Document, ErrorCode, ServiceBuilder, ServiceConfig, WebService};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn start(server: &MockServer, interval: Duration) -> (WebService, String, u16) {
    let url = Url::parse(&server.uri()).unwrap();
    let host = url.host_str().unwrap().to_string();
    let port = url.port().unwrap();

    let mut config = ServiceConfig::default();
    config
        .request_intervals
        .insert(DestinationKey::new(&host, port), interval);
    let service = ServiceBuilder::builder()
        .config(config)
        .build()
        .start()
        .unwrap();
    (service, host, port)
}

#[tokio::test]
async fn test_json_get() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ws/2/artist"))
        .and(query_param("query", "Björk"))
        .and(header("accept", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"count":1}"#))
        .expect(1)
        .mount(&server)
        .await;
    let (service, host, port) = start(&server, Duration::ZERO);

    let response = service
        .get(&host, port, "/ws/2/artist")
        .query("query", "Björk")
        .submit()
        .await
        .unwrap();

    assert_eq!(response.status, Some(StatusCode::OK));
    assert_eq!(response.document, Document::Json(serde_json::json!({"count": 1})));
}

#[tokio::test]
async fn test_redirect_is_followed() {
    let server = MockServer::start().await;
    Mock::given(path("/old"))
        .respond_with(ResponseTemplate::new(301).insert_header("Location", "/new"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(path("/new"))
        .respond_with(ResponseTemplate::new(200).set_body_string("moved here"))
        .expect(1)
        .mount(&server)
        .await;
    let (service, host, port) = start(&server, Duration::ZERO);

    let response = service.download(&host, port, "/old").submit().await.unwrap();

    assert!(response.is_success());
    assert_eq!(response.url.path(), "/new");
    assert_eq!(response.document.text().as_deref(), Some("moved here"));
}

#[tokio::test]
async fn test_redirect_loop() {
    let server = MockServer::start().await;
    Mock::given(path("/loop"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("Location", "/loop")
                .set_body_string("again"),
        )
        .expect(1)
        .mount(&server)
        .await;
    let (service, host, port) = start(&server, Duration::ZERO);

    let response = service.download(&host, port, "/loop").submit().await.unwrap();

    assert_eq!(response.error_code(), ErrorCode::RedirectLoop.code());
    assert_eq!(response.document.text().as_deref(), Some("again"));
}

#[tokio::test]
async fn test_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_string(r#"{"error":"Not Found"}"#))
        .mount(&server)
        .await;
    let (service, host, port) = start(&server, Duration::ZERO);

    let response = service
        .get(&host, port, "/ws/2/release/missing")
        .submit()
        .await
        .unwrap();

    assert_eq!(response.status, Some(StatusCode::NOT_FOUND));
    assert_eq!(response.error.unwrap().code, ErrorCode::ContentNotFound);
    assert!(response.document.is_raw());
}

#[tokio::test]
async fn test_requests_are_spaced() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(3)
        .mount(&server)
        .await;
    let interval = Duration::from_millis(200);
    let (service, host, port) = start(&server, interval);

    let started = Instant::now();
    let calls: Vec<_> = (0..3)
        .map(|i| service.download(&host, port, format!("/{i}")).submit())
        .collect();
    for response in futures::future::join_all(calls).await {
        assert!(response.unwrap().is_success());
    }

    assert!(started.elapsed() >= interval * 2);
}
