//! Integration tests for the pooled HTTP client layer against a mock origin.

use serde_json::json;
use service_core::http::{
    ClientOptions, ClientRegistry, HeaderMap, HeaderValue, HttpClientError, Payload,
    ResponseFormat, Url,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Barrier;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn url(server: &MockServer, path: &str) -> Url {
    Url::parse(&format!("{}{}", server.uri(), path)).expect("valid mock url")
}

#[tokio::test]
async fn get_decodes_json_by_default() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/stories/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1, "title": "Sabr"})))
        .expect(1)
        .mount(&server)
        .await;

    let registry = ClientRegistry::default();
    let target = url(&server, "/stories/1");
    let client = registry.get_client(target.as_str(), None).await.unwrap();

    let payload = client
        .get(&target, &(), None, ResponseFormat::Json)
        .await
        .unwrap();

    assert_eq!(payload, Payload::Json(json!({"id": 1, "title": "Sabr"})));
}

#[tokio::test]
async fn get_appends_query_params_to_url_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("lang", "en"))
        .and(query_param("limit", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let registry = ClientRegistry::default();
    let target = url(&server, "/search?lang=en");
    let client = registry.get_client(target.as_str(), None).await.unwrap();

    let payload = client
        .get(&target, &[("limit", "5")], None, ResponseFormat::Json)
        .await
        .unwrap();

    assert_eq!(payload.into_json(), Some(json!([])));
}

#[tokio::test]
async fn post_sends_json_body_with_merged_headers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/agent/run"))
        .and(body_json(json!({"prompt": "tell a story"})))
        .and(header("x-api-key", "per-call"))
        .and(header("x-tenant", "default-tenant"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"story": "..."})))
        .expect(1)
        .mount(&server)
        .await;

    let mut defaults = HeaderMap::new();
    defaults.insert("x-api-key", HeaderValue::from_static("default"));
    defaults.insert("x-tenant", HeaderValue::from_static("default-tenant"));

    let mut per_call = HeaderMap::new();
    per_call.insert("x-api-key", HeaderValue::from_static("per-call"));

    let registry = ClientRegistry::default();
    let target = url(&server, "/agent/run");
    let client = registry
        .get_client(target.as_str(), Some(defaults))
        .await
        .unwrap();

    let payload = client
        .post(
            &target,
            &json!({"prompt": "tell a story"}),
            Some(&per_call),
            ResponseFormat::Json,
        )
        .await
        .unwrap();

    assert_eq!(payload.into_json(), Some(json!({"story": "..."})));
}

#[tokio::test]
async fn server_error_surfaces_as_status_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/agent/run"))
        .respond_with(ResponseTemplate::new(500).set_body_string("model crashed"))
        .mount(&server)
        .await;

    let registry = ClientRegistry::default();
    let target = url(&server, "/agent/run");
    let client = registry.get_client(target.as_str(), None).await.unwrap();

    let err = client
        .post(&target, &json!({}), None, ResponseFormat::Json)
        .await
        .unwrap_err();

    match err {
        HttpClientError::Status { status, body, .. } => {
            assert_eq!(status.as_u16(), 500);
            assert_eq!(body, "model crashed");
        }
        other => panic!("expected status error, got {:?}", other),
    }
}

#[tokio::test]
async fn client_error_surfaces_as_status_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"detail": "missing"})))
        .mount(&server)
        .await;

    let registry = ClientRegistry::default();
    let target = url(&server, "/nothing");
    let client = registry.get_client(target.as_str(), None).await.unwrap();

    let err = client
        .get(&target, &(), None, ResponseFormat::Json)
        .await
        .unwrap_err();

    assert_eq!(err.status().map(|s| s.as_u16()), Some(404));
}

#[tokio::test]
async fn text_format_returns_raw_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/raw"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{not json at all"))
        .mount(&server)
        .await;

    let registry = ClientRegistry::default();
    let target = url(&server, "/raw");
    let client = registry.get_client(target.as_str(), None).await.unwrap();

    let payload = client
        .get(&target, &(), None, ResponseFormat::Text)
        .await
        .unwrap();

    assert_eq!(payload, Payload::Text("{not json at all".to_string()));
}

#[tokio::test]
async fn malformed_json_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("{\"story\": ", "application/json"))
        .mount(&server)
        .await;

    let registry = ClientRegistry::default();
    let target = url(&server, "/broken");
    let client = registry.get_client(target.as_str(), None).await.unwrap();

    let err = client
        .get(&target, &(), None, ResponseFormat::Json)
        .await
        .unwrap_err();

    assert!(matches!(err, HttpClientError::Decode { .. }));
}

#[tokio::test]
async fn non_json_content_type_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<html></html>", "text/html"))
        .mount(&server)
        .await;

    let registry = ClientRegistry::default();
    let target = url(&server, "/page");
    let client = registry.get_client(target.as_str(), None).await.unwrap();

    let err = client
        .get(&target, &(), None, ResponseFormat::Json)
        .await
        .unwrap_err();

    assert!(matches!(err, HttpClientError::Decode { .. }));
}

#[tokio::test]
async fn request_goes_to_client_origin_using_path_only() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let registry = ClientRegistry::default();
    let client = registry.get_client(&server.uri(), None).await.unwrap();

    let elsewhere = Url::parse("http://some-other-host:1234/health").unwrap();
    let payload = client
        .get(&elsewhere, &(), None, ResponseFormat::Json)
        .await
        .unwrap();

    assert_eq!(payload.into_json(), Some(json!({"ok": true})));
}

#[tokio::test]
async fn total_timeout_surfaces_as_transport_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({}))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let registry = ClientRegistry::new(ClientOptions {
        timeout: Some(Duration::from_millis(200)),
        ..ClientOptions::default()
    });
    let target = url(&server, "/slow");
    let client = registry.get_client(target.as_str(), None).await.unwrap();
    assert_eq!(client.timeout(), Some(Duration::from_millis(200)));

    let err = client
        .get(&target, &(), None, ResponseFormat::Json)
        .await
        .unwrap_err();

    assert!(matches!(err, HttpClientError::Transport { .. }));
    assert!(err.is_timeout());
}

#[tokio::test]
async fn connection_refused_is_a_transport_error() {
    // grab a free port, then release it so nothing is listening
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let registry = ClientRegistry::default();
    let target = Url::parse(&format!("http://127.0.0.1:{}/agent/run", port)).unwrap();
    let client = registry.get_client(target.as_str(), None).await.unwrap();

    let err = client
        .post(&target, &json!({}), None, ResponseFormat::Json)
        .await
        .unwrap_err();

    assert!(matches!(err, HttpClientError::Transport { .. }));
    assert!(!err.is_timeout());
}

#[tokio::test]
async fn cancelled_request_leaves_client_usable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/fast"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"fast": true})))
        .mount(&server)
        .await;

    let registry = ClientRegistry::default();
    let slow = url(&server, "/slow");
    let fast = url(&server, "/fast");
    let client = registry.get_client(slow.as_str(), None).await.unwrap();

    let cancelled = tokio::time::timeout(
        Duration::from_millis(100),
        client.get(&slow, &(), None, ResponseFormat::Json),
    )
    .await;
    assert!(cancelled.is_err());

    let payload = client
        .get(&fast, &(), None, ResponseFormat::Json)
        .await
        .unwrap();
    assert_eq!(payload.into_json(), Some(json!({"fast": true})));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_lookups_create_one_client_per_origin() {
    const TASKS: usize = 32;

    let registry = Arc::new(ClientRegistry::default());
    let barrier = Arc::new(Barrier::new(TASKS));

    let handles: Vec<_> = (0..TASKS)
        .map(|i| {
            let registry = Arc::clone(&registry);
            let barrier = Arc::clone(&barrier);
            tokio::spawn(async move {
                barrier.wait().await;
                registry
                    .get_client(&format!("http://neuron:8000/agent/{}", i), None)
                    .await
                    .unwrap()
            })
        })
        .collect();

    let clients: Vec<_> = futures::future::join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    assert_eq!(clients.len(), TASKS);
    assert!(clients.iter().all(|c| Arc::ptr_eq(c, &clients[0])));
    assert_eq!(registry.len().await, 1);
}

#[tokio::test]
async fn close_all_rejects_requests_without_touching_the_network() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let registry = ClientRegistry::default();
    let target = url(&server, "/agent/run");
    let client = registry.get_client(target.as_str(), None).await.unwrap();

    assert_eq!(registry.close_all().await, 1);

    let err = client
        .get(&target, &(), None, ResponseFormat::Json)
        .await
        .unwrap_err();
    assert!(err.is_closed());

    let err = client
        .post(&target, &json!({}), None, ResponseFormat::Json)
        .await
        .unwrap_err();
    assert!(err.is_closed());

    let err = registry.get_client(target.as_str(), None).await.unwrap_err();
    assert!(err.is_closed());

    let received = server.received_requests().await.unwrap_or_default();
    assert!(received.is_empty());
}

#[tokio::test]
async fn truncated_error_body_still_surfaces_status() {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    // promise more body than is sent, then hang up
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 1024];
        let _ = socket.read(&mut buf).await;
        let _ = socket
            .write_all(b"HTTP/1.1 503 Service Unavailable\r\ncontent-length: 100\r\n\r\npartial")
            .await;
        let _ = socket.shutdown().await;
    });

    let registry = ClientRegistry::default();
    let target = Url::parse(&format!("http://127.0.0.1:{}/agent/run", port)).unwrap();
    let client = registry.get_client(target.as_str(), None).await.unwrap();

    let err = client
        .post(&target, &json!({}), None, ResponseFormat::Json)
        .await
        .unwrap_err();

    match err {
        HttpClientError::Status { status, body, .. } => {
            assert_eq!(status.as_u16(), 503);
            assert!(body.is_empty());
        }
        other => panic!("expected status error, got {:?}", other),
    }
}
