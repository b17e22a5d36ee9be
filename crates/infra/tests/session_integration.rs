//! Integration tests for the authenticated session
//!
//! Drives `BoxSession` through the real `reqwest` transport against a
//! wiremock API, with a scripted token endpoint behind the coordinator.

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use boxsdk_common::auth::{AuthCoordinator, InMemoryTokenStore, RefreshTokenGrant};
use boxsdk_common::testing::MockTokenEndpoint;
use boxsdk_domain::constants::GRANT_TYPE_JWT_BEARER;
use boxsdk_domain::{ClientConfig, TokenPair};
use boxsdk_infra::{
    BodyStream, BoxSession, MultipartPart, RequestBody, RequestEnvelope, SessionError,
};
use reqwest::Method;
use serde_json::json;
use wiremock::matchers::{body_string, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Harness {
    session: BoxSession,
    endpoint: Arc<MockTokenEndpoint>,
}

fn harness(server: &MockServer, stored: Option<TokenPair>) -> Harness {
    let mut config = ClientConfig::default().with_base_url(&server.uri());
    config.retry.base_interval_ms = 1;

    let endpoint = Arc::new(MockTokenEndpoint::new());
    let store = match stored {
        Some(pair) => InMemoryTokenStore::with_pair(pair),
        None => InMemoryTokenStore::new(),
    };
    let auth = AuthCoordinator::new(Arc::new(RefreshTokenGrant), endpoint.clone(), Arc::new(store));
    let session = BoxSession::with_reqwest(Arc::new(auth), Arc::new(config)).expect("session");
    Harness { session, endpoint }
}

fn stored_pair() -> Option<TokenPair> {
    Some(TokenPair::new("old-token", Some("old-refresh".to_string())))
}

/// Validates refresh-on-401.
///
/// # Test Steps
/// 1. Reject the stored token with 401, accept the refreshed one
/// 2. Verify one refresh and exactly two transport calls
#[tokio::test]
async fn test_unauthorized_refreshes_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/2.0/files/1"))
        .and(header("authorization", "Bearer old-token"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/2.0/files/1"))
        .and(header("authorization", "Bearer token-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"type": "file", "id": "1"})))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(&server, stored_pair());
    let response = h.session.get(h.session.api_url("files/1")).await.unwrap();

    assert_eq!(response.json::<serde_json::Value>().unwrap()["id"], "1");
    assert_eq!(h.endpoint.token_requests(), 1);
    server.verify().await;
}

/// Validates that a second 401 is surfaced instead of refreshing again.
///
/// # Test Steps
/// 1. Answer every call with 401
/// 2. Verify `ApiError(401)`, one refresh and two calls
#[tokio::test]
async fn test_unauthorized_after_refresh_is_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "type": "error", "code": "unauthorized", "message": "Unauthorized", "request_id": "r-9"
        })))
        .expect(2)
        .mount(&server)
        .await;

    let h = harness(&server, stored_pair());
    let err = h.session.get(h.session.api_url("users/me")).await.unwrap_err();

    let api = err.api().expect("api error");
    assert_eq!(api.status, 401);
    assert_eq!(api.code.as_deref(), Some("unauthorized"));
    assert_eq!(api.request_id.as_deref(), Some("r-9"));
    assert_eq!(h.endpoint.token_requests(), 1);
    server.verify().await;
}

/// Validates authentication before the first attempt when no token exists.
///
/// # Test Steps
/// 1. Start with an empty store
/// 2. Verify the first request already carries the exchanged token
#[tokio::test]
async fn test_missing_token_is_obtained_first() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("authorization", "Bearer token-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(&server, None);
    h.session.get(h.session.api_url("folders/0")).await.unwrap();

    assert_eq!(h.endpoint.token_requests(), 1);
    server.verify().await;
}

/// Validates the retry budget for persistent server errors.
///
/// # Test Steps
/// 1. Answer every call with 503
/// 2. Verify `MAX_RETRY_ATTEMPTS + 1` calls and `ApiError(503)`
#[tokio::test]
async fn test_server_errors_exhaust_budget() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503).set_body_string("Service Unavailable"))
        .expect(6)
        .mount(&server)
        .await;

    let h = harness(&server, stored_pair());
    let err = h.session.get(h.session.api_url("folders/0")).await.unwrap_err();

    assert_eq!(err.status(), Some(503));
    assert_eq!(err.api().and_then(|e| e.message.as_deref()), Some("Service Unavailable"));
    server.verify().await;
}

/// Validates that `Retry-After` overrides the exponential delay.
///
/// # Test Steps
/// 1. Use a 10s base interval and answer 429 with `Retry-After: 0` once
/// 2. Verify the retry happens well before the base interval
#[tokio::test]
async fn test_retry_after_overrides_backoff() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&server)
        .await;

    let mut config = ClientConfig::default().with_base_url(&server.uri());
    config.retry.base_interval_ms = 10_000;
    let auth = AuthCoordinator::new(
        Arc::new(RefreshTokenGrant),
        Arc::new(MockTokenEndpoint::new()),
        Arc::new(InMemoryTokenStore::with_pair(TokenPair::new("t", None))),
    );
    let session = BoxSession::with_reqwest(Arc::new(auth), Arc::new(config)).unwrap();

    let response =
        tokio::time::timeout(Duration::from_secs(5), session.get(session.api_url("folders/0")))
            .await
            .expect("Retry-After: 0 must not wait for the base interval")
            .unwrap();
    assert_eq!(response.status, 200);
}

/// Validates that an out-of-range `Retry-After` falls back to backoff.
///
/// # Test Steps
/// 1. Answer 429 with `Retry-After: 1e20` once
/// 2. Verify the session retries with the computed delay and succeeds
#[tokio::test]
async fn test_oversized_retry_after_uses_backoff() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "1e20"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(&server, stored_pair());
    let response =
        tokio::time::timeout(Duration::from_secs(5), h.session.get(h.session.api_url("folders/0")))
            .await
            .expect("oversized Retry-After must not stall the session")
            .unwrap();

    assert_eq!(response.status, 200);
    server.verify().await;
}

/// Validates stream replay from the caller's position.
///
/// # Test Steps
/// 1. Upload a seekable stream positioned at byte 4
/// 2. Fail the first attempt with 500
/// 3. Verify both attempts sent the bytes after position 4
#[tokio::test]
async fn test_seekable_stream_is_replayed() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(body_string("456789"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let mut cursor = Cursor::new(b"0123456789".to_vec());
    cursor.set_position(4);
    let h = harness(&server, stored_pair());
    h.session
        .put(h.session.upload_url("files/1/content"), RequestBody::Stream(BodyStream::seekable(cursor)))
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].body, b"456789".to_vec());
    server.verify().await;
}

/// Validates that a forward-only stream is never sent twice.
///
/// # Test Steps
/// 1. Upload a forward-only stream and answer 503
/// 2. Verify the non-seekable error after a single call
#[tokio::test]
async fn test_forward_only_stream_cannot_retry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(&server, stored_pair());
    let body = RequestBody::Stream(BodyStream::forward_only(Cursor::new(b"payload".to_vec())));
    let err = h.session.post(h.session.upload_url("files/content"), body).await.unwrap_err();

    assert!(matches!(err, SessionError::NonSeekableStream));
    server.verify().await;
}

/// Validates multipart uploads through the reqwest transport with a retry.
///
/// # Test Steps
/// 1. Fail the first multipart attempt with 502
/// 2. Verify the second attempt carries the full file part
#[tokio::test]
async fn test_multipart_upload_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"total_count": 1})))
        .mount(&server)
        .await;

    let h = harness(&server, stored_pair());
    let body = RequestBody::Multipart(vec![
        MultipartPart::field("attributes", r#"{"name":"a.txt","parent":{"id":"0"}}"#),
        MultipartPart::file("file", "a.txt", BodyStream::seekable(Cursor::new(b"hello".to_vec()))),
    ]);
    h.session.post(h.session.upload_url("files/content"), body).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    let retried = String::from_utf8_lossy(&requests[1].body);
    assert!(retried.contains("filename=\"a.txt\""));
    assert!(retried.contains("hello"));
}

/// Validates the non-JSON check on successful responses.
///
/// # Test Steps
/// 1. Answer 200 with HTML
/// 2. Verify `ApiError` with the non-JSON message, and success when JSON
///    is not expected
#[tokio::test]
async fn test_non_json_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .mount(&server)
        .await;

    let h = harness(&server, stored_pair());
    let url = h.session.api_url("files/1/thumbnail.png");

    let err = h.session.get(url.clone()).await.unwrap_err();
    assert_eq!(
        err.api().and_then(|e| e.message.as_deref()),
        Some("Non-json response received, while expecting json response.")
    );

    let raw = h
        .session
        .send(RequestEnvelope::new(Method::GET, url).with_expect_json(false))
        .await
        .unwrap();
    assert_eq!(raw.text(), "<html></html>");
}

/// Validates that JWT grant requests are not retried by the session.
///
/// # Test Steps
/// 1. Send a jwt-bearer form through the session and answer 503
/// 2. Verify a single call
#[tokio::test]
async fn test_jwt_grant_request_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(&server, stored_pair());
    let request = RequestEnvelope::new(Method::POST, format!("{}/oauth2/token", server.uri()))
        .with_body(RequestBody::form([("grant_type", GRANT_TYPE_JWT_BEARER), ("assertion", "x")]));

    assert_eq!(h.session.send(request).await.unwrap_err().status(), Some(503));
    server.verify().await;
}

/// Validates caller-supplied skip codes.
///
/// # Test Steps
/// 1. Answer 202 and mark 202 as not retryable
/// 2. Verify a single call and the 202 returned as success
#[tokio::test]
async fn test_skip_retry_codes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({"entries": []})))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(&server, stored_pair());
    let request = RequestEnvelope::new(Method::GET, h.session.api_url("files/1/representations"))
        .with_skip_retry_codes([202]);

    assert_eq!(h.session.send(request).await.unwrap().status, 202);
    server.verify().await;
}

/// Validates that connection failures are retried and then surfaced.
///
/// # Test Steps
/// 1. Point the session at a closed port
/// 2. Verify a transport error after the exception budget
#[tokio::test]
async fn test_connection_failure_surfaces_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let address = listener.local_addr().unwrap();
    drop(listener);

    let server = MockServer::start().await;
    let h = harness(&server, stored_pair());
    let err = h.session.get(format!("http://{address}/2.0/folders/0")).await.unwrap_err();

    assert!(matches!(err, SessionError::Transport(_)));
}

/// Validates derived sessions against a real transport.
///
/// # Test Steps
/// 1. Send through an `as_user` session
/// 2. Verify `As-User` plus the default headers reached the server
#[tokio::test]
async fn test_as_user_header() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("as-user", "77"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(&server, stored_pair());
    let session = h.session.as_user("77").unwrap();
    session.get(session.api_url("users/me")).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert!(requests[0].headers.contains_key("x-box-ua"));
    assert!(requests[0].headers.contains_key("user-agent"));
    server.verify().await;
}
