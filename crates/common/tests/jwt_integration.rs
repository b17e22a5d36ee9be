//! Integration tests for the JWT grant
//!
//! Covers assertion contents, server clock-skew correction and throttling
//! against a wiremock token endpoint.

#![cfg(feature = "platform")]

use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use boxsdk_common::auth::{AuthCoordinator, AuthError, OAuthClient};
use boxsdk_domain::{ClientConfig, ClientCredentials, JwtAlgorithm, JwtSettings, Subject};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

const TEST_KEY: &str = include_str!("fixtures/jwt_test_key.pem");
const ENCRYPTED_TEST_KEY: &str = include_str!("fixtures/jwt_test_key_encrypted.pem");
const TEST_PUBLIC_KEY: &str = include_str!("fixtures/jwt_test_key_public.pem");
const SERVER_DATE: &str = "Tue, 15 Nov 1994 08:12:31 GMT";
const SERVER_TIMESTAMP: i64 = 784_887_151;

fn settings(subject: Subject) -> JwtSettings {
    JwtSettings {
        credentials: ClientCredentials::new("jwt-client", "jwt-secret"),
        jwt_key_id: "key-1".to_string(),
        private_key: TEST_KEY.to_string(),
        private_key_passphrase: None,
        algorithm: JwtAlgorithm::RS256,
        subject,
    }
}

fn coordinator(server: &MockServer, subject: Subject) -> AuthCoordinator {
    let mut config = ClientConfig::default().with_base_url(&server.uri());
    config.retry.base_interval_ms = 1;
    let client = OAuthClient::new(Arc::new(config), ClientCredentials::new("jwt-client", "jwt-secret"))
        .expect("oauth client");
    AuthCoordinator::jwt(client, settings(subject)).expect("jwt coordinator")
}

/// Extract header and claims of the assertion carried by a token request.
fn assertion_parts(request: &Request) -> (Value, Value) {
    let assertion = url::form_urlencoded::parse(&request.body)
        .find(|(key, _)| key == "assertion")
        .map(|(_, value)| value.into_owned())
        .expect("assertion field");
    let mut segments = assertion.split('.');
    let mut decode = || {
        let segment = segments.next().expect("jwt segment");
        serde_json::from_slice::<Value>(&URL_SAFE_NO_PAD.decode(segment).expect("base64url"))
            .expect("json segment")
    };
    let header = decode();
    let claims = decode();
    (header, claims)
}

fn expired_exp_response() -> ResponseTemplate {
    ResponseTemplate::new(400).insert_header("Date", SERVER_DATE).set_body_json(json!({
        "error": "invalid_grant",
        "error_description": "Please check the 'exp' claim."
    }))
}

/// Validates the assertion contents for an enterprise subject.
///
/// # Test Steps
/// 1. Request a token with an enterprise JWT coordinator
/// 2. Decode the assertion from the recorded form body
/// 3. Verify header `kid`/`alg` and the Box claims
#[tokio::test]
async fn test_assertion_claims() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"access_token": "jwt-token"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let auth = coordinator(&server, Subject::EnterpriseId("ent-1".to_string()));
    let before = chrono::Utc::now().timestamp();
    let pair = auth.refresh(None).await.unwrap();
    assert_eq!(pair.access_token, "jwt-token");

    let requests = server.received_requests().await.expect("recording enabled");
    let (header, claims) = assertion_parts(&requests[0]);
    assert_eq!(header["alg"], "RS256");
    assert_eq!(header["kid"], "key-1");
    assert_eq!(claims["iss"], "jwt-client");
    assert_eq!(claims["sub"], "ent-1");
    assert_eq!(claims["box_sub_type"], "enterprise");
    assert_eq!(claims["aud"], "https://api.box.com/oauth2/token");
    assert_eq!(claims["jti"].as_str().map(str::len), Some(32));
    let exp = claims["exp"].as_i64().expect("numeric exp");
    assert!(exp >= before + 30 && exp <= before + 32);
}

/// Validates signing with an encrypted key from app settings.
///
/// # Test Steps
/// 1. Build a JWT coordinator from an encrypted PKCS#8 key and passphrase
/// 2. Request a token
/// 3. Verify the assertion's signature with the matching public key
#[tokio::test]
async fn test_encrypted_key_signs_verifiable_assertion() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"access_token": "jwt-token"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut config = ClientConfig::default().with_base_url(&server.uri());
    config.retry.base_interval_ms = 1;
    let client = OAuthClient::new(Arc::new(config), ClientCredentials::new("jwt-client", "jwt-secret"))
        .expect("oauth client");
    let mut jwt = settings(Subject::UserId("user-7".to_string()));
    jwt.private_key = ENCRYPTED_TEST_KEY.to_string();
    jwt.private_key_passphrase = Some("box-test-passphrase".to_string());
    let auth = AuthCoordinator::jwt(client, jwt).expect("jwt coordinator");

    assert_eq!(auth.refresh(None).await.unwrap().access_token, "jwt-token");

    let requests = server.received_requests().await.expect("recording enabled");
    let assertion = url::form_urlencoded::parse(&requests[0].body)
        .find(|(key, _)| key == "assertion")
        .map(|(_, value)| value.into_owned())
        .expect("assertion field");
    let mut validation = Validation::new(Algorithm::RS256);
    validation.set_audience(&["https://api.box.com/oauth2/token"]);
    let decoded = decode::<Value>(
        &assertion,
        &DecodingKey::from_rsa_pem(TEST_PUBLIC_KEY.as_bytes()).expect("public key"),
        &validation,
    )
    .expect("signature verifies");
    assert_eq!(decoded.claims["sub"], "user-7");
    assert_eq!(decoded.claims["box_sub_type"], "user");
}

/// Validates clock-skew correction from the server `Date` header.
///
/// The first assertion is rejected as expired; the retry must derive `exp`
/// from the server date, and there must be no third attempt.
///
/// # Test Steps
/// 1. Answer the first exchange with 400 `invalid_grant` about `exp`
/// 2. Answer the second with a token
/// 3. Verify exactly two exchanges and `exp == server_date + 30`
#[tokio::test]
async fn test_clock_skew_correction() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(expired_exp_response())
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "skewed"})))
        .expect(1)
        .mount(&server)
        .await;

    let auth = coordinator(&server, Subject::UserId("user-7".to_string()));
    let pair = auth.refresh(None).await.unwrap();
    assert_eq!(pair.access_token, "skewed");

    let requests = server.received_requests().await.expect("recording enabled");
    assert_eq!(requests.len(), 2);
    let (_, retried) = assertion_parts(&requests[1]);
    assert_eq!(retried["exp"].as_i64(), Some(SERVER_TIMESTAMP + 30));
    assert_eq!(retried["box_sub_type"], "user");
}

/// Validates that skew correction happens at most once.
///
/// # Test Steps
/// 1. Reject every exchange as expired
/// 2. Verify two exchanges and the rejection surfaced
#[tokio::test]
async fn test_clock_skew_correction_only_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(expired_exp_response())
        .expect(2)
        .mount(&server)
        .await;

    let auth = coordinator(&server, Subject::EnterpriseId("ent-1".to_string()));
    let err = auth.refresh(None).await.unwrap_err();

    assert_eq!(err.rejected().and_then(|r| r.code.as_deref()), Some("invalid_grant"));
    server.verify().await;
}

/// Validates throttling inside the JWT exchange.
///
/// # Test Steps
/// 1. Answer the first exchange with 429 and `Retry-After: 0`
/// 2. Verify the second exchange succeeds
#[tokio::test]
async fn test_rate_limited_exchange_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "after-429"})))
        .mount(&server)
        .await;

    let auth = coordinator(&server, Subject::EnterpriseId("ent-1".to_string()));
    assert_eq!(auth.refresh(None).await.unwrap().access_token, "after-429");
    assert_eq!(server.received_requests().await.map(|r| r.len()), Some(2));
}

/// Validates the retry budget for a token endpoint that keeps failing.
///
/// # Test Steps
/// 1. Answer every exchange with 503
/// 2. Verify `MAX_RETRY_ATTEMPTS + 1` exchanges and the 503 surfaced
#[tokio::test]
async fn test_server_errors_exhaust_budget() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(503))
        .expect(6)
        .mount(&server)
        .await;

    let auth = coordinator(&server, Subject::EnterpriseId("ent-1".to_string()));
    let err = auth.refresh(None).await.unwrap_err();

    assert_eq!(err.rejected().map(|r| r.status), Some(503));
    server.verify().await;
}

/// Validates that other rejections are not retried.
///
/// # Test Steps
/// 1. Answer with 400 `invalid_client`
/// 2. Verify a single exchange
#[tokio::test]
async fn test_client_error_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": "invalid_client"})))
        .expect(1)
        .mount(&server)
        .await;

    let auth = coordinator(&server, Subject::EnterpriseId("ent-1".to_string()));
    assert!(matches!(auth.refresh(None).await, Err(AuthError::Rejected(_))));
    server.verify().await;
}

/// Validates switching the JWT subject.
///
/// # Test Steps
/// 1. Derive a user coordinator from an enterprise one
/// 2. Verify the new assertion names the user
#[tokio::test]
async fn test_with_subject_switches_assertion_subject() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "user"})))
        .mount(&server)
        .await;

    let enterprise = coordinator(&server, Subject::EnterpriseId("ent-1".to_string()));
    let user = enterprise.with_subject(Subject::UserId("u-9".to_string())).unwrap();
    user.refresh(None).await.unwrap();

    let requests = server.received_requests().await.expect("recording enabled");
    let (_, claims) = assertion_parts(&requests[0]);
    assert_eq!(claims["sub"], "u-9");
    assert_eq!(claims["box_sub_type"], "user");
}
