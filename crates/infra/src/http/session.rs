//! Authenticated Box API session
//!
//! [`BoxSession::send`] attaches the bearer token, refreshes it once on
//! `401`, retries transient statuses with jittered backoff and turns the
//! final non-ok response into an [`ApiError`].

use std::fmt;
use std::sync::Arc;

use boxsdk_common::auth::AuthCoordinator;
use boxsdk_common::error::ErrorClassification;
use boxsdk_common::resilience::{BackoffPolicy, RetryState};
use boxsdk_domain::constants::{HEADER_AS_USER, HEADER_BOX_API, HEADER_BOX_UA};
use boxsdk_domain::ClientConfig;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, RETRY_AFTER, USER_AGENT};
use reqwest::Method;
use tracing::{debug, instrument, warn};

use super::envelope::{RequestBody, RequestEnvelope, ResponseEnvelope, TransportRequest};
use super::transport::{ReqwestTransport, Transport};
use crate::errors::{ApiError, SessionError};

/// Statuses retried with backoff besides `5xx`.
const RETRYABLE_STATUSES: [u16; 2] = [202, 429];

/// Box API session bound to one auth coordinator
#[derive(Clone)]
pub struct BoxSession {
    auth: Arc<AuthCoordinator>,
    transport: Arc<dyn Transport>,
    config: Arc<ClientConfig>,
    backoff: BackoffPolicy,
    default_headers: HeaderMap,
}

impl BoxSession {
    /// Session over an explicit transport.
    ///
    /// # Errors
    /// Returns `SessionError::InvalidRequest` when the configured user agent
    /// is not a valid header value.
    pub fn new(
        auth: Arc<AuthCoordinator>,
        transport: Arc<dyn Transport>,
        config: Arc<ClientConfig>,
    ) -> Result<Self, SessionError> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(USER_AGENT, header_value(&config.user_agent)?);
        default_headers.insert(header_name(HEADER_BOX_UA)?, header_value(&config.box_ua())?);

        Ok(Self {
            auth,
            transport,
            backoff: BackoffPolicy::from_settings(&config.retry),
            config,
            default_headers,
        })
    }

    /// Session over a `reqwest` transport built from `config`.
    ///
    /// # Errors
    /// Returns `SessionError::Transport` when the HTTP client cannot be built.
    pub fn with_reqwest(
        auth: Arc<AuthCoordinator>,
        config: Arc<ClientConfig>,
    ) -> Result<Self, SessionError> {
        let transport = ReqwestTransport::new(&config)?;
        Self::new(auth, Arc::new(transport), config)
    }

    /// Replace the retry policy derived from the config.
    #[must_use]
    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Coordinator supplying and refreshing tokens.
    pub fn auth(&self) -> &Arc<AuthCoordinator> {
        &self.auth
    }

    /// Configuration the session was built from.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Headers added to every request.
    pub fn default_headers(&self) -> &HeaderMap {
        &self.default_headers
    }

    /// Session acting on behalf of `user_id` via the `As-User` header.
    ///
    /// # Errors
    /// Returns `SessionError::InvalidRequest` for ids that are not valid
    /// header values.
    pub fn as_user(&self, user_id: &str) -> Result<Self, SessionError> {
        self.with_default_header(HEADER_AS_USER, user_id)
    }

    /// Session accessing items through a shared link.
    ///
    /// # Errors
    /// Returns `SessionError::InvalidRequest` if the link cannot be sent as a
    /// header value.
    pub fn with_shared_link(
        &self,
        shared_link: &str,
        password: Option<&str>,
    ) -> Result<Self, SessionError> {
        let mut value = format!("shared_link={shared_link}");
        if let Some(password) = password {
            value.push_str("&shared_link_password=");
            value.push_str(password);
        }
        self.with_default_header(HEADER_BOX_API, &value)
    }

    /// Session with extra headers sent on every request.
    #[must_use]
    pub fn with_default_headers(&self, headers: HeaderMap) -> Self {
        let mut session = self.clone();
        session.default_headers.extend(headers);
        session
    }

    fn with_default_header(&self, name: &str, value: &str) -> Result<Self, SessionError> {
        let mut headers = HeaderMap::new();
        headers.insert(header_name(name)?, header_value(value)?);
        Ok(self.with_default_headers(headers))
    }

    /// Absolute URL under the API base.
    pub fn api_url(&self, path: &str) -> String {
        join_url(&self.config.api_base_url, path)
    }

    /// Absolute URL under the upload base.
    pub fn upload_url(&self, path: &str) -> String {
        join_url(&self.config.upload_base_url, path)
    }

    /// `GET url`, expecting JSON.
    ///
    /// # Errors
    /// See [`BoxSession::send`].
    pub async fn get(&self, url: impl Into<String>) -> Result<ResponseEnvelope, SessionError> {
        self.send(RequestEnvelope::new(Method::GET, url)).await
    }

    /// `POST body` to `url`.
    ///
    /// # Errors
    /// See [`BoxSession::send`].
    pub async fn post(
        &self,
        url: impl Into<String>,
        body: RequestBody,
    ) -> Result<ResponseEnvelope, SessionError> {
        self.send(RequestEnvelope::new(Method::POST, url).with_body(body)).await
    }

    /// `PUT body` to `url`.
    ///
    /// # Errors
    /// See [`BoxSession::send`].
    pub async fn put(
        &self,
        url: impl Into<String>,
        body: RequestBody,
    ) -> Result<ResponseEnvelope, SessionError> {
        self.send(RequestEnvelope::new(Method::PUT, url).with_body(body)).await
    }

    /// `DELETE` usually answers `204` without a body, so JSON is not expected.
    ///
    /// # Errors
    /// See [`BoxSession::send`].
    pub async fn delete(&self, url: impl Into<String>) -> Result<ResponseEnvelope, SessionError> {
        self.send(RequestEnvelope::new(Method::DELETE, url).with_expect_json(false)).await
    }

    /// `OPTIONS` with a body, used for upload preflight checks.
    ///
    /// # Errors
    /// See [`BoxSession::send`].
    pub async fn options(
        &self,
        url: impl Into<String>,
        body: RequestBody,
    ) -> Result<ResponseEnvelope, SessionError> {
        self.send(RequestEnvelope::new(Method::OPTIONS, url).with_body(body)).await
    }

    /// Send `request`, refreshing and retrying as needed.
    ///
    /// # Errors
    /// - `SessionError::Api` for a final non-ok response, or a non-JSON body
    ///   when `expect_json` is set
    /// - `SessionError::Auth` when obtaining or refreshing the token fails
    /// - `SessionError::Transport` once transport retries are exhausted
    /// - `SessionError::NonSeekableStream` when a forward-only body would
    ///   have to be sent twice
    #[instrument(skip_all, fields(method = %request.method, url = %request.url))]
    pub async fn send(&self, mut request: RequestEnvelope) -> Result<ResponseEnvelope, SessionError> {
        let mut auto_renew = request.auto_renew;
        let mut access_token = self.auth.access_token()?;
        if access_token.is_none() && auto_renew {
            debug!("no access token yet, authenticating before the first attempt");
            access_token = Some(self.auth.refresh(None).await?.access_token);
            auto_renew = false;
        }

        request.body.mark_streams()?;
        let jwt_grant = request.is_jwt_grant();
        let mut status_retries = RetryState::default();
        let mut exception_retries = RetryState::default();

        loop {
            let token_used = access_token.clone();
            let attempt = self.prepare_attempt(&mut request, token_used.as_deref())?;

            let response = match self.transport.execute(attempt).await {
                Ok(response) => response,
                Err(err) => {
                    if !err.is_retryable()
                        || exception_retries.attempt_number >= self.backoff.max_retries_on_exception()
                    {
                        return Err(err.into());
                    }
                    let delay = self.backoff.delay(exception_retries.attempt_number, None);
                    warn!(
                        attempt = exception_retries.attempt_number,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "transport error, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    exception_retries.advance();
                    continue;
                }
            };

            if response.status == 401 && auto_renew {
                debug!("access token rejected, refreshing");
                auto_renew = false;
                access_token = Some(self.auth.refresh(token_used.as_deref()).await?.access_token);
                continue;
            }

            if self.should_retry(&request, jwt_grant, &response, &status_retries) {
                let retry_after = response.headers.get(RETRY_AFTER).and_then(|v| v.to_str().ok());
                let delay = self.backoff.delay(status_retries.attempt_number, retry_after);
                debug!(
                    attempt = status_retries.attempt_number,
                    status = response.status,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "retrying request"
                );
                tokio::time::sleep(delay).await;
                status_retries.advance();
                continue;
            }

            return self.finish(&request, response);
        }
    }

    fn prepare_attempt(
        &self,
        request: &mut RequestEnvelope,
        access_token: Option<&str>,
    ) -> Result<TransportRequest, SessionError> {
        let mut headers = self.default_headers.clone();
        for (name, value) in &request.headers {
            headers.insert(name.clone(), value.clone());
        }
        if let Some(token) = access_token {
            headers.insert(AUTHORIZATION, header_value(&format!("Bearer {token}"))?);
        }

        Ok(TransportRequest {
            method: request.method.clone(),
            url: request.url.clone(),
            headers,
            body: request.body.prepare()?,
        })
    }

    fn should_retry(
        &self,
        request: &RequestEnvelope,
        jwt_grant: bool,
        response: &ResponseEnvelope,
        state: &RetryState,
    ) -> bool {
        let transient = RETRYABLE_STATUSES.contains(&response.status) || response.status >= 500;
        transient
            && !jwt_grant
            && !request.skip_retry_codes.contains(&response.status)
            && self.backoff.can_retry(state)
    }

    fn finish(
        &self,
        request: &RequestEnvelope,
        response: ResponseEnvelope,
    ) -> Result<ResponseEnvelope, SessionError> {
        if !response.ok {
            let err = ApiError::from_response(&request.method, &request.url, &response);
            warn!(status = err.status, code = ?err.code, request_id = ?err.request_id, "Box API error");
            return Err(err.into());
        }
        if request.expect_json && !response.body.is_empty() && !response.is_json() {
            return Err(ApiError::non_json(&request.method, &request.url, &response).into());
        }
        Ok(response)
    }
}

impl fmt::Debug for BoxSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoxSession")
            .field("auth", &self.auth)
            .field("api_base_url", &self.config.api_base_url)
            .field("backoff", &self.backoff)
            .finish_non_exhaustive()
    }
}

fn header_name(name: &str) -> Result<HeaderName, SessionError> {
    HeaderName::from_bytes(name.as_bytes()).map_err(|e| SessionError::InvalidRequest(e.to_string()))
}

fn header_value(value: &str) -> Result<HeaderValue, SessionError> {
    HeaderValue::from_str(value).map_err(|e| SessionError::InvalidRequest(e.to_string()))
}

fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}
