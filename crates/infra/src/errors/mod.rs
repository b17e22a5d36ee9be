//! Errors surfaced by the HTTP session
//!
//! - [`ApiError`]: the final response of a resource call was not ok, or was
//!   not JSON when JSON was expected
//! - [`TransportError`]: no response was received
//! - [`SessionError`]: everything `BoxSession::send` can fail with

use std::fmt;
use std::time::Duration;

use boxsdk_common::auth::AuthError;
use boxsdk_common::error::{parse_retry_after, ErrorBody, ErrorClassification, ErrorSeverity};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::Method;
use serde_json::Value;
use thiserror::Error;

use crate::http::ResponseEnvelope;

const NON_JSON_MESSAGE: &str = "Non-json response received, while expecting json response.";

/// Unsuccessful Box API response
#[derive(Debug, Clone)]
pub struct ApiError {
    pub status: u16,
    pub code: Option<String>,
    pub message: Option<String>,
    pub request_id: Option<String>,
    pub context_info: Option<Value>,
    pub method: Method,
    pub url: String,
    /// Response headers
    pub headers: HeaderMap,
}

impl ApiError {
    /// Build from a non-ok response, parsing the Box error body.
    #[must_use]
    pub fn from_response(method: &Method, url: &str, response: &ResponseEnvelope) -> Self {
        let body = ErrorBody::parse(&response.body);
        Self {
            status: response.status,
            code: body.code,
            message: body.message,
            request_id: body.request_id,
            context_info: body.context_info,
            method: method.clone(),
            url: url.to_string(),
            headers: response.headers.clone(),
        }
    }

    /// Successful response whose body is not JSON although JSON was expected.
    #[must_use]
    pub fn non_json(method: &Method, url: &str, response: &ResponseEnvelope) -> Self {
        Self {
            status: response.status,
            code: None,
            message: Some(NON_JSON_MESSAGE.to_string()),
            request_id: None,
            context_info: None,
            method: method.clone(),
            url: url.to_string(),
            headers: response.headers.clone(),
        }
    }

    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        self.status == 409
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Box API error {} on {} {}", self.status, self.method, self.url)?;
        if let Some(code) = &self.code {
            write!(f, " [{code}]")?;
        }
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        if let Some(request_id) = &self.request_id {
            write!(f, "; Request ID: {request_id}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ApiError {}

impl ErrorClassification for ApiError {
    fn is_retryable(&self) -> bool {
        matches!(self.status, 202 | 429) || self.status >= 500
    }

    fn severity(&self) -> ErrorSeverity {
        match self.status {
            401 | 403 => ErrorSeverity::Error,
            429 => ErrorSeverity::Warning,
            s if s >= 500 => ErrorSeverity::Warning,
            _ => ErrorSeverity::Error,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        self.headers.get(RETRY_AFTER).and_then(|v| v.to_str().ok()).and_then(parse_retry_after)
    }
}

/// The request never produced a response
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ErrorClassification for TransportError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Http(err) => !err.is_builder(),
            Self::Connection(_) => true,
            Self::InvalidRequest(_) => false,
        }
    }

    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Warning
    }

    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

/// Failure of `BoxSession::send`
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Api(Box<ApiError>),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Request with non-seekable stream cannot be retried")]
    NonSeekableStream,

    #[error("failed to read request body: {0}")]
    Body(#[from] std::io::Error),

    #[error("failed to decode response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl SessionError {
    /// The API error, when the call completed with a non-ok response.
    #[must_use]
    pub fn api(&self) -> Option<&ApiError> {
        match self {
            Self::Api(err) => Some(err),
            _ => None,
        }
    }

    #[must_use]
    pub fn status(&self) -> Option<u16> {
        self.api().map(|err| err.status)
    }
}

impl From<ApiError> for SessionError {
    fn from(err: ApiError) -> Self {
        Self::Api(Box::new(err))
    }
}

impl ErrorClassification for SessionError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Api(err) => err.is_retryable(),
            Self::Auth(err) => err.is_retryable(),
            Self::Transport(err) => err.is_retryable(),
            _ => false,
        }
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Api(err) => err.severity(),
            Self::Auth(err) => err.severity(),
            Self::Transport(err) => err.severity(),
            _ => ErrorSeverity::Error,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Api(err) => err.retry_after(),
            Self::Auth(err) => err.retry_after(),
            _ => None,
        }
    }
}
