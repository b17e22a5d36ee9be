//! Errors raised by token exchanges, revocation and token storage

use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::error::{parse_retry_after, ClosedError, ErrorBody, ErrorClassification, ErrorSeverity};
use crate::security::KeychainError;

/// Failure of any token operation
#[derive(Debug, Error)]
pub enum AuthError {
    /// Token or revoke endpoint answered with a non-2xx status
    #[error("token endpoint rejected the request: {0}")]
    Rejected(Box<RejectedResponse>),

    /// HTTP request failed before a response arrived
    #[error("token request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// 2xx response without the expected token fields
    #[error("malformed token response: {0}")]
    MalformedResponse(String),

    #[error(transparent)]
    Closed(#[from] ClosedError),

    #[error("token storage failure: {0}")]
    Storage(#[from] TokenStoreError),

    /// JWT assertion could not be built or signed
    #[error("failed to build JWT assertion: {0}")]
    Assertion(String),

    #[error("no refresh token available")]
    NoRefreshToken,

    #[error("Developer token has expired. Please provide a new one.")]
    DeveloperTokenExpired,

    #[error("unsupported operation: {0}")]
    Unsupported(String),
}

impl AuthError {
    /// The rejected response, when the endpoint answered.
    #[must_use]
    pub fn rejected(&self) -> Option<&RejectedResponse> {
        match self {
            Self::Rejected(response) => Some(response),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_closed(&self) -> bool {
        matches!(self, Self::Closed(_))
    }
}

impl From<RejectedResponse> for AuthError {
    fn from(response: RejectedResponse) -> Self {
        Self::Rejected(Box::new(response))
    }
}

impl ErrorClassification for AuthError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Rejected(response) => response.is_transient(),
            Self::Transport(err) => err.is_timeout() || err.is_connect(),
            _ => false,
        }
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Rejected(response) if response.is_transient() => ErrorSeverity::Warning,
            Self::Transport(_) => ErrorSeverity::Warning,
            Self::Storage(_) => ErrorSeverity::Critical,
            Self::Closed(_) => ErrorSeverity::Info,
            _ => ErrorSeverity::Error,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        self.rejected().and_then(|r| r.retry_after.as_deref()).and_then(parse_retry_after)
    }
}

/// Non-2xx answer from the OAuth endpoints.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedResponse {
    pub status: u16,
    pub code: Option<String>,
    pub message: Option<String>,
    pub request_id: Option<String>,
    /// Raw `Retry-After` header
    pub retry_after: Option<String>,
    /// Raw `Date` header
    pub date: Option<String>,
    pub body: String,
}

impl RejectedResponse {
    /// Build from status, the two headers the retry logic inspects, and the body.
    #[must_use]
    pub fn from_parts(
        status: u16,
        retry_after: Option<String>,
        date: Option<String>,
        body: &[u8],
    ) -> Self {
        let parsed = ErrorBody::parse(body);
        Self {
            status,
            code: parsed.code,
            message: parsed.message,
            request_id: parsed.request_id,
            retry_after,
            date,
            body: String::from_utf8_lossy(body).into_owned(),
        }
    }

    /// 429 or any 5xx.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        self.status == 429 || self.status >= 500
    }

    /// `400 invalid_grant` complaining about the assertion's `exp` claim.
    #[must_use]
    pub fn is_expired_assertion(&self) -> bool {
        self.status == 400
            && self.code.as_deref() == Some("invalid_grant")
            && self.message.as_deref().is_some_and(|m| m.contains("exp"))
    }

    /// Server clock from the `Date` header (RFC 2822 / IMF-fixdate).
    #[must_use]
    pub fn server_date(&self) -> Option<DateTime<Utc>> {
        self.date
            .as_deref()
            .and_then(|d| DateTime::parse_from_rfc2822(d.trim()).ok())
            .map(|d| d.with_timezone(&Utc))
    }
}

impl std::fmt::Display for RejectedResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.status)?;
        if let Some(code) = &self.code {
            write!(f, " {code}")?;
        }
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        Ok(())
    }
}

/// Token persistence failure
#[derive(Debug, Error)]
pub enum TokenStoreError {
    #[error("token file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("token serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Keychain(#[from] KeychainError),
}
