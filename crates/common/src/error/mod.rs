//! Shared error classification for the auth and session layers
//!
//! Each layer owns its concrete error enum (`AuthError`, `ApiError`, ...);
//! this module provides what they have in common:
//!
//! - [`ErrorClassification`]: retryability, severity and retry hints
//! - [`ErrorSeverity`]: levels for logging and alerting
//! - [`ErrorBody`]: the Box JSON error body parser used for both token
//!   endpoint failures and resource call failures
//! - [`ClosedError`]: raised by any token operation after `close`

use std::fmt;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

/// Raised when a token operation is attempted on a closed auth object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Error)]
#[error("auth object has been closed")]
pub struct ClosedError;

/// Trait for classifying errors by their characteristics
///
/// Implemented by every public error enum so callers can decide on further
/// action without matching on variants.
pub trait ErrorClassification {
    /// Check if this error is retryable
    ///
    /// Retryable errors are transient: rate limiting, 5xx responses, or a
    /// transport failure that produced no response.
    fn is_retryable(&self) -> bool;

    /// Get the error severity level
    fn severity(&self) -> ErrorSeverity;

    /// Check if this is a critical error requiring immediate attention
    fn is_critical(&self) -> bool {
        self.severity() == ErrorSeverity::Critical
    }

    /// Get the suggested retry delay if applicable
    ///
    /// Returns `Some(Duration)` when the server sent a numeric `Retry-After`.
    fn retry_after(&self) -> Option<Duration>;
}

/// Error severity levels for monitoring and alerting
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Informational, typically for debugging
    Info,
    /// Warning, should be monitored but not critical
    Warning,
    /// Error, requires attention and action
    Error,
    /// Critical, immediate action required
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Fields extracted from a Box error response body.
///
/// Box returns `{code, message, request_id, context_info}` from resource
/// endpoints and `{error, error_description}` from the OAuth endpoints; both
/// shapes are folded into the same fields. Bodies that are not a JSON object
/// keep their raw text as the message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorBody {
    pub code: Option<String>,
    pub message: Option<String>,
    pub request_id: Option<String>,
    pub context_info: Option<Value>,
    pub is_json: bool,
}

impl ErrorBody {
    #[must_use]
    pub fn parse(content: &[u8]) -> Self {
        match serde_json::from_slice::<Value>(content) {
            Ok(Value::Object(map)) => {
                let text = |key: &str| map.get(key).and_then(value_as_string);
                Self {
                    code: text("code").or_else(|| text("error")),
                    message: text("message").or_else(|| text("error_description")),
                    request_id: text("request_id"),
                    context_info: map.get("context_info").cloned(),
                    is_json: true,
                }
            }
            _ => Self {
                message: Some(String::from_utf8_lossy(content).into_owned()),
                ..Self::default()
            },
        }
    }
}

fn value_as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// Parse a `Retry-After` header holding a number of seconds.
///
/// HTTP-date values, negatives, non-finite numbers and values too large for
/// a `Duration` yield `None`.
#[must_use]
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let seconds: f64 = value.trim().parse().ok()?;
    Duration::try_from_secs_f64(seconds).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_resource_error_body() {
        let body = br#"{"type":"error","status":404,"code":"not_found","message":"Not Found",
            "request_id":"abc123","context_info":{"errors":[]}}"#;
        let parsed = ErrorBody::parse(body);
        assert!(parsed.is_json);
        assert_eq!(parsed.code.as_deref(), Some("not_found"));
        assert_eq!(parsed.message.as_deref(), Some("Not Found"));
        assert_eq!(parsed.request_id.as_deref(), Some("abc123"));
        assert!(parsed.context_info.is_some());
    }

    #[test]
    fn parses_oauth_error_body() {
        let body = br#"{"error":"invalid_grant","error_description":"Current date/time MUST be before the expiration date/time listed in the 'exp' claim"}"#;
        let parsed = ErrorBody::parse(body);
        assert_eq!(parsed.code.as_deref(), Some("invalid_grant"));
        assert!(parsed.message.unwrap_or_default().contains("'exp'"));
        assert_eq!(parsed.request_id, None);
    }

    #[test]
    fn falls_back_to_raw_content() {
        let parsed = ErrorBody::parse(b"<html>Bad Gateway</html>");
        assert!(!parsed.is_json);
        assert_eq!(parsed.message.as_deref(), Some("<html>Bad Gateway</html>"));
        assert_eq!(parsed.code, None);
    }

    #[test]
    fn retry_after_accepts_numbers_only() {
        assert_eq!(parse_retry_after("5"), Some(Duration::from_secs(5)));
        assert_eq!(parse_retry_after(" 1.5 "), Some(Duration::from_millis(1500)));
        assert_eq!(parse_retry_after("-1"), None);
        assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"), None);
    }

    #[test]
    fn retry_after_out_of_range_is_ignored() {
        assert_eq!(parse_retry_after("1e20"), None);
        assert_eq!(parse_retry_after("inf"), None);
        assert_eq!(parse_retry_after("NaN"), None);
    }

    #[test]
    fn severity_display_and_order() {
        assert_eq!(ErrorSeverity::Critical.to_string(), "CRITICAL");
        assert!(ErrorSeverity::Warning < ErrorSeverity::Error);
    }
}
