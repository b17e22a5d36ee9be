//! Testing utilities for the session layer
//!
//! [`MockTransport`] replays scripted responses and records every request it
//! receives, so retry and refresh behaviour can be asserted at the envelope
//! level without a network.
//!
//! ```rust,ignore
//! let transport = Arc::new(MockTransport::new());
//! transport.push(503, "");
//! transport.push_json(200, r#"{"id":"1"}"#);
//! let session = BoxSession::new(auth, transport.clone(), config)?;
//! session.get(session.api_url("files/1")).await?;
//! assert_eq!(transport.calls(), 2);
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::errors::TransportError;
use crate::http::{ResponseEnvelope, Transport, TransportRequest};

/// Scripted [`Transport`].
///
/// Outcomes are consumed in order; once the queue is empty every call gets
/// `200 {}`.
#[derive(Debug, Default)]
pub struct MockTransport {
    outcomes: Mutex<VecDeque<Result<ResponseEnvelope, String>>>,
    requests: Mutex<Vec<TransportRequest>>,
    calls: AtomicUsize,
}

impl MockTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, status: u16, body: &str) {
        self.push_response(ResponseEnvelope::new(status, HeaderMap::new(), body.as_bytes().to_vec()));
    }

    pub fn push_json(&self, status: u16, body: &str) {
        self.push_with_headers(status, &[("content-type", "application/json")], body);
    }

    pub fn push_with_headers(&self, status: u16, headers: &[(&'static str, &'static str)], body: &str) {
        let mut map = HeaderMap::new();
        for (name, value) in headers {
            map.insert(HeaderName::from_static(name), HeaderValue::from_static(value));
        }
        self.push_response(ResponseEnvelope::new(status, map, body.as_bytes().to_vec()));
    }

    pub fn push_response(&self, response: ResponseEnvelope) {
        self.outcomes.lock().push_back(Ok(response));
    }

    /// Queue a failure that never produced a response.
    pub fn push_error(&self, message: impl Into<String>) {
        self.outcomes.lock().push_back(Err(message.into()));
    }

    /// Number of attempts received so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn requests(&self) -> Vec<TransportRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn execute(&self, request: TransportRequest) -> Result<ResponseEnvelope, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request);
        match self.outcomes.lock().pop_front() {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(TransportError::Connection(message)),
            None => Ok(ResponseEnvelope::new(200, HeaderMap::new(), b"{}".to_vec())),
        }
    }
}
