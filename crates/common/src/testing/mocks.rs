//! Mock implementations of the auth layer's external dependencies.

#![cfg(feature = "platform")]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use boxsdk_domain::TokenPair;
use parking_lot::Mutex;

use crate::auth::{AuthError, GrantRequest, RejectedResponse, TokenEndpoint};
use crate::security::{KeychainError, SecretStore};

/// Scripted token endpoint that never touches the network.
///
/// Queued outcomes are consumed in order; once the queue is empty every
/// exchange succeeds with `token-<n>` / `refresh-<n>`, where `n` counts
/// exchanges starting at 1.
#[derive(Debug, Default)]
pub struct MockTokenEndpoint {
    outcomes: Mutex<VecDeque<Result<TokenPair, RejectedResponse>>>,
    requests: Mutex<Vec<GrantRequest>>,
    revoked: Mutex<Vec<String>>,
    revoke_failure: Mutex<Option<RejectedResponse>>,
    exchanges: AtomicUsize,
    latency: Duration,
}

impl MockTokenEndpoint {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every exchange, widening race windows in concurrency tests.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn push_success(&self, pair: TokenPair) {
        self.outcomes.lock().push_back(Ok(pair));
    }

    pub fn push_rejection(&self, rejection: RejectedResponse) {
        self.outcomes.lock().push_back(Err(rejection));
    }

    pub fn fail_revocation(&self, rejection: RejectedResponse) {
        *self.revoke_failure.lock() = Some(rejection);
    }

    /// Number of token exchanges performed so far.
    #[must_use]
    pub fn token_requests(&self) -> usize {
        self.exchanges.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn requests(&self) -> Vec<GrantRequest> {
        self.requests.lock().clone()
    }

    #[must_use]
    pub fn revoked_tokens(&self) -> Vec<String> {
        self.revoked.lock().clone()
    }
}

#[async_trait]
impl TokenEndpoint for MockTokenEndpoint {
    async fn request_token(&self, request: &GrantRequest) -> Result<TokenPair, AuthError> {
        let n = self.exchanges.fetch_add(1, Ordering::SeqCst) + 1;
        self.requests.lock().push(request.clone());
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let scripted = self.outcomes.lock().pop_front();
        match scripted {
            Some(Ok(pair)) => Ok(pair),
            Some(Err(rejection)) => Err(rejection.into()),
            None => Ok(TokenPair::new(format!("token-{n}"), Some(format!("refresh-{n}")))),
        }
    }

    async fn revoke_token(&self, token: &str) -> Result<(), AuthError> {
        self.revoked.lock().push(token.to_string());
        match self.revoke_failure.lock().clone() {
            Some(rejection) => Err(rejection.into()),
            None => Ok(()),
        }
    }
}

/// Shared type for the in-memory keychain storage.
type StorageData = Arc<Mutex<HashMap<String, String>>>;

/// In-memory keychain replacement.
#[derive(Debug, Clone)]
pub struct MockKeychainProvider {
    storage: StorageData,
    service_name: String,
}

impl MockKeychainProvider {
    /// Create a new mock keychain provider with a service name for namespacing.
    pub fn new(service_name: impl Into<String>) -> Self {
        Self { storage: Arc::new(Mutex::new(HashMap::new())), service_name: service_name.into() }
    }

    #[must_use]
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Determine whether a secret exists.
    #[must_use]
    pub fn secret_exists(&self, key: &str) -> bool {
        self.storage.lock().contains_key(key)
    }
}

impl Default for MockKeychainProvider {
    fn default() -> Self {
        Self::new("box-sdk-test")
    }
}

impl SecretStore for MockKeychainProvider {
    fn set_secret(&self, key: &str, value: &str) -> Result<(), KeychainError> {
        self.storage.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn get_secret(&self, key: &str) -> Result<String, KeychainError> {
        self.storage.lock().get(key).cloned().ok_or(KeychainError::NotFound)
    }

    fn delete_secret(&self, key: &str) -> Result<(), KeychainError> {
        self.storage.lock().remove(key);
        Ok(())
    }
}
