//! Traits at the seams of the auth layer
//!
//! These traits enable dependency injection and testing by abstracting the
//! token endpoint, token persistence and the grant algorithm.

use std::sync::Arc;

use async_trait::async_trait;
use boxsdk_domain::{Subject, TokenPair};

use super::error::{AuthError, TokenStoreError};
use super::types::GrantRequest;

/// Persistence for the current token pair
///
/// A passive collaborator: no network access and no validation.
pub trait TokenStore: Send + Sync {
    /// # Errors
    /// Returns `TokenStoreError` if the backing storage cannot be read
    fn get(&self) -> Result<Option<TokenPair>, TokenStoreError>;

    /// # Errors
    /// Returns `TokenStoreError` if the backing storage cannot be written
    fn store(&self, pair: &TokenPair) -> Result<(), TokenStoreError>;

    /// # Errors
    /// Returns `TokenStoreError` if the backing storage cannot be cleared
    fn clear(&self) -> Result<(), TokenStoreError>;
}

/// The two OAuth endpoints the auth layer talks to
#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    /// Perform one `POST {oauth}/token` exchange.
    ///
    /// # Errors
    /// - `AuthError::Rejected` for non-2xx responses
    /// - `AuthError::Transport` if no response arrived
    /// - `AuthError::MalformedResponse` if required token fields are missing
    async fn request_token(&self, request: &GrantRequest) -> Result<TokenPair, AuthError>;

    /// Revoke one access or refresh token at `POST {oauth}/revoke`.
    ///
    /// # Errors
    /// Returns `AuthError::Rejected` for non-2xx responses
    async fn revoke_token(&self, token: &str) -> Result<(), AuthError>;
}

/// Algorithm that turns some proof into a fresh token pair
#[async_trait]
pub trait GrantStrategy: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Grant parameters for the next exchange.
    ///
    /// # Arguments
    /// * `current` - Pair held when the refresh started, if any
    ///
    /// # Errors
    /// Returns `AuthError` when the strategy cannot produce a request
    /// (missing refresh token, expired developer token, signing failure)
    fn build_grant_request(&self, current: Option<&TokenPair>) -> Result<GrantRequest, AuthError>;

    /// Run the exchange. Strategies with their own retry policy override this.
    ///
    /// # Errors
    /// Propagates errors from `build_grant_request` and the endpoint
    async fn exchange(
        &self,
        endpoint: &dyn TokenEndpoint,
        current: Option<&TokenPair>,
    ) -> Result<TokenPair, AuthError> {
        let request = self.build_grant_request(current)?;
        endpoint.request_token(&request).await
    }

    /// Same strategy issuing tokens for another subject, when supported.
    fn for_subject(&self, _subject: Subject) -> Option<Arc<dyn GrantStrategy>> {
        None
    }
}
