//! Auth coordinator: owns the current token pair and serialises refreshes
//!
//! Every component that needs an access token goes through one
//! [`AuthCoordinator`]:
//! 1. Reads are lock-free and never touch the network
//! 2. Refreshes take the refresh lock, so concurrent callers holding the same
//!    stale token produce exactly one token exchange
//! 3. Revocation clears the store under the same lock
//! 4. Once closed, every mutating operation fails with [`ClosedError`]

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use boxsdk_domain::{JwtSettings, Subject, TokenPair};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::client::OAuthClient;
use super::error::AuthError;
use super::grants::{
    AuthorizationCodeGrant, ClientCredentialsGrant, DeveloperTokenGrant, JwtGrant,
    RefreshTokenGrant,
};
use super::storage::InMemoryTokenStore;
use super::traits::{GrantStrategy, TokenEndpoint, TokenStore};
use super::types::GrantRequest;
use crate::error::ClosedError;
use crate::resilience::BackoffPolicy;

/// Single owner of the token lifecycle for one set of credentials
///
/// Shared between tasks as `Arc<AuthCoordinator>`.
pub struct AuthCoordinator {
    strategy: Arc<dyn GrantStrategy>,
    endpoint: Arc<dyn TokenEndpoint>,
    store: Arc<dyn TokenStore>,
    refresh_lock: Mutex<()>,
    closed: AtomicBool,
}

impl AuthCoordinator {
    /// Create an open coordinator from its three collaborators.
    #[must_use]
    pub fn new(
        strategy: Arc<dyn GrantStrategy>,
        endpoint: Arc<dyn TokenEndpoint>,
        store: Arc<dyn TokenStore>,
    ) -> Self {
        Self { strategy, endpoint, store, refresh_lock: Mutex::new(()), closed: AtomicBool::new(false) }
    }

    /// Three-legged OAuth: refreshes use the stored refresh token.
    ///
    /// The store is usually seeded by [`authenticate`](Self::authenticate)
    /// or by a previous run (file or keychain store).
    #[must_use]
    pub fn oauth2(client: OAuthClient, store: Arc<dyn TokenStore>) -> Self {
        Self::new(Arc::new(RefreshTokenGrant), Arc::new(client), store)
    }

    /// Server auth with a signed JWT assertion for `settings.subject`.
    ///
    /// # Errors
    /// Returns `AuthError::Assertion` if the private key cannot be loaded
    pub fn jwt(client: OAuthClient, settings: JwtSettings) -> Result<Self, AuthError> {
        let backoff = BackoffPolicy::from_settings(&client.config().retry);
        let grant = JwtGrant::new(settings, backoff)?;
        Ok(Self::new(Arc::new(grant), Arc::new(client), Arc::new(InMemoryTokenStore::new())))
    }

    /// Server auth with client credentials for an enterprise or a user.
    #[must_use]
    pub fn client_credentials(client: OAuthClient, subject: Subject) -> Self {
        Self::new(
            Arc::new(ClientCredentialsGrant::new(subject)),
            Arc::new(client),
            Arc::new(InMemoryTokenStore::new()),
        )
    }

    /// Fixed developer token; it cannot be refreshed.
    #[must_use]
    pub fn developer_token(client: OAuthClient, token: impl Into<String>) -> Self {
        let store = InMemoryTokenStore::with_pair(TokenPair::new(token, None));
        Self::new(Arc::new(DeveloperTokenGrant), Arc::new(client), Arc::new(store))
    }

    /// Name of the grant strategy, for logs.
    #[must_use]
    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// Currently stored pair. Never touches the network.
    ///
    /// # Errors
    /// Returns `AuthError::Storage` if the store cannot be read
    pub fn get_current_token(&self) -> Result<Option<TokenPair>, AuthError> {
        Ok(self.store.get()?)
    }

    /// Convenience accessor for the current access token.
    ///
    /// # Errors
    /// Returns `AuthError::Storage` if the store cannot be read
    pub fn access_token(&self) -> Result<Option<String>, AuthError> {
        Ok(self.get_current_token()?.map(|pair| pair.access_token))
    }

    /// Replace the stored pair, e.g. with tokens obtained out of band.
    ///
    /// # Errors
    /// - `AuthError::Closed` after `close`
    /// - `AuthError::Storage` if the store cannot be written
    pub async fn store(&self, pair: TokenPair) -> Result<(), AuthError> {
        self.ensure_open()?;
        let _guard = self.refresh_lock.lock().await;
        self.store.store(&pair)?;
        Ok(())
    }

    /// Exchange an authorization code and store the resulting pair.
    ///
    /// # Errors
    /// - `AuthError::Closed` after `close`
    /// - `AuthError::Rejected` / `AuthError::Transport` from the exchange
    pub async fn authenticate(&self, auth_code: &str) -> Result<TokenPair, AuthError> {
        self.ensure_open()?;
        let _guard = self.refresh_lock.lock().await;
        self.ensure_open()?;

        info!("Exchanging authorization code");
        let pair =
            AuthorizationCodeGrant::new(auth_code).exchange(self.endpoint.as_ref(), None).await?;
        self.store.store(&pair)?;
        Ok(pair)
    }

    /// Obtain a fresh token pair, at most one exchange at a time
    ///
    /// # Arguments
    /// * `stale_access_token` - Access token the caller saw fail, or `None`
    ///   when the caller has no token yet
    ///
    /// # Returns
    /// The stored pair when it differs from `stale_access_token` (another
    /// caller already refreshed), otherwise the pair from a new exchange.
    ///
    /// # Errors
    /// - `AuthError::Closed` if closed before or while waiting for the lock
    /// - any error of the grant exchange; the store is left untouched
    pub async fn refresh(&self, stale_access_token: Option<&str>) -> Result<TokenPair, AuthError> {
        self.ensure_open()?;
        let _guard = self.refresh_lock.lock().await;
        self.ensure_open()?;

        let current = self.store.get()?;
        if let Some(pair) = &current {
            if stale_access_token != Some(pair.access_token.as_str()) {
                debug!(strategy = self.strategy.name(), "Token already refreshed, reusing it");
                return Ok(pair.clone());
            }
        }

        info!(strategy = self.strategy.name(), "Refreshing access token");
        let pair = self.strategy.exchange(self.endpoint.as_ref(), current.as_ref()).await?;
        self.store.store(&pair)?;
        Ok(pair)
    }

    /// Revoke the current token and clear the store.
    ///
    /// The store is cleared even when the revoke call fails; the failure is
    /// still returned.
    ///
    /// # Errors
    /// - `AuthError::Closed` after `close`
    /// - `AuthError::Rejected` for a non-2xx revoke answer
    pub async fn revoke(&self) -> Result<(), AuthError> {
        self.ensure_open()?;
        self.revoke_inner().await
    }

    async fn revoke_inner(&self) -> Result<(), AuthError> {
        let _guard = self.refresh_lock.lock().await;

        let Some(pair) = self.store.get()? else {
            debug!("No token to revoke");
            return Ok(());
        };
        let token = if pair.access_token.is_empty() {
            pair.refresh_token
        } else {
            Some(pair.access_token)
        };

        let result = match token {
            Some(token) => self.endpoint.revoke_token(&token).await,
            None => Ok(()),
        };
        if let Err(err) = &result {
            warn!(error = %err, "Token revocation failed, clearing local tokens anyway");
        } else {
            info!("Token revoked");
        }
        self.store.clear()?;
        result
    }

    /// Exchange the current access token for a narrower one
    ///
    /// # Arguments
    /// * `scopes` - Scopes the new token is limited to
    /// * `resource` - Optional full URL of the file or folder
    /// * `shared_link` - Optional shared link the token is restricted to
    ///
    /// The downscoped pair is returned and never stored.
    ///
    /// # Errors
    /// - `AuthError::Closed` after `close`
    /// - errors from the implicit refresh when no token is held yet
    /// - `AuthError::Rejected` / `AuthError::Transport` from the exchange
    pub async fn downscope_token(
        &self,
        scopes: &[&str],
        resource: Option<&str>,
        shared_link: Option<&str>,
    ) -> Result<TokenPair, AuthError> {
        self.ensure_open()?;
        let current = match self.get_current_token()? {
            Some(pair) => pair,
            None => self.refresh(None).await?,
        };

        debug!(scopes = ?scopes, "Downscoping access token");
        let request = GrantRequest::TokenExchange {
            subject_token: current.access_token,
            scopes: scopes.iter().map(|s| (*s).to_string()).collect(),
            resource: resource.map(str::to_string),
            shared_link: shared_link.map(str::to_string),
        };
        self.endpoint.request_token(&request).await
    }

    /// Coordinator for the same application acting as another subject.
    ///
    /// The new coordinator shares the endpoint but starts with an empty
    /// in-memory store.
    ///
    /// # Errors
    /// Returns `AuthError::Unsupported` for grants bound to one user
    /// (OAuth 2, developer token)
    pub fn with_subject(&self, subject: Subject) -> Result<Self, AuthError> {
        let strategy = self.strategy.for_subject(subject).ok_or_else(|| {
            AuthError::Unsupported(format!(
                "{} grant cannot switch subjects",
                self.strategy.name()
            ))
        })?;
        Ok(Self::new(strategy, Arc::clone(&self.endpoint), Arc::new(InMemoryTokenStore::new())))
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Close the coordinator, optionally revoking the current token first.
    ///
    /// Closing is idempotent. Revocation still runs on an already closed
    /// coordinator.
    ///
    /// # Errors
    /// Returns the revoke failure when `revoke` is set
    pub async fn close(&self, revoke: bool) -> Result<(), AuthError> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            info!(strategy = self.strategy.name(), "Closing auth coordinator");
        }
        if revoke {
            self.revoke_inner().await?;
        }
        Ok(())
    }

    /// Run `f` with this coordinator, then close it
    ///
    /// The coordinator ends up closed on every exit path: normal return,
    /// panic inside `f`, or the returned future being dropped.
    ///
    /// # Errors
    /// Returns the revoke failure from `close` when `revoke` is set
    pub async fn closing<F, Fut, T>(self: &Arc<Self>, revoke: bool, f: F) -> Result<T, AuthError>
    where
        F: FnOnce(Arc<Self>) -> Fut,
        Fut: Future<Output = T>,
    {
        let guard = CloseOnDrop(Arc::clone(self));
        let value = f(Arc::clone(self)).await;
        self.close(revoke).await?;
        drop(guard);
        Ok(value)
    }

    fn ensure_open(&self) -> Result<(), ClosedError> {
        if self.is_closed() {
            Err(ClosedError)
        } else {
            Ok(())
        }
    }
}

impl std::fmt::Debug for AuthCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthCoordinator")
            .field("strategy", &self.strategy.name())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

struct CloseOnDrop(Arc<AuthCoordinator>);

impl Drop for CloseOnDrop {
    fn drop(&mut self) {
        self.0.closed.store(true, Ordering::SeqCst);
    }
}
