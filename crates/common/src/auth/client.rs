//! HTTP client for the Box OAuth endpoints
//!
//! Handles the two network calls of the auth layer:
//! - `POST {oauth}/token` for every grant exchange
//! - `POST {oauth}/revoke` for token revocation
//!
//! plus the browser authorization URL for the three-legged flow.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use boxsdk_domain::constants::{CSRF_TOKEN_PREFIX, CSRF_TOKEN_RANDOM_LENGTH};
use boxsdk_domain::{ClientConfig, ClientCredentials, TokenPair};
use rand::distributions::{Alphanumeric, DistString};
use reqwest::header::{HeaderName, DATE, RETRY_AFTER};
use reqwest::{Client, Response};
use tracing::{debug, warn};
use url::Url;

use super::error::{AuthError, RejectedResponse};
use super::traits::TokenEndpoint;
use super::types::{GrantRequest, TokenResponse};

/// Box OAuth client
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct OAuthClient {
    config: Arc<ClientConfig>,
    credentials: ClientCredentials,
    client: Client,
}

impl OAuthClient {
    /// Create a client honouring the configured timeout and proxy.
    ///
    /// # Errors
    /// Returns `AuthError::Transport` if the HTTP client cannot be built, or
    /// `AuthError::Unsupported` for an incomplete proxy configuration.
    pub fn new(config: Arc<ClientConfig>, credentials: ClientCredentials) -> Result<Self, AuthError> {
        let mut builder = Client::builder().timeout(Duration::from_secs(config.timeout_secs));
        if let Some(proxy) = &config.proxy {
            let proxy_url =
                proxy.proxy_url().map_err(|e| AuthError::Unsupported(e.to_string()))?;
            builder = builder.proxy(reqwest::Proxy::all(proxy_url)?);
        }
        let client = builder.user_agent(config.user_agent.clone()).build()?;
        Ok(Self { config, credentials, client })
    }

    /// Reuse an existing reqwest client (shared pools, custom TLS).
    #[must_use]
    pub fn with_http_client(
        config: Arc<ClientConfig>,
        credentials: ClientCredentials,
        client: Client,
    ) -> Self {
        Self { config, credentials, client }
    }

    #[must_use]
    pub fn credentials(&self) -> &ClientCredentials {
        &self.credentials
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Generate the browser authorization URL for the three-legged flow
    ///
    /// # Arguments
    /// * `redirect_uri` - Optional override of the redirect registered for
    ///   the application
    ///
    /// # Returns
    /// Tuple of (authorization_url, csrf_state); the state must be compared
    /// with the one echoed back to the redirect URI.
    ///
    /// # Errors
    /// Returns `AuthError::Unsupported` if the configured authorize URL is
    /// not a valid URL
    pub fn authorization_url(&self, redirect_uri: Option<&str>) -> Result<(String, String), AuthError> {
        let state = format!(
            "{CSRF_TOKEN_PREFIX}{}",
            Alphanumeric.sample_string(&mut rand::thread_rng(), CSRF_TOKEN_RANDOM_LENGTH)
        );

        let mut params = vec![
            ("state", state.as_str()),
            ("response_type", "code"),
            ("client_id", self.credentials.client_id.as_str()),
        ];
        if let Some(uri) = redirect_uri {
            params.push(("redirect_uri", uri));
        }

        let url = Url::parse_with_params(&self.config.authorize_url, &params)
            .map_err(|e| AuthError::Unsupported(format!("invalid authorize URL: {e}")))?;
        Ok((url.into(), state))
    }

    async fn reject(response: Response) -> AuthError {
        let status = response.status().as_u16();
        let header = |name: HeaderName| {
            response.headers().get(name).and_then(|v| v.to_str().ok()).map(str::to_string)
        };
        let retry_after = header(RETRY_AFTER);
        let date = header(DATE);
        let body = response.bytes().await.unwrap_or_default();
        RejectedResponse::from_parts(status, retry_after, date, &body).into()
    }
}

#[async_trait]
impl TokenEndpoint for OAuthClient {
    async fn request_token(&self, request: &GrantRequest) -> Result<TokenPair, AuthError> {
        let grant_type = request.grant_type();
        debug!(grant_type, "Requesting token");

        let form = request.to_form(&self.credentials, &self.config.device);
        let response = self.client.post(self.config.token_url()).form(&form).send().await?;

        if !response.status().is_success() {
            let error = Self::reject(response).await;
            warn!(grant_type, error = %error, "Token request rejected");
            return Err(error);
        }

        let body = response.bytes().await?;
        let token_response: TokenResponse = serde_json::from_slice(&body)
            .map_err(|e| AuthError::MalformedResponse(format!("invalid token JSON: {e}")))?;
        token_response.into_token_pair(request.expects_refresh_token())
    }

    async fn revoke_token(&self, token: &str) -> Result<(), AuthError> {
        debug!("Revoking token");

        let form = [
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("token", token),
        ];
        let response = self.client.post(self.config.revoke_url()).form(&form).send().await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::reject(response).await)
        }
    }
}
