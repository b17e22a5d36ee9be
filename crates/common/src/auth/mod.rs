//! Box OAuth 2.0 token infrastructure
//!
//! This module owns everything between "I need an access token" and the
//! Box token endpoint: grant strategies, token persistence and the
//! coordinator that serialises refreshes.
//!
//! # Features
//!
//! - **Single-flight refresh**: concurrent callers holding the same stale
//!   token share one token exchange
//! - **Grant strategies**: authorization code, refresh token, JWT (with
//!   server clock-skew correction), client credentials, developer token
//! - **Token stores**: in-memory, JSON file, cached file, platform keychain
//! - **Downscoping**: token exchange for narrower, unstored tokens
//! - **Explicit lifecycle**: `close` / `closing` with optional revocation
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │ AuthCoordinator  │  Token lifecycle + refresh lock
//! └────────┬─────────┘
//!          │
//!          ├──► GrantStrategy   (builds the grant request, may retry)
//!          ├──► TokenEndpoint   (OAuthClient: POST /token, POST /revoke)
//!          └──► TokenStore      (memory, file, keychain)
//! ```
//!
//! # Usage Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use boxsdk_common::auth::{AuthCoordinator, OAuthClient};
//! use boxsdk_domain::{ClientConfig, ClientCredentials, Subject};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = OAuthClient::new(
//!         Arc::new(ClientConfig::default()),
//!         ClientCredentials::new("client_id", "client_secret"),
//!     )?;
//!     let auth = Arc::new(AuthCoordinator::client_credentials(
//!         client,
//!         Subject::EnterpriseId("123".to_string()),
//!     ));
//!
//!     let pair = auth.refresh(None).await?;
//!     println!("Access token expires in {:?} seconds", pair.expires_in);
//!
//!     auth.close(true).await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod coordinator;
pub mod error;
pub mod grants;
pub mod keychain;
pub mod storage;
pub mod traits;
pub mod types;

pub use client::OAuthClient;
pub use coordinator::AuthCoordinator;
pub use error::{AuthError, RejectedResponse, TokenStoreError};
pub use grants::{
    AuthorizationCodeGrant, ClientCredentialsGrant, DeveloperTokenGrant, JwtClaims, JwtGrant,
    RefreshTokenGrant,
};
pub use keychain::KeychainTokenStore;
pub use storage::{FileTokenStore, FileWithInMemoryCacheTokenStore, InMemoryTokenStore};
pub use traits::{GrantStrategy, TokenEndpoint, TokenStore};
pub use types::{GrantRequest, TokenResponse};
