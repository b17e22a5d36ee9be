//! Token store backed by the platform keychain.
//!
//! Each pair is written as up to three secrets under one account name:
//! `access.<account>`, `refresh.<account>` and `metadata.<account>`.

use std::sync::Arc;

use boxsdk_domain::TokenPair;
use serde_json::json;
use tracing::debug;

use crate::auth::error::TokenStoreError;
use crate::auth::traits::TokenStore;
use crate::security::{KeychainError, SecretStore};

const ACCESS_PREFIX: &str = "access.";
const REFRESH_PREFIX: &str = "refresh.";
const METADATA_PREFIX: &str = "metadata.";

/// [`TokenStore`] persisting pairs through a [`SecretStore`]
pub struct KeychainTokenStore<S: SecretStore> {
    secrets: Arc<S>,
    account: String,
}

impl<S: SecretStore> KeychainTokenStore<S> {
    /// # Arguments
    /// * `secrets` - Keychain provider (or mock) for the service
    /// * `account` - Logical account, e.g. the enterprise or user id
    pub fn new(secrets: Arc<S>, account: impl Into<String>) -> Self {
        Self { secrets, account: account.into() }
    }

    fn key(&self, prefix: &str) -> String {
        format!("{prefix}{}", self.account)
    }

    fn optional_secret(&self, prefix: &str) -> Result<Option<String>, KeychainError> {
        match self.secrets.get_secret(&self.key(prefix)) {
            Ok(value) => Ok(Some(value)),
            Err(KeychainError::NotFound) => Ok(None),
            Err(other) => Err(other),
        }
    }
}

impl<S: SecretStore> TokenStore for KeychainTokenStore<S> {
    fn get(&self) -> Result<Option<TokenPair>, TokenStoreError> {
        debug!(account = %self.account, "Retrieving tokens from keychain");

        let Some(access_token) = self.optional_secret(ACCESS_PREFIX)? else {
            return Ok(None);
        };
        let refresh_token = self.optional_secret(REFRESH_PREFIX)?;
        let expires_in = match self.optional_secret(METADATA_PREFIX)? {
            Some(raw) => {
                let metadata: serde_json::Value = serde_json::from_str(&raw)?;
                metadata.get("expires_in").and_then(serde_json::Value::as_i64)
            }
            None => None,
        };

        Ok(Some(TokenPair { access_token, refresh_token, expires_in }))
    }

    fn store(&self, pair: &TokenPair) -> Result<(), TokenStoreError> {
        debug!(account = %self.account, "Storing tokens in keychain");

        self.secrets.set_secret(&self.key(ACCESS_PREFIX), &pair.access_token)?;
        match &pair.refresh_token {
            Some(refresh) => self.secrets.set_secret(&self.key(REFRESH_PREFIX), refresh)?,
            None => self.secrets.delete_secret(&self.key(REFRESH_PREFIX))?,
        }
        let metadata = serde_json::to_string(&json!({ "expires_in": pair.expires_in }))?;
        self.secrets.set_secret(&self.key(METADATA_PREFIX), &metadata)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), TokenStoreError> {
        debug!(account = %self.account, "Clearing tokens from keychain");

        for prefix in [ACCESS_PREFIX, REFRESH_PREFIX, METADATA_PREFIX] {
            self.secrets.delete_secret(&self.key(prefix))?;
        }
        Ok(())
    }
}
