//! Grant requests and token endpoint payloads
//!
//! A [`GrantRequest`] is built fresh for every exchange attempt and turned
//! into the form body of `POST {oauth}/token`.

use boxsdk_domain::constants::{
    GRANT_TYPE_AUTHORIZATION_CODE, GRANT_TYPE_CLIENT_CREDENTIALS, GRANT_TYPE_JWT_BEARER,
    GRANT_TYPE_REFRESH_TOKEN, GRANT_TYPE_TOKEN_EXCHANGE, TOKEN_TYPE_ACCESS_TOKEN,
};
use boxsdk_domain::{ClientCredentials, DeviceInfo, Subject, TokenPair};
use serde::Deserialize;

use super::error::AuthError;

/// Grant-specific parameters of one token exchange
#[derive(Clone, PartialEq, Eq)]
pub enum GrantRequest {
    AuthorizationCode { code: String },
    RefreshToken { refresh_token: String },
    JwtBearer { assertion: String },
    ClientCredentials { subject: Subject },
    /// Downscoping an existing access token
    TokenExchange {
        subject_token: String,
        scopes: Vec<String>,
        resource: Option<String>,
        shared_link: Option<String>,
    },
}

impl GrantRequest {
    #[must_use]
    pub const fn grant_type(&self) -> &'static str {
        match self {
            Self::AuthorizationCode { .. } => GRANT_TYPE_AUTHORIZATION_CODE,
            Self::RefreshToken { .. } => GRANT_TYPE_REFRESH_TOKEN,
            Self::JwtBearer { .. } => GRANT_TYPE_JWT_BEARER,
            Self::ClientCredentials { .. } => GRANT_TYPE_CLIENT_CREDENTIALS,
            Self::TokenExchange { .. } => GRANT_TYPE_TOKEN_EXCHANGE,
        }
    }

    /// Only the three-legged grants are answered with a refresh token.
    #[must_use]
    pub const fn expects_refresh_token(&self) -> bool {
        matches!(self, Self::AuthorizationCode { .. } | Self::RefreshToken { .. })
    }

    /// Form body for the token endpoint.
    #[must_use]
    pub fn to_form(
        &self,
        credentials: &ClientCredentials,
        device: &DeviceInfo,
    ) -> Vec<(&'static str, String)> {
        let mut form = vec![("grant_type", self.grant_type().to_string())];
        match self {
            Self::AuthorizationCode { code } => {
                form.push(("code", code.clone()));
                push_client(&mut form, credentials);
                push_device(&mut form, device);
            }
            Self::RefreshToken { refresh_token } => {
                form.push(("refresh_token", refresh_token.clone()));
                push_client(&mut form, credentials);
                push_device(&mut form, device);
            }
            Self::JwtBearer { assertion } => {
                form.push(("assertion", assertion.clone()));
                push_client(&mut form, credentials);
            }
            Self::ClientCredentials { subject } => {
                push_client(&mut form, credentials);
                form.push(("box_subject_type", subject.subject_type().to_string()));
                form.push(("box_subject_id", subject.id().to_string()));
            }
            Self::TokenExchange { subject_token, scopes, resource, shared_link } => {
                form.push(("subject_token", subject_token.clone()));
                form.push(("subject_token_type", TOKEN_TYPE_ACCESS_TOKEN.to_string()));
                if !scopes.is_empty() {
                    form.push(("scope", scopes.join(" ")));
                }
                if let Some(resource) = resource {
                    form.push(("resource", resource.clone()));
                }
                if let Some(link) = shared_link {
                    form.push(("box_shared_link", link.clone()));
                }
            }
        }
        form
    }
}

fn push_client(form: &mut Vec<(&'static str, String)>, credentials: &ClientCredentials) {
    form.push(("client_id", credentials.client_id.clone()));
    form.push(("client_secret", credentials.client_secret.clone()));
}

fn push_device(form: &mut Vec<(&'static str, String)>, device: &DeviceInfo) {
    if !device.id.is_empty() {
        form.push(("box_device_id", device.id.clone()));
    }
    if !device.name.is_empty() {
        form.push(("box_device_name", device.name.clone()));
    }
}

// Grant payloads carry secrets; only the grant type is printed.
impl std::fmt::Debug for GrantRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GrantRequest").field("grant_type", &self.grant_type()).finish_non_exhaustive()
    }
}

/// Token endpoint success body
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
    pub token_type: Option<String>,
    pub restricted_to: Option<serde_json::Value>,
}

impl TokenResponse {
    /// Validate required fields and convert.
    ///
    /// # Errors
    /// Returns `AuthError::MalformedResponse` when `access_token` is missing,
    /// or `refresh_token` is missing while `expect_refresh_token` is set.
    pub fn into_token_pair(self, expect_refresh_token: bool) -> Result<TokenPair, AuthError> {
        let access_token = self
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AuthError::MalformedResponse("missing access_token".to_string()))?;
        if expect_refresh_token && self.refresh_token.is_none() {
            return Err(AuthError::MalformedResponse("missing refresh_token".to_string()));
        }
        Ok(TokenPair { access_token, refresh_token: self.refresh_token, expires_in: self.expires_in })
    }
}
