use boxsdk_domain::TokenPair;

use crate::auth::error::AuthError;
use crate::auth::traits::GrantStrategy;
use crate::auth::types::GrantRequest;

/// Three-legged OAuth refresh using the refresh token of the current pair.
#[derive(Debug, Clone, Copy, Default)]
pub struct RefreshTokenGrant;

impl GrantStrategy for RefreshTokenGrant {
    fn name(&self) -> &'static str {
        "refresh_token"
    }

    fn build_grant_request(&self, current: Option<&TokenPair>) -> Result<GrantRequest, AuthError> {
        let refresh_token = current
            .and_then(|pair| pair.refresh_token.clone())
            .ok_or(AuthError::NoRefreshToken)?;
        Ok(GrantRequest::RefreshToken { refresh_token })
    }
}
