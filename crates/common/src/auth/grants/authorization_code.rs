use boxsdk_domain::TokenPair;

use crate::auth::error::AuthError;
use crate::auth::traits::GrantStrategy;
use crate::auth::types::GrantRequest;

/// One-shot exchange of the code returned to the redirect URI.
#[derive(Clone)]
pub struct AuthorizationCodeGrant {
    code: String,
}

impl AuthorizationCodeGrant {
    pub fn new(code: impl Into<String>) -> Self {
        Self { code: code.into() }
    }
}

impl GrantStrategy for AuthorizationCodeGrant {
    fn name(&self) -> &'static str {
        "authorization_code"
    }

    fn build_grant_request(&self, _current: Option<&TokenPair>) -> Result<GrantRequest, AuthError> {
        Ok(GrantRequest::AuthorizationCode { code: self.code.clone() })
    }
}
