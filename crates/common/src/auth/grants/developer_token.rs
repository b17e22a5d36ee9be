use boxsdk_domain::TokenPair;

use crate::auth::error::AuthError;
use crate::auth::traits::GrantStrategy;
use crate::auth::types::GrantRequest;

/// Short-lived token pasted from the developer console.
///
/// There is nothing to exchange: once the token stops working the caller has
/// to supply a new one.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeveloperTokenGrant;

impl GrantStrategy for DeveloperTokenGrant {
    fn name(&self) -> &'static str {
        "developer_token"
    }

    fn build_grant_request(&self, _current: Option<&TokenPair>) -> Result<GrantRequest, AuthError> {
        Err(AuthError::DeveloperTokenExpired)
    }
}
