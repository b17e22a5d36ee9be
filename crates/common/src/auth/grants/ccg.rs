use std::sync::Arc;

use boxsdk_domain::{Subject, TokenPair};

use crate::auth::error::AuthError;
use crate::auth::traits::GrantStrategy;
use crate::auth::types::GrantRequest;

/// Client-credentials grant for an enterprise service account or an app user.
#[derive(Debug, Clone)]
pub struct ClientCredentialsGrant {
    subject: Subject,
}

impl ClientCredentialsGrant {
    #[must_use]
    pub const fn new(subject: Subject) -> Self {
        Self { subject }
    }

    #[must_use]
    pub const fn subject(&self) -> &Subject {
        &self.subject
    }
}

impl GrantStrategy for ClientCredentialsGrant {
    fn name(&self) -> &'static str {
        "client_credentials"
    }

    fn build_grant_request(&self, _current: Option<&TokenPair>) -> Result<GrantRequest, AuthError> {
        Ok(GrantRequest::ClientCredentials { subject: self.subject.clone() })
    }

    fn for_subject(&self, subject: Subject) -> Option<Arc<dyn GrantStrategy>> {
        Some(Arc::new(Self::new(subject)))
    }
}
