//! Server-auth grant signed with the application's RSA key
//!
//! Each exchange signs a fresh assertion whose `exp` is 30 seconds after
//! "now". The token endpoint rejects assertions whose `exp` is already past
//! by its own clock, so a skewed local clock is corrected once from the
//! response's `Date` header.
//!
//! Keys from the developer console arrive as encrypted PKCS#8 PEM plus a
//! passphrase; those are decrypted once when the grant is built.

use std::sync::Arc;

use async_trait::async_trait;
use boxsdk_domain::constants::{JWT_AUDIENCE, JWT_EXPIRATION_SECS, JWT_JTI_LENGTH};
use boxsdk_domain::{JwtAlgorithm, JwtSettings, Subject, TokenPair};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use pkcs8::der::Decode;
use pkcs8::{EncryptedPrivateKeyInfo, ObjectIdentifier, PrivateKeyInfo};
use rand::distributions::{Alphanumeric, DistString};
use serde::Serialize;
use tracing::{debug, warn};

use crate::auth::error::AuthError;
use crate::auth::traits::{GrantStrategy, TokenEndpoint};
use crate::auth::types::GrantRequest;
use crate::resilience::{BackoffPolicy, RetryState};

/// Claims of a Box JWT assertion
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JwtClaims {
    pub iss: String,
    pub sub: String,
    pub box_sub_type: String,
    pub aud: String,
    pub jti: String,
    pub exp: i64,
}

/// JWT-bearer grant for an enterprise or a user subject
#[derive(Clone)]
pub struct JwtGrant {
    settings: Arc<JwtSettings>,
    key: EncodingKey,
    subject: Subject,
    backoff: BackoffPolicy,
}

impl JwtGrant {
    /// # Errors
    /// Returns `AuthError::Assertion` if the private key is not an RSA PEM
    /// key, or is encrypted and cannot be opened with the passphrase.
    pub fn new(settings: JwtSettings, backoff: BackoffPolicy) -> Result<Self, AuthError> {
        let key = load_signing_key(&settings)?;
        let subject = settings.subject.clone();
        Ok(Self { settings: Arc::new(settings), key, subject, backoff })
    }

    #[must_use]
    pub const fn subject(&self) -> &Subject {
        &self.subject
    }

    #[must_use]
    pub fn claims(&self, now: DateTime<Utc>) -> JwtClaims {
        JwtClaims {
            iss: self.settings.credentials.client_id.clone(),
            sub: self.subject.id().to_string(),
            box_sub_type: self.subject.subject_type().to_string(),
            aud: JWT_AUDIENCE.to_string(),
            jti: Alphanumeric.sample_string(&mut rand::thread_rng(), JWT_JTI_LENGTH),
            exp: (now + ChronoDuration::seconds(JWT_EXPIRATION_SECS)).timestamp(),
        }
    }

    /// Sign an assertion expiring 30 seconds after `now`.
    ///
    /// # Errors
    /// Returns `AuthError::Assertion` if signing fails
    pub fn assertion(&self, now: DateTime<Utc>) -> Result<String, AuthError> {
        let mut header = Header::new(algorithm(self.settings.algorithm));
        header.kid = Some(self.settings.jwt_key_id.clone());
        encode(&header, &self.claims(now), &self.key)
            .map_err(|e| AuthError::Assertion(format!("signing failed: {e}")))
    }
}

const RSA_ENCRYPTION: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");
const ENCRYPTED_KEY_LABEL: &str = "ENCRYPTED PRIVATE KEY";

fn load_signing_key(settings: &JwtSettings) -> Result<EncodingKey, AuthError> {
    let pem = settings.private_key.trim();
    if !pem.contains(ENCRYPTED_KEY_LABEL) {
        return EncodingKey::from_rsa_pem(pem.as_bytes())
            .map_err(|e| AuthError::Assertion(format!("invalid RSA private key: {e}")));
    }

    let passphrase = settings.private_key_passphrase.as_deref().ok_or_else(|| {
        AuthError::Assertion("encrypted private key requires a passphrase".to_string())
    })?;
    let (label, document) = pkcs8::Document::from_pem(pem)
        .map_err(|e| AuthError::Assertion(format!("invalid encrypted private key: {e}")))?;
    if label != ENCRYPTED_KEY_LABEL {
        return Err(AuthError::Assertion(format!("unexpected PEM label {label:?}")));
    }
    let decrypted = EncryptedPrivateKeyInfo::from_der(document.as_bytes())
        .map_err(pkcs8::Error::from)
        .and_then(|info| info.decrypt(passphrase.as_bytes()))
        .map_err(|e| AuthError::Assertion(format!("cannot decrypt private key: {e}")))?;
    let info = PrivateKeyInfo::from_der(decrypted.as_bytes())
        .map_err(|e| AuthError::Assertion(format!("invalid decrypted private key: {e}")))?;
    if info.algorithm.oid != RSA_ENCRYPTION {
        return Err(AuthError::Assertion("private key is not an RSA key".to_string()));
    }
    Ok(EncodingKey::from_rsa_der(info.private_key))
}

const fn algorithm(algorithm: JwtAlgorithm) -> Algorithm {
    match algorithm {
        JwtAlgorithm::RS256 => Algorithm::RS256,
        JwtAlgorithm::RS384 => Algorithm::RS384,
        JwtAlgorithm::RS512 => Algorithm::RS512,
    }
}

#[async_trait]
impl GrantStrategy for JwtGrant {
    fn name(&self) -> &'static str {
        "jwt"
    }

    fn build_grant_request(&self, _current: Option<&TokenPair>) -> Result<GrantRequest, AuthError> {
        Ok(GrantRequest::JwtBearer { assertion: self.assertion(Utc::now())? })
    }

    /// Exchange with the JWT retry policy:
    /// - 429/5xx: back off and retry within the retry budget
    /// - expired-`exp` rejection with a `Date` header: retry once at once,
    ///   re-deriving `exp` from the server clock
    /// - anything else: propagate
    async fn exchange(
        &self,
        endpoint: &dyn TokenEndpoint,
        _current: Option<&TokenPair>,
    ) -> Result<TokenPair, AuthError> {
        let mut state = RetryState::default();
        let mut server_now: Option<DateTime<Utc>> = None;
        let mut skew_corrected = false;

        loop {
            let now = server_now.unwrap_or_else(Utc::now);
            let request = GrantRequest::JwtBearer { assertion: self.assertion(now)? };

            let rejected = match endpoint.request_token(&request).await {
                Err(AuthError::Rejected(rejected)) => rejected,
                other => return other,
            };

            if rejected.is_transient() && self.backoff.can_retry(&state) {
                let delay =
                    self.backoff.delay(state.attempt_number, rejected.retry_after.as_deref());
                warn!(
                    status = rejected.status,
                    attempt = state.attempt_number,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "JWT exchange throttled, backing off"
                );
                tokio::time::sleep(delay).await;
                state.advance();
                server_now = None;
                continue;
            }

            if !skew_corrected && rejected.is_expired_assertion() {
                if let Some(date) = rejected.server_date() {
                    debug!(server_date = %date, "Retrying JWT exchange with server clock");
                    server_now = Some(date);
                    skew_corrected = true;
                    continue;
                }
            }

            return Err(AuthError::Rejected(rejected));
        }
    }

    fn for_subject(&self, subject: Subject) -> Option<Arc<dyn GrantStrategy>> {
        Some(Arc::new(Self {
            settings: Arc::clone(&self.settings),
            key: self.key.clone(),
            subject,
            backoff: self.backoff.clone(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use boxsdk_domain::ClientCredentials;

    use super::*;

    const ENCRYPTED_KEY: &str = include_str!("../../../tests/fixtures/jwt_test_key_encrypted.pem");

    fn encrypted_settings(passphrase: Option<&str>) -> JwtSettings {
        JwtSettings {
            credentials: ClientCredentials::new("cid", "secret"),
            jwt_key_id: "kid".to_string(),
            private_key: ENCRYPTED_KEY.to_string(),
            private_key_passphrase: passphrase.map(str::to_string),
            algorithm: JwtAlgorithm::RS256,
            subject: Subject::EnterpriseId("1".to_string()),
        }
    }

    #[test]
    fn decrypts_encrypted_keys_with_passphrase() {
        let settings = encrypted_settings(Some("box-test-passphrase"));
        let grant = JwtGrant::new(settings, BackoffPolicy::default()).unwrap();
        let assertion = grant.assertion(Utc::now()).unwrap();
        assert_eq!(assertion.split('.').count(), 3);
    }

    #[test]
    fn encrypted_key_needs_the_right_passphrase() {
        assert!(matches!(
            JwtGrant::new(encrypted_settings(None), BackoffPolicy::default()),
            Err(AuthError::Assertion(msg)) if msg.contains("passphrase")
        ));
        assert!(matches!(
            JwtGrant::new(encrypted_settings(Some("wrong")), BackoffPolicy::default()),
            Err(AuthError::Assertion(msg)) if msg.contains("decrypt")
        ));
    }

    #[test]
    fn rejects_garbage_keys() {
        let settings = JwtSettings {
            credentials: ClientCredentials::new("cid", "secret"),
            jwt_key_id: "kid".to_string(),
            private_key: "not a key".to_string(),
            private_key_passphrase: None,
            algorithm: JwtAlgorithm::RS512,
            subject: Subject::UserId("2".to_string()),
        };
        assert!(JwtGrant::new(settings, BackoffPolicy::default()).is_err());
    }
}
