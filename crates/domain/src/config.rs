//! Client configuration
//!
//! Everything the auth and session layers consume but never produce: base
//! URLs, retry budget, device identity, proxy settings and user agent.

use serde::{Deserialize, Serialize};
use url::{Position, Url};

use crate::constants::{
    DEFAULT_API_BASE_URL, DEFAULT_AUTHORIZE_URL, DEFAULT_DEVICE_ID, DEFAULT_OAUTH_BASE_URL,
    DEFAULT_UPLOAD_BASE_URL, MAX_RETRIES_ON_EXCEPTION, MAX_RETRY_ATTEMPTS, RETRY_BASE_INTERVAL_MS,
    RETRY_RANDOMIZATION_FACTOR, SDK_VERSION,
};
use crate::errors::{BoxSdkError, Result};
use crate::impl_wire_name_conversions;
use crate::types::Subject;

/// Session and token endpoint configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub upload_base_url: String,
    pub oauth_base_url: String,
    pub authorize_url: String,
    pub user_agent: String,
    /// Request timeout handed to the transport, in seconds
    pub timeout_secs: u64,
    pub retry: RetrySettings,
    pub device: DeviceInfo,
    pub proxy: Option<ProxyConfig>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            upload_base_url: DEFAULT_UPLOAD_BASE_URL.to_string(),
            oauth_base_url: DEFAULT_OAUTH_BASE_URL.to_string(),
            authorize_url: DEFAULT_AUTHORIZE_URL.to_string(),
            user_agent: format!("box-rust-sdk/{SDK_VERSION}"),
            timeout_secs: 60,
            retry: RetrySettings::default(),
            device: DeviceInfo::default(),
            proxy: None,
        }
    }
}

impl ClientConfig {
    /// `POST` target for every grant exchange.
    #[must_use]
    pub fn token_url(&self) -> String {
        format!("{}/token", self.oauth_base_url.trim_end_matches('/'))
    }

    #[must_use]
    pub fn revoke_url(&self) -> String {
        format!("{}/revoke", self.oauth_base_url.trim_end_matches('/'))
    }

    /// Analytics header value sent as `X-Box-UA`.
    #[must_use]
    pub fn box_ua(&self) -> String {
        format!("agent=box-rust-sdk/{SDK_VERSION}; env=rust")
    }

    /// Point every base URL at one host. Used by tests and proxies.
    #[must_use]
    pub fn with_base_url(mut self, base: &str) -> Self {
        let base = base.trim_end_matches('/');
        self.api_base_url = format!("{base}/2.0");
        self.upload_base_url = format!("{base}/api/2.0");
        self.oauth_base_url = format!("{base}/oauth2");
        self
    }

    /// Validate values that serde cannot check.
    ///
    /// # Errors
    /// Returns `BoxSdkError::Config` for empty base URLs, a zero timeout or an
    /// out-of-range jitter factor.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("api_base_url", &self.api_base_url),
            ("upload_base_url", &self.upload_base_url),
            ("oauth_base_url", &self.oauth_base_url),
        ] {
            if value.trim().is_empty() {
                return Err(BoxSdkError::Config(format!("{name} must not be empty")));
            }
        }
        if self.timeout_secs == 0 {
            return Err(BoxSdkError::Config("timeout_secs must be positive".to_string()));
        }
        if !(0.0..1.0).contains(&self.retry.randomization_factor) {
            return Err(BoxSdkError::Config(
                "retry.randomization_factor must be in [0, 1)".to_string(),
            ));
        }
        Ok(())
    }
}

/// Retry budget and backoff shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Retries after the first attempt for 202/429/5xx responses
    pub max_attempts: u32,
    /// Retries after transport failures that produced no response
    pub max_retries_on_exception: u32,
    pub base_interval_ms: u64,
    pub randomization_factor: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: MAX_RETRY_ATTEMPTS,
            max_retries_on_exception: MAX_RETRIES_ON_EXCEPTION,
            base_interval_ms: RETRY_BASE_INTERVAL_MS,
            randomization_factor: RETRY_RANDOMIZATION_FACTOR,
        }
    }
}

/// Device identity attached to token requests
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceInfo {
    pub id: String,
    pub name: String,
}

impl Default for DeviceInfo {
    fn default() -> Self {
        Self { id: DEFAULT_DEVICE_ID.to_string(), name: String::new() }
    }
}

/// Outbound proxy
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub url: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl ProxyConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into(), user: None, password: None }
    }

    #[must_use]
    pub fn with_auth(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self.password = Some(password.into());
        self
    }

    /// Proxy string used for both http and https traffic.
    ///
    /// # Errors
    /// Returns `BoxSdkError::Config` when only one of user/password is set.
    pub fn proxy_url(&self) -> Result<String> {
        match (&self.user, &self.password) {
            (None, None) => Ok(self.url.clone()),
            (Some(user), Some(password)) => {
                let address = self.url.split_once("://").map_or(self.url.as_str(), |(_, rest)| rest);
                let invalid = || BoxSdkError::Config(format!("invalid proxy url: {}", self.url));
                let mut url = Url::parse(&format!("http://{address}")).map_err(|_| invalid())?;
                url.set_username(user).map_err(|()| invalid())?;
                url.set_password(Some(password)).map_err(|()| invalid())?;
                Ok(url[..Position::AfterPort].to_string())
            }
            _ => Err(BoxSdkError::Config(
                "proxy auth requires both user and password".to_string(),
            )),
        }
    }
}

impl std::fmt::Debug for ProxyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyConfig")
            .field("url", &self.url)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

/// OAuth client credentials
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl ClientCredentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self { client_id: client_id.into(), client_secret: client_secret.into() }
    }
}

impl std::fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .finish()
    }
}

/// Signing algorithm for JWT assertions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum JwtAlgorithm {
    #[default]
    RS256,
    RS384,
    RS512,
}

impl_wire_name_conversions!(JwtAlgorithm {
    RS256 => "rs256",
    RS384 => "rs384",
    RS512 => "rs512",
});

/// Server-auth (JWT) application settings
#[derive(Clone, PartialEq, Eq)]
pub struct JwtSettings {
    pub credentials: ClientCredentials,
    pub jwt_key_id: String,
    pub private_key: String,
    pub private_key_passphrase: Option<String>,
    pub algorithm: JwtAlgorithm,
    pub subject: Subject,
}

impl JwtSettings {
    /// Parse the app-settings JSON downloaded from the Box developer console.
    ///
    /// The subject defaults to the enterprise in the file.
    ///
    /// # Errors
    /// Returns `BoxSdkError::Config` when the JSON is malformed or has no
    /// `enterpriseID`.
    pub fn from_app_settings_json(contents: &str) -> Result<Self> {
        let file: AppSettingsFile = serde_json::from_str(contents)
            .map_err(|e| BoxSdkError::Config(format!("Invalid app settings JSON: {e}")))?;
        let enterprise_id = file.enterprise_id.ok_or_else(|| {
            BoxSdkError::Config("app settings do not contain an enterpriseID".to_string())
        })?;
        let settings = file.box_app_settings;
        Ok(Self {
            credentials: ClientCredentials::new(settings.client_id, settings.client_secret),
            jwt_key_id: settings.app_auth.public_key_id,
            private_key: settings.app_auth.private_key,
            private_key_passphrase: settings.app_auth.passphrase.filter(|p| !p.is_empty()),
            algorithm: JwtAlgorithm::default(),
            subject: Subject::EnterpriseId(enterprise_id),
        })
    }
}

impl std::fmt::Debug for JwtSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtSettings")
            .field("credentials", &self.credentials)
            .field("jwt_key_id", &self.jwt_key_id)
            .field("algorithm", &self.algorithm)
            .field("subject", &self.subject)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppSettingsFile {
    box_app_settings: AppSettings,
    #[serde(rename = "enterpriseID")]
    enterprise_id: Option<String>,
}

#[derive(Deserialize)]
struct AppSettings {
    #[serde(rename = "clientID")]
    client_id: String,
    #[serde(rename = "clientSecret")]
    client_secret: String,
    #[serde(rename = "appAuth")]
    app_auth: AppAuth,
}

#[derive(Deserialize)]
struct AppAuth {
    #[serde(rename = "publicKeyID")]
    public_key_id: String,
    #[serde(rename = "privateKey")]
    private_key: String,
    passphrase: Option<String>,
}
