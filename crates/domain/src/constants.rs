//! Wire constants
//!
//! Endpoints, grant type identifiers and retry defaults used by the auth
//! and session layers.

// Endpoints
pub const DEFAULT_API_BASE_URL: &str = "https://api.box.com/2.0";
pub const DEFAULT_UPLOAD_BASE_URL: &str = "https://upload.box.com/api/2.0";
pub const DEFAULT_OAUTH_BASE_URL: &str = "https://api.box.com/oauth2";
pub const DEFAULT_AUTHORIZE_URL: &str = "https://account.box.com/api/oauth2/authorize";

/// Audience claim for JWT assertions.
pub const JWT_AUDIENCE: &str = "https://api.box.com/oauth2/token";

// Grant types
pub const GRANT_TYPE_AUTHORIZATION_CODE: &str = "authorization_code";
pub const GRANT_TYPE_REFRESH_TOKEN: &str = "refresh_token";
pub const GRANT_TYPE_CLIENT_CREDENTIALS: &str = "client_credentials";
pub const GRANT_TYPE_JWT_BEARER: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
pub const GRANT_TYPE_TOKEN_EXCHANGE: &str = "urn:ietf:params:oauth:grant-type:token-exchange";
pub const TOKEN_TYPE_ACCESS_TOKEN: &str = "urn:ietf:params:oauth:token-type:access_token";

// Retry policy
pub const MAX_RETRY_ATTEMPTS: u32 = 5;
pub const MAX_RETRIES_ON_EXCEPTION: u32 = 2;
pub const RETRY_BASE_INTERVAL_MS: u64 = 1_000;
pub const RETRY_RANDOMIZATION_FACTOR: f64 = 0.5;

// JWT assertion
pub const JWT_EXPIRATION_SECS: i64 = 30;
pub const JWT_JTI_LENGTH: usize = 32;

// Device defaults
pub const DEFAULT_DEVICE_ID: &str = "0";

// Headers
pub const HEADER_AS_USER: &str = "As-User";
pub const HEADER_BOX_API: &str = "BoxApi";
pub const HEADER_BOX_UA: &str = "X-Box-UA";

pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// CSRF state prefix used in authorization URLs.
pub const CSRF_TOKEN_PREFIX: &str = "box_csrf_token_";
pub const CSRF_TOKEN_RANDOM_LENGTH: usize = 16;
