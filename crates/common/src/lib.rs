//! Auth, resilience and security building blocks shared by the Box SDK
//! crates.
//!
//! # Feature Tiers
//!
//! Enable cargo features to opt into the tiers you need:
//! - `foundation`: error classification, Box error body parsing
//! - `observability`: tracing instrumentation (no subscriber)
//! - `runtime`: async infrastructure (backoff policy)
//! - `platform`: OAuth client, grant strategies, token stores, keychain
//! - `test-utils`: mocks for the auth seams

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Foundation tier
// -----------------------------------------------------------------
#[cfg(feature = "foundation")]
pub mod error;

// Runtime tier
// --------------------------------------------------------------------
#[cfg(feature = "runtime")]
pub mod resilience;

// Platform tier
// -------------------------------------------------------------------
#[cfg(feature = "platform")]
pub mod auth;
#[cfg(feature = "platform")]
pub mod security;

// Testing utilities
// ---------------------------------------------------------------
#[cfg(any(feature = "test-utils", test))]
pub mod testing;

// Re-export commonly used types and traits for convenience
// ------------------------
#[cfg(feature = "platform")]
pub use auth::{AuthCoordinator, AuthError, OAuthClient, TokenStore};
#[cfg(feature = "foundation")]
pub use error::{ClosedError, ErrorBody, ErrorClassification, ErrorSeverity};
#[cfg(feature = "runtime")]
pub use resilience::{BackoffPolicy, RetryState};
#[cfg(feature = "platform")]
pub use security::{KeychainError, KeychainProvider, SecretStore};
