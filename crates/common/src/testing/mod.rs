//! Testing utilities and helpers
//!
//! - **[`mocks`]**: in-memory implementations of the auth seams
//!   (`TokenEndpoint`, `SecretStore`)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use boxsdk_common::testing::MockTokenEndpoint;
//!
//! let endpoint = Arc::new(MockTokenEndpoint::new());
//! let auth = AuthCoordinator::new(Arc::new(RefreshTokenGrant), endpoint.clone(), store);
//! auth.refresh(None).await?;
//! assert_eq!(endpoint.token_requests(), 1);
//! ```

pub mod mocks;

#[cfg(feature = "platform")]
pub use mocks::{MockKeychainProvider, MockTokenEndpoint};
