//! Secure storage primitives
//!
//! Keychain access used to persist token pairs between process runs.

pub mod keychain;

pub use keychain::{KeychainError, KeychainProvider, SecretStore};
