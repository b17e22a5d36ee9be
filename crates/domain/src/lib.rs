//! # Box SDK Domain
//!
//! Value types shared by every layer of the Box authentication and session
//! engine.
//!
//! This crate contains:
//! - Token and subject types (`TokenPair`, `Subject`)
//! - Client configuration structures (`ClientConfig`, `ProxyConfig`, ...)
//! - Domain error types and Result definitions
//! - Wire constants (endpoints, grant type URNs, retry budget)
//!
//! ## Architecture
//! - No dependencies on other workspace crates
//! - Only external dependencies allowed
//! - Pure value types without I/O

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
