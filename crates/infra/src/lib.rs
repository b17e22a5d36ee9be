//! # Box SDK Infrastructure
//!
//! I/O side of the Box authentication and session engine.
//!
//! This crate contains:
//! - The authenticated [`BoxSession`] with refresh-on-401 and retry/backoff
//! - The `reqwest` transport and request/response envelopes
//! - Metadata helpers and the `"type"`-discriminated [`TypeRegistry`]
//! - Configuration loading and tracing subscriber setup
//!
//! ## Architecture
//! - Auth, token stores and backoff come from `boxsdk-common`
//! - Value types and constants come from `boxsdk-domain`
//! - Contains all network-facing code

pub mod api;
pub mod config;
pub mod errors;
pub mod http;
pub mod observability;

#[cfg(any(feature = "test-utils", test))]
pub mod testing;

// Re-export commonly used items
pub use api::{CreateError, Metadata, MetadataItemType, MetadataUpdate, TypeRegistry};
pub use errors::{ApiError, SessionError, TransportError};
pub use http::{
    BodyStream, BoxSession, MultipartPart, RequestBody, RequestEnvelope, ReqwestTransport,
    ResponseEnvelope, Transport,
};
