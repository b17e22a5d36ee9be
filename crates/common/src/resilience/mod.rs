//! Resilience patterns for transient failures
//!
//! The session retry engine and the JWT grant share one backoff policy:
//! - **Backoff**: jittered exponential delays that defer to a numeric
//!   `Retry-After` header
//! - **Retry state**: per-request attempt counter bounded by the budget

pub mod backoff;

pub use backoff::{BackoffPolicy, RetryState};
