//! Observability setup
//!
//! The library crates only emit `tracing` events; installing a subscriber is
//! left to the application. [`logging::init`] is a ready-made one.

pub mod logging;

pub use logging::{init, init_from_env, LogFormat};
