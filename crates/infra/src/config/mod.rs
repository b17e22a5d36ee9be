//! Configuration loading
//!
//! Credentials and [`ClientConfig`](boxsdk_domain::ClientConfig) from
//! environment variables, `.env` files or JSON/TOML config files.

pub mod loader;

pub use loader::{
    load, load_from_env, load_from_file, load_jwt_settings, probe_config_paths, BoxConfig,
};
