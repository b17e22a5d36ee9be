//! Configuration loader
//!
//! Loads client credentials and [`ClientConfig`] from environment variables
//! or files.
//!
//! ## Loading Strategy
//! 1. Reads a `.env` file into the environment when one exists
//! 2. Attempts to load from environment variables
//! 3. If the credentials are missing, falls back to loading from file
//! 4. Probes multiple paths for config files (JSON or TOML)
//!
//! ## Environment Variables
//! - `BOX_CLIENT_ID`, `BOX_CLIENT_SECRET`: required
//! - `BOX_API_BASE_URL`, `BOX_UPLOAD_BASE_URL`, `BOX_OAUTH_BASE_URL`
//! - `BOX_MAX_RETRY_ATTEMPTS`
//! - `BOX_DEVICE_ID`, `BOX_DEVICE_NAME`
//! - `BOX_PROXY_URL`, `BOX_PROXY_USER`, `BOX_PROXY_PASSWORD`
//! - `BOX_USER_AGENT`
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./config.{json,toml}` or `./boxsdk.{json,toml}`
//! 2. `../config.{json,toml}` and `../../config.{json,toml}`
//! 3. The same names relative to the executable

use std::path::{Path, PathBuf};

use boxsdk_domain::{
    BoxSdkError, ClientConfig, ClientCredentials, DeviceInfo, JwtSettings, ProxyConfig, Result,
};
use serde::{Deserialize, Serialize};

/// Credentials plus client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxConfig {
    pub credentials: ClientCredentials,
    #[serde(default)]
    pub client: ClientConfig,
}

/// Load configuration with automatic fallback strategy
///
/// # Errors
/// Returns `BoxSdkError::Config` if neither the environment nor any config
/// file yields a valid configuration.
pub fn load() -> Result<BoxConfig> {
    if let Ok(path) = dotenvy::dotenv() {
        tracing::debug!(path = %path.display(), "Loaded .env file");
    }

    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from `BOX_*` environment variables
///
/// Unset optional variables keep their [`ClientConfig::default`] values.
///
/// # Errors
/// Returns `BoxSdkError::Config` if the credentials are missing or a value
/// does not parse.
pub fn load_from_env() -> Result<BoxConfig> {
    let credentials =
        ClientCredentials::new(env_var("BOX_CLIENT_ID")?, env_var("BOX_CLIENT_SECRET")?);

    let mut client = ClientConfig::default();
    if let Some(url) = env_opt("BOX_API_BASE_URL") {
        client.api_base_url = url;
    }
    if let Some(url) = env_opt("BOX_UPLOAD_BASE_URL") {
        client.upload_base_url = url;
    }
    if let Some(url) = env_opt("BOX_OAUTH_BASE_URL") {
        client.oauth_base_url = url;
    }
    if let Some(attempts) = env_opt("BOX_MAX_RETRY_ATTEMPTS") {
        client.retry.max_attempts = attempts
            .parse::<u32>()
            .map_err(|e| BoxSdkError::Config(format!("Invalid max retry attempts: {e}")))?;
    }
    if let Some(user_agent) = env_opt("BOX_USER_AGENT") {
        client.user_agent = user_agent;
    }

    let device_id = env_opt("BOX_DEVICE_ID");
    let device_name = env_opt("BOX_DEVICE_NAME");
    if device_id.is_some() || device_name.is_some() {
        let defaults = DeviceInfo::default();
        client.device = DeviceInfo {
            id: device_id.unwrap_or(defaults.id),
            name: device_name.unwrap_or(defaults.name),
        };
    }

    if let Some(url) = env_opt("BOX_PROXY_URL") {
        client.proxy = Some(ProxyConfig {
            url,
            user: env_opt("BOX_PROXY_USER"),
            password: env_opt("BOX_PROXY_PASSWORD"),
        });
    }

    client.validate()?;
    Ok(BoxConfig { credentials, client })
}

/// Load configuration from a file
///
/// If `path` is `None`, probes the standard locations.
///
/// # Errors
/// Returns `BoxSdkError::Config` if the file is missing, unreadable or
/// invalid.
pub fn load_from_file(path: Option<PathBuf>) -> Result<BoxConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(BoxSdkError::Config(format!("Config file not found: {}", p.display())));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            BoxSdkError::Config("No config file found in any of the standard locations".to_string())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| BoxSdkError::Config(format!("Failed to read config file: {e}")))?;

    let config = parse_config(&contents, &config_path)?;
    config.client.validate()?;
    Ok(config)
}

/// Load JWT settings from a Box app-settings JSON file.
///
/// # Errors
/// Returns `BoxSdkError::Config` if the file cannot be read or parsed.
pub fn load_jwt_settings(path: &Path) -> Result<JwtSettings> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| BoxSdkError::Config(format!("Failed to read app settings: {e}")))?;
    JwtSettings::from_app_settings_json(&contents)
}

fn parse_config(contents: &str, path: &Path) -> Result<BoxConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| BoxSdkError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| BoxSdkError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(BoxSdkError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// Probe multiple paths for configuration files
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    const NAMES: [&str; 8] = [
        "config.json",
        "config.toml",
        "boxsdk.json",
        "boxsdk.toml",
        "../config.json",
        "../config.toml",
        "../../config.json",
        "../../config.toml",
    ];

    let mut roots = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        roots.push(cwd);
    }
    if let Some(exe_dir) =
        std::env::current_exe().ok().and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        roots.push(exe_dir);
    }

    roots
        .iter()
        .flat_map(|root| NAMES.iter().map(move |name| root.join(name)))
        .find(|path| path.exists())
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key)
        .map_err(|_| BoxSdkError::Config(format!("Missing required environment variable: {key}")))
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}
