//! Tracing subscriber installation

use std::str::FromStr;

use boxsdk_domain::impl_wire_name_conversions;
use tracing_subscriber::EnvFilter;

/// Output format of the fmt layer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl_wire_name_conversions!(LogFormat {
    Pretty => "pretty",
    Json => "json",
});

/// Install a global subscriber.
///
/// `RUST_LOG` wins over `level`; an unparsable filter falls back to `info`.
/// Returns `false` when a subscriber was already installed.
pub fn init(level: &str, format: LogFormat) -> bool {
    use tracing_subscriber::fmt;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let result = match format {
        LogFormat::Json => fmt::fmt().with_env_filter(filter).json().try_init(),
        LogFormat::Pretty => fmt::fmt().with_env_filter(filter).try_init(),
    };
    result.is_ok()
}

/// Install a subscriber configured by `BOX_LOG_LEVEL` and `BOX_LOG_FORMAT`.
pub fn init_from_env() -> bool {
    let level = std::env::var("BOX_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let format = std::env::var("BOX_LOG_FORMAT")
        .ok()
        .and_then(|f| LogFormat::from_str(&f).ok())
        .unwrap_or_default();
    init(&level, format)
}
