//! Registry configuration loading from file and environment variables.

use eventcap_core::StreamOptions;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Top-level registry configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Options applied to every stream the registry creates, unless the
    /// stream's own options set the same field.
    #[serde(default)]
    pub defaults: StreamOptions,

    /// Streams created when the configuration is loaded.
    #[serde(default)]
    pub streams: Vec<StreamOptions>,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "eventcap_core=trace,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `EVENTCAP_LOG_LEVEL` overrides `logging.level`
/// - `EVENTCAP_LOG_JSON` overrides `logging.json` (set to "true" to enable)
/// - `EVENTCAP_DEFAULT_LIMIT` overrides `defaults.limit`
/// - `EVENTCAP_DEFAULT_CONSOLE` overrides `defaults.console`
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => parse_config(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    apply_env_overrides(&mut config);
    Ok(config)
}

/// Parses configuration from TOML text without consulting the environment.
///
/// # Errors
///
/// Returns `ConfigError::Parse` for malformed TOML or unknown stream keys.
pub fn parse_config(contents: &str) -> Result<Config, ConfigError> {
    Ok(toml::from_str(contents)?)
}

fn apply_env_overrides(config: &mut Config) {
    if let Ok(level) = std::env::var("EVENTCAP_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Ok(json) = std::env::var("EVENTCAP_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
    if let Ok(limit) = std::env::var("EVENTCAP_DEFAULT_LIMIT") {
        if let Ok(parsed) = limit.trim().parse::<u64>() {
            config.defaults.limit = Some(Value::from(parsed));
        }
    }
    if let Ok(console) = std::env::var("EVENTCAP_DEFAULT_CONSOLE") {
        config.defaults.console = Some(Value::from(console));
    }
}
