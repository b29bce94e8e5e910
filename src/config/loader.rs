//! Configuration loading from disk and the environment.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable holding the upstream base URL.
pub const ENV_API_URL: &str = "GITLAB_API_URL";
/// Environment variable holding the upstream access token.
pub const ENV_ACCESS_TOKEN: &str = "GITLAB_ACCESS_TOKEN";
/// Environment variable holding the listening port.
pub const ENV_PORT: &str = "PORT";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value '{value}' for environment variable {key}")]
    InvalidEnv { key: &'static str, value: String },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse a TOML file without validating it.
pub fn read_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// What happened when looking for a `.env` file.
///
/// `.env` is read before logging is configured, so the outcome is kept and
/// reported once a subscriber exists.
#[derive(Debug)]
pub enum DotenvStatus {
    Loaded(PathBuf),
    Missing,
    Unreadable(String),
}

impl DotenvStatus {
    fn from_result(result: Result<PathBuf, dotenvy::Error>) -> Self {
        match result {
            Ok(path) => Self::Loaded(path),
            Err(e) if e.not_found() => Self::Missing,
            Err(e) => Self::Unreadable(e.to_string()),
        }
    }

    /// Report the outcome through `tracing`.
    pub fn log(&self) {
        match self {
            Self::Loaded(path) => tracing::debug!(path = ?path, "Loaded .env file"),
            Self::Missing => {}
            Self::Unreadable(error) => tracing::warn!(error = %error, "Ignoring unreadable .env file"),
        }
    }
}

/// Load `.env` from the working directory (or a parent) into the process environment.
pub fn load_dotenv() -> DotenvStatus {
    DotenvStatus::from_result(dotenvy::dotenv())
}

/// Build the startup configuration.
///
/// Starts from the TOML file when given (defaults otherwise), overlays the
/// process environment and validates the result. Call `load_dotenv` first
/// so `.env` values take part in the overlay.
pub fn load(path: Option<&Path>) -> Result<ProxyConfig, ConfigError> {
    load_with(path, |key| std::env::var(key).ok())
}

/// `load` with an explicit environment lookup.
pub fn load_with<F>(path: Option<&Path>, lookup: F) -> Result<ProxyConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match path {
        Some(path) => read_config(path)?,
        None => ProxyConfig::default(),
    };

    apply_env_overrides(&mut config, lookup)?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Overlay environment values onto `config`.
///
/// `lookup` resolves a variable name; tests pass a map instead of touching
/// the real process environment. Empty values are ignored.
pub fn apply_env_overrides<F>(config: &mut ProxyConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(url) = lookup(ENV_API_URL) {
        config.upstream.base_url = url;
    }

    if let Some(token) = lookup(ENV_ACCESS_TOKEN) {
        config.upstream.access_token = token;
    }

    if let Some(port) = lookup(ENV_PORT) {
        config.listener.port = port.trim().parse().map_err(|_| ConfigError::InvalidEnv {
            key: ENV_PORT,
            value: port.clone(),
        })?;
    }

    Ok(())
}
