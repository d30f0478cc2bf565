//! Configuration errors and text-level helpers.

use std::sync::LazyLock;
use std::time::Duration;

use regex::{Captures, Regex};
use thiserror::Error;

use crate::component::MultiError;

/// Configuration error types.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse YAML configuration.
    #[error("failed to parse YAML config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    /// One or more semantic problems, all reported together.
    #[error("invalid configuration: {0}")]
    Validation(#[from] MultiError),
}

/// Parse duration string using humantime.
///
/// Supports various formats: `30s`, `1m`, `5m30s`, `1h`, `100ms`, etc.
///
/// # Examples
///
/// ```
/// use collectord::config::parse_duration;
///
/// assert_eq!(parse_duration("30s").unwrap().as_secs(), 30);
/// assert_eq!(parse_duration("1h30m").unwrap().as_secs(), 5400);
/// ```
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    match s.trim() {
        "" => Err("duration string is empty".to_string()),
        s => humantime::parse_duration(s).map_err(|e| format!("invalid duration '{s}': {e}")),
    }
}

static ENV_VAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\$)?\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
        .expect("env var pattern is valid")
});

/// Expand environment variables in configuration text.
///
/// `${VAR}` is replaced by the variable's value (empty if unset),
/// `${VAR:-default}` falls back to `default`, and `$${VAR}` is kept as the
/// literal `${VAR}`.
pub fn expand_env_vars(input: &str) -> String {
    ENV_VAR
        .replace_all(input, |caps: &Captures| {
            if caps.get(1).is_some() {
                return caps[0][1..].to_string();
            }
            std::env::var(&caps[2])
                .unwrap_or_else(|_| caps.get(3).map_or("", |m| m.as_str()).to_string())
        })
        .into_owned()
}
