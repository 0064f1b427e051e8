//! Environment configuration helpers

use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value `{value}` for {var}")]
    InvalidValue { var: &'static str, value: String },
    #[error("unknown LLM backend `{0}` (expected `ollama` or `openai`)")]
    UnknownBackend(String),
}

/// Read a variable, treating unset and blank alike
pub fn env_var(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.trim().is_empty())
}

/// Parse a variable, falling back to `default` when unset
pub fn env_parse<T: FromStr>(var: &'static str, default: T) -> Result<T, ConfigError> {
    env_parse_opt(var).map(|v| v.unwrap_or(default))
}

/// Parse an optional variable
pub fn env_parse_opt<T: FromStr>(var: &'static str) -> Result<Option<T>, ConfigError> {
    match env_var(var) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { var, value }),
    }
}
