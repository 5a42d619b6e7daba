//! Client configuration parsed from environment variables.

use std::path::PathBuf;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const TOKEN_DIR_NAME: &str = ".isf-auth";
pub const TOKEN_FILE_NAME: &str = "tokens.json";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid {var}: {value} (expected an http:// or https:// URL)")]
    InvalidUrl { var: &'static str, value: String },
    #[error("invalid {var}: {value} (expected a whole number of seconds)")]
    InvalidNumber { var: &'static str, value: String },
    #[error("no home directory found; set ISF_TOKEN_FILE")]
    NoHomeDir,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self { request_secs: DEFAULT_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// API base URL without a trailing slash.
    pub api_url: String,
    pub token_file: PathBuf,
    pub timeouts: Timeouts,
}

impl ClientConfig {
    /// Build typed client config from environment variables.
    ///
    /// Optional:
    /// - `ISF_API_URL`: default `http://127.0.0.1:8000`
    /// - `ISF_TOKEN_FILE`: default `~/.isf-auth/tokens.json`
    /// - `ISF_REQUEST_TIMEOUT_SECS`: default 30
    /// - `ISF_CONNECT_TIMEOUT_SECS`: default 10
    ///
    /// # Errors
    ///
    /// Returns an error if a value is malformed or no home directory exists
    /// to hold the default token file.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ClientConfig::from_env`] over an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// See [`ClientConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_url = parse_api_url(lookup("ISF_API_URL"))?;
        let token_file = match lookup("ISF_TOKEN_FILE").filter(|v| !v.trim().is_empty()) {
            Some(path) => PathBuf::from(path),
            None => default_token_file()?,
        };
        let timeouts = Timeouts {
            request_secs: parse_secs(
                "ISF_REQUEST_TIMEOUT_SECS",
                lookup("ISF_REQUEST_TIMEOUT_SECS"),
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )?,
            connect_secs: parse_secs(
                "ISF_CONNECT_TIMEOUT_SECS",
                lookup("ISF_CONNECT_TIMEOUT_SECS"),
                DEFAULT_CONNECT_TIMEOUT_SECS,
            )?,
        };

        Ok(Self { api_url, token_file, timeouts })
    }

    /// Replace the API base URL, applying the same validation as the env var.
    ///
    /// # Errors
    ///
    /// Returns an error if `url` is not an http(s) URL.
    pub fn with_api_url(mut self, url: &str) -> Result<Self, ConfigError> {
        self.api_url = parse_api_url(Some(url.to_owned()))?;
        Ok(self)
    }
}

fn parse_api_url(raw: Option<String>) -> Result<String, ConfigError> {
    let raw = raw.unwrap_or_else(|| DEFAULT_API_URL.to_owned());
    let trimmed = raw.trim().trim_end_matches('/');
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(ConfigError::InvalidUrl { var: "ISF_API_URL", value: raw });
    }
    Ok(trimmed.to_owned())
}

fn parse_secs(var: &'static str, raw: Option<String>, default: u64) -> Result<u64, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidNumber { var, value }),
    }
}

fn default_token_file() -> Result<PathBuf, ConfigError> {
    let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
    Ok(home.join(TOKEN_DIR_NAME).join(TOKEN_FILE_NAME))
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
