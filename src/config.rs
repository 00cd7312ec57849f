//! Client configuration parsed from environment variables.

pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8080/api";
pub const DEFAULT_API_PREFIX: &str = "auth";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_STATE_FILE: &str = ".authgate-state.json";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A configuration value could not be parsed.
    #[error("config parse failed: {0}")]
    Parse(String),
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
    /// API root without trailing slash, e.g. `https://app.example.com/api`.
    pub base_url: String,
    /// Path segment the auth endpoints live under.
    pub api_prefix: String,
    pub timeouts: Timeouts,
    /// Where the CLI keeps its durable key-value state.
    pub state_file: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_owned(),
            api_prefix: DEFAULT_API_PREFIX.to_owned(),
            timeouts: Timeouts::default(),
            state_file: DEFAULT_STATE_FILE.to_owned(),
        }
    }
}

impl ClientConfig {
    /// Build typed client config from environment variables.
    ///
    /// Optional:
    /// - `AUTH_API_BASE_URL`: default `http://127.0.0.1:8080/api`
    /// - `AUTH_API_PREFIX`: default `auth`
    /// - `AUTH_REQUEST_TIMEOUT_SECS`: default 30
    /// - `AUTH_CONNECT_TIMEOUT_SECS`: default 10
    /// - `AUTH_STATE_FILE`: default `.authgate-state.json`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the base URL is not `http(s)` or the
    /// prefix is empty.
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url = std::env::var("AUTH_API_BASE_URL").unwrap_or_else(|_| DEFAULT_API_BASE_URL.to_owned());
        let api_prefix = std::env::var("AUTH_API_PREFIX").unwrap_or_else(|_| DEFAULT_API_PREFIX.to_owned());
        let timeouts = Timeouts {
            request_secs: env_parse_u64("AUTH_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_secs: env_parse_u64("AUTH_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS),
        };
        let state_file = std::env::var("AUTH_STATE_FILE").unwrap_or_else(|_| DEFAULT_STATE_FILE.to_owned());

        Ok(Self {
            base_url: normalize_base_url(&base_url)?,
            api_prefix: normalize_prefix(&api_prefix)?,
            timeouts,
            state_file,
        })
    }

    /// Replace the base URL, applying the same validation as [`Self::from_env`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for a non-`http(s)` URL.
    pub fn with_base_url(mut self, raw: &str) -> Result<Self, ConfigError> {
        self.base_url = normalize_base_url(raw)?;
        Ok(self)
    }

    /// Full URL of an auth endpoint, e.g. `endpoint("login")`.
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}/{}", self.base_url, self.api_prefix, path.trim_start_matches('/'))
    }
}

fn env_parse_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

fn normalize_base_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(ConfigError::Parse(format!("AUTH_API_BASE_URL must be http(s): {raw}")));
    }
    Ok(trimmed.to_owned())
}

fn normalize_prefix(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        return Err(ConfigError::Parse("AUTH_API_PREFIX must not be empty".into()));
    }
    Ok(trimmed.to_owned())
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
