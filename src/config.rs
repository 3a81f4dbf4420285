//! Configuration types.

use std::time::Duration;

use crate::error::ConfigError;

/// Environment variable holding the backend base URL.
pub const ENV_API_URL: &str = "RIDERGO_API_URL";
/// Environment variable overriding the minimum phone length.
pub const ENV_MIN_PHONE_LEN: &str = "RIDERGO_MIN_PHONE_LEN";
/// Environment variable overriding the per-request timeout, in seconds.
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "RIDERGO_REQUEST_TIMEOUT_SECS";

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the RiderGo backend, without a trailing slash.
    pub api_url: String,
    /// Phone numbers shorter than this cannot request a code.
    pub min_phone_len: usize,
    /// Timeout applied by the HTTP client to every backend call.
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:5000/api".to_string(),
            min_phone_len: 10,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl ClientConfig {
    /// Build a config from the process environment, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup(ENV_API_URL) {
            let url = url.trim().trim_end_matches('/').to_string();
            if url.is_empty() {
                return Err(ConfigError::MissingRequired {
                    key: ENV_API_URL.to_string(),
                    hint: "Set it to the backend base URL, e.g. http://localhost:5000/api".into(),
                });
            }
            config.api_url = url;
        }

        if let Some(raw) = lookup(ENV_MIN_PHONE_LEN) {
            config.min_phone_len = parse_number(ENV_MIN_PHONE_LEN, &raw)?;
        }

        if let Some(raw) = lookup(ENV_REQUEST_TIMEOUT_SECS) {
            let secs: u64 = parse_number(ENV_REQUEST_TIMEOUT_SECS, &raw)?;
            if secs == 0 {
                return Err(ConfigError::InvalidValue {
                    key: ENV_REQUEST_TIMEOUT_SECS.to_string(),
                    message: "must be greater than zero".into(),
                });
            }
            config.request_timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("{raw:?}: {e}"),
    })
}
