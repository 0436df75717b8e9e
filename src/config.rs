use std::env;
use std::time::Duration;

use crate::scholar::DEFAULT_BASE_URL;

/// TCP connection establishment timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Global HTTP client timeout covering DNS + connect + response body.
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
/// Maximum redirect hops before aborting.
const MAX_REDIRECTS: usize = 5;
const DEFAULT_DELAY_MIN: Duration = Duration::from_millis(3_000);
const DEFAULT_DELAY_MAX: Duration = Duration::from_millis(5_000);

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid {var}: {source}")]
    InvalidUrl {
        var: &'static str,
        source: url::ParseError,
    },

    #[error("invalid {var}: must be HTTP(S)")]
    InvalidScheme { var: &'static str },

    #[error("invalid {var}: expected a whole number in range, got '{value}'")]
    InvalidNumber { var: &'static str, value: String },
}

/// Runtime settings.
///
/// Configuration via environment variables (all optional):
/// - `SCHOLAR_BASE_URL`: upstream origin (default `https://scholar.google.com`)
/// - `SCHOLAR_DELAY_MIN_MS` / `SCHOLAR_DELAY_MAX_MS`: throttling bounds before each uncached fetch
/// - `SCHOLAR_TIMEOUT_SECS`: overall HTTP timeout
#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: String,
    pub delay_min: Duration,
    pub delay_max: Duration,
    pub connect_timeout: Duration,
    pub http_timeout: Duration,
    pub max_redirects: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            delay_min: DEFAULT_DELAY_MIN,
            delay_max: DEFAULT_DELAY_MAX,
            connect_timeout: CONNECT_TIMEOUT,
            http_timeout: HTTP_TIMEOUT,
            max_redirects: MAX_REDIRECTS,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut config = Self::default();

        if let Some(raw) = var("SCHOLAR_BASE_URL") {
            config.base_url = validate_base_url("SCHOLAR_BASE_URL", &raw)?;
        }
        if let Some(raw) = var("SCHOLAR_DELAY_MIN_MS") {
            config.delay_min = Duration::from_millis(parse_number("SCHOLAR_DELAY_MIN_MS", raw)?);
        }
        if let Some(raw) = var("SCHOLAR_DELAY_MAX_MS") {
            config.delay_max = Duration::from_millis(parse_number("SCHOLAR_DELAY_MAX_MS", raw)?);
        }
        if let Some(raw) = var("SCHOLAR_TIMEOUT_SECS") {
            config.http_timeout = Duration::from_secs(parse_positive("SCHOLAR_TIMEOUT_SECS", raw)?);
        }

        Ok(config)
    }
}

fn validate_base_url(var: &'static str, raw: &str) -> Result<String, ConfigError> {
    let parsed = url::Url::parse(raw).map_err(|source| ConfigError::InvalidUrl { var, source })?;
    match parsed.scheme() {
        "http" | "https" => Ok(raw.trim_end_matches('/').to_string()),
        _ => Err(ConfigError::InvalidScheme { var }),
    }
}

fn parse_number(var: &'static str, value: String) -> Result<u64, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::InvalidNumber { var, value })
}

/// Like `parse_number`, but 0 is rejected.
fn parse_positive(var: &'static str, value: String) -> Result<u64, ConfigError> {
    match parse_number(var, value.clone())? {
        0 => Err(ConfigError::InvalidNumber { var, value }),
        n => Ok(n),
    }
}
