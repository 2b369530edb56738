//! Configuration handling for the preview pipeline.
//!
//! `Config::from_env` reads `LINKPREVIEW_*` environment variables and falls
//! back to defaults for anything unset. Numeric values are validated.

use std::env;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::time::Duration;

use crate::scanner::DEFAULT_MAX_HEAD_BYTES;

/// Environment variable names.
pub const ENV_USER_AGENT: &str = "LINKPREVIEW_USER_AGENT";
pub const ENV_CONNECT_TIMEOUT_SECS: &str = "LINKPREVIEW_CONNECT_TIMEOUT_SECS";
pub const ENV_TRANSFER_TIMEOUT_SECS: &str = "LINKPREVIEW_TRANSFER_TIMEOUT_SECS";
pub const ENV_MAX_HEAD_BYTES: &str = "LINKPREVIEW_MAX_HEAD_BYTES";
pub const ENV_MAX_IMAGE_BYTES: &str = "LINKPREVIEW_MAX_IMAGE_BYTES";

/// Desktop browser user agent, so that sites do not serve their mobile pages.
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/41.0.2228.0 Safari/537.36";
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_TRANSFER_TIMEOUT_SECS: u64 = 20;
const DEFAULT_MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024; // 5MB

/// Runtime configuration of the preview pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    user_agent: String,
    connect_timeout: Duration,
    transfer_timeout: Duration,
    max_head_bytes: usize,
    max_image_bytes: usize,
}

impl Config {
    pub fn new(
        user_agent: impl Into<String>,
        connect_timeout: Duration,
        transfer_timeout: Duration,
        max_head_bytes: usize,
        max_image_bytes: usize,
    ) -> Self {
        Self {
            user_agent: user_agent.into(),
            connect_timeout,
            transfer_timeout,
            max_head_bytes,
            max_image_bytes,
        }
    }

    /// Load from environment variables, falling back to the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let user_agent =
            env::var(ENV_USER_AGENT).unwrap_or_else(|_| DEFAULT_USER_AGENT.to_string());
        let connect_timeout_secs =
            parse_var(ENV_CONNECT_TIMEOUT_SECS, DEFAULT_CONNECT_TIMEOUT_SECS)?;
        let transfer_timeout_secs =
            parse_var(ENV_TRANSFER_TIMEOUT_SECS, DEFAULT_TRANSFER_TIMEOUT_SECS)?;
        let max_head_bytes = parse_var(ENV_MAX_HEAD_BYTES, DEFAULT_MAX_HEAD_BYTES)?;
        let max_image_bytes = parse_var(ENV_MAX_IMAGE_BYTES, DEFAULT_MAX_IMAGE_BYTES)?;

        if user_agent.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: ENV_USER_AGENT,
                reason: "must not be empty".to_string(),
            });
        }
        if max_head_bytes == 0 {
            return Err(ConfigError::InvalidValue {
                field: ENV_MAX_HEAD_BYTES,
                reason: "must be greater than zero".to_string(),
            });
        }

        Ok(Self {
            user_agent,
            connect_timeout: Duration::from_secs(connect_timeout_secs),
            transfer_timeout: Duration::from_secs(transfer_timeout_secs),
            max_head_bytes,
            max_image_bytes,
        })
    }

    /// User agent sent with page and image requests.
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }
    /// Upper bound for a whole transfer, header to last chunk.
    pub fn transfer_timeout(&self) -> Duration {
        self.transfer_timeout
    }
    /// Bytes buffered before a head that never closes is treated as complete.
    pub fn max_head_bytes(&self) -> usize {
        self.max_head_bytes
    }
    pub fn max_image_bytes(&self) -> usize {
        self.max_image_bytes
    }

    pub fn with_max_head_bytes(mut self, max_head_bytes: usize) -> Self {
        self.max_head_bytes = max_head_bytes;
        self
    }

    pub fn with_transfer_timeout(mut self, transfer_timeout: Duration) -> Self {
        self.transfer_timeout = transfer_timeout;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(
            DEFAULT_USER_AGENT,
            Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            Duration::from_secs(DEFAULT_TRANSFER_TIMEOUT_SECS),
            DEFAULT_MAX_HEAD_BYTES,
            DEFAULT_MAX_IMAGE_BYTES,
        )
    }
}

fn parse_var<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            field: key,
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

/// Errors that can occur while building a configuration.
#[derive(Debug)]
pub enum ConfigError {
    InvalidValue { field: &'static str, reason: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidValue { field, reason } => {
                write!(f, "invalid value for '{}': {}", field, reason)
            }
        }
    }
}

impl Error for ConfigError {}
