//! Location manager configuration.
//!
//! Built in code with `with_*` methods or loaded from an INI file:
//!
//! ```text
//! [location]
//! max_cache_age_secs = 60
//! request_timeout_secs = 10
//! max_concurrent_requests = 4
//! ```
//!
//! Missing keys keep their defaults. `max_concurrent_requests = 0` or an
//! empty value means unbounded.

use std::path::{Path, PathBuf};
use std::time::Duration;

use ini::Ini;
use thiserror::Error;
use tokio::sync::Semaphore;

use crate::cache::DEFAULT_MAX_CACHE_AGE;
use crate::request::DEFAULT_REQUEST_TIMEOUT;

const SECTION: &str = "location";

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read or parse the file.
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] ini::Error),

    /// A key held a value that could not be used.
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },
}

/// Settings for a [`LocationManager`](crate::manager::LocationManager).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerConfig {
    /// Maximum age for serving a cached fix.
    pub max_cache_age: Duration,
    /// Timeout for current-location requests that do not set one.
    pub default_timeout: Duration,
    /// Cap on concurrently executing requests; `None` is unbounded.
    pub max_concurrent_requests: Option<usize>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            max_cache_age: DEFAULT_MAX_CACHE_AGE,
            default_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_concurrent_requests: None,
        }
    }
}

impl ManagerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_cache_age(mut self, max_cache_age: Duration) -> Self {
        self.max_cache_age = max_cache_age;
        self
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn with_max_concurrent_requests(mut self, limit: usize) -> Self {
        self.max_concurrent_requests = Some(limit);
        self
    }

    /// Load from `path`. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let ini = Ini::load_from_file(path)?;
        Self::from_ini(&ini)
    }

    /// Load from the default path (`~/.geofix/config.ini`).
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&default_config_path())
    }

    /// Parse INI text.
    pub fn from_ini_str(content: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(content).map_err(|e| ConfigError::ReadError(ini::Error::Parse(e)))?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        let Some(section) = ini.section(Some(SECTION)) else {
            return Ok(config);
        };

        if let Some(v) = section.get("max_cache_age_secs") {
            config.max_cache_age = Duration::from_secs(parse_u64("max_cache_age_secs", v)?);
        }
        if let Some(v) = section.get("request_timeout_secs") {
            let secs = parse_u64("request_timeout_secs", v)?;
            if secs == 0 {
                return Err(invalid("request_timeout_secs", v, "must be greater than zero"));
            }
            config.default_timeout = Duration::from_secs(secs);
        }
        if let Some(v) = section.get("max_concurrent_requests") {
            config.max_concurrent_requests = match v.trim() {
                "" => None,
                _ => match parse_u64("max_concurrent_requests", v)? {
                    0 => None,
                    n => match usize::try_from(n) {
                        Ok(n) if n <= Semaphore::MAX_PERMITS => Some(n),
                        _ => {
                            return Err(invalid(
                                "max_concurrent_requests",
                                v,
                                "exceeds the maximum number of concurrent requests",
                            ))
                        }
                    },
                },
            };
        }

        Ok(config)
    }
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| invalid(key, value, "must be a non-negative integer"))
}

fn invalid(key: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        section: SECTION.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Get the path to the config directory (`~/.geofix`).
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".geofix")
}

/// Get the path to the config file (`~/.geofix/config.ini`).
pub fn default_config_path() -> PathBuf {
    config_directory().join("config.ini")
}
