//! # Engine Configuration
//!
//! Connection and tuning settings loaded from environment variables.
//!
//! All tuning settings have sensible defaults (see [`crate::constants`]) and can be
//! overridden via environment variables. The endpoint and token are required.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::constants::{
    DEFAULT_DELETE_MAX_ATTEMPTS, DEFAULT_DELETE_RETRY_DELAY_MS, DEFAULT_MAX_PAGES,
    DEFAULT_PAGE_SIZE, DEFAULT_REQUEST_TIMEOUT_SECS,
};
use crate::error::ConfigError;

pub const ENV_BASE_URL: &str = "BRMS_BASE_URL";
pub const ENV_TOKEN: &str = "BRMS_TOKEN";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "BRMS_REQUEST_TIMEOUT_SECS";
pub const ENV_DELETE_MAX_ATTEMPTS: &str = "BRMS_DELETE_MAX_ATTEMPTS";
pub const ENV_DELETE_RETRY_DELAY_MS: &str = "BRMS_DELETE_RETRY_DELAY_MS";
pub const ENV_PAGE_SIZE: &str = "BRMS_PAGE_SIZE";
pub const ENV_MAX_PAGES: &str = "BRMS_MAX_PAGES";
pub const ENV_REFERENCE_MODE: &str = "BRMS_REFERENCE_MODE";

/// How the reference resolver treats group names that do not exist in the project
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReferenceMode {
    /// Drop unknown names and carry on
    #[default]
    Lenient,
    /// Fail the operation with [`crate::error::EngineError::UnresolvedReference`]
    Strict,
}

impl FromStr for ReferenceMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "lenient" => Ok(ReferenceMode::Lenient),
            "strict" => Ok(ReferenceMode::Strict),
            other => Err(ConfigError::Invalid {
                name: ENV_REFERENCE_MODE,
                reason: format!("expected 'lenient' or 'strict', got {other:?}"),
            }),
        }
    }
}

/// Engine-level configuration
#[derive(Clone)]
pub struct EngineConfig {
    /// Backend base URL, without trailing slash
    pub base_url: String,
    /// Personal access token sent as a bearer credential
    pub token: String,
    /// Per-request timeout
    pub request_timeout: Duration,
    /// Delete attempts before reporting the last failure
    pub delete_max_attempts: u32,
    /// Fixed delay between delete attempts
    pub delete_retry_delay: Duration,
    /// Page size requested from paginated listings
    pub page_size: u32,
    /// Ceiling on pages fetched for one listing
    pub max_pages: u32,
    pub reference_mode: ReferenceMode,
}

impl fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineConfig")
            .field("base_url", &self.base_url)
            .field("request_timeout", &self.request_timeout)
            .field("delete_max_attempts", &self.delete_max_attempts)
            .field("delete_retry_delay", &self.delete_retry_delay)
            .field("page_size", &self.page_size)
            .field("max_pages", &self.max_pages)
            .field("reference_mode", &self.reference_mode)
            .finish_non_exhaustive()
    }
}

impl EngineConfig {
    /// Configuration with default tuning for the given endpoint
    #[must_use]
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            delete_max_attempts: DEFAULT_DELETE_MAX_ATTEMPTS,
            delete_retry_delay: Duration::from_millis(DEFAULT_DELETE_RETRY_DELAY_MS),
            page_size: DEFAULT_PAGE_SIZE,
            max_pages: DEFAULT_MAX_PAGES,
            reference_mode: ReferenceMode::default(),
        }
    }

    /// Load configuration from environment variables with defaults
    ///
    /// # Errors
    /// Returns [`ConfigError`] when a required variable is missing or a value is invalid
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_with(None, None)
    }

    /// Load from the environment, letting explicit endpoint and token values win
    ///
    /// # Errors
    /// Returns [`ConfigError`] when a required setting is missing or a value is invalid
    pub fn from_env_with(base_url: Option<&str>, token: Option<&str>) -> Result<Self, ConfigError> {
        Self::from_lookup(|key| {
            let explicit = match key {
                ENV_BASE_URL => base_url,
                ENV_TOKEN => token,
                _ => None,
            };
            explicit
                .map(str::to_string)
                .or_else(|| std::env::var(key).ok())
        })
    }

    /// Load configuration through an arbitrary variable lookup
    ///
    /// # Errors
    /// Returns [`ConfigError`] when a required variable is missing or a value is invalid
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = lookup(ENV_BASE_URL).unwrap_or_default();
        let token = lookup(ENV_TOKEN).unwrap_or_default();
        let reference_mode = match lookup(ENV_REFERENCE_MODE) {
            Some(raw) => raw.parse()?,
            None => ReferenceMode::default(),
        };

        let config = Self {
            request_timeout: Duration::from_secs(var_or_default(
                &lookup,
                ENV_REQUEST_TIMEOUT_SECS,
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )),
            delete_max_attempts: var_or_default(
                &lookup,
                ENV_DELETE_MAX_ATTEMPTS,
                DEFAULT_DELETE_MAX_ATTEMPTS,
            ),
            delete_retry_delay: Duration::from_millis(var_or_default(
                &lookup,
                ENV_DELETE_RETRY_DELAY_MS,
                DEFAULT_DELETE_RETRY_DELAY_MS,
            )),
            page_size: var_or_default(&lookup, ENV_PAGE_SIZE, DEFAULT_PAGE_SIZE),
            max_pages: var_or_default(&lookup, ENV_MAX_PAGES, DEFAULT_MAX_PAGES),
            reference_mode,
            ..Self::new(base_url, token)
        };
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    /// Returns [`ConfigError`] describing the first invalid setting
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.is_empty() {
            return Err(ConfigError::Missing(ENV_BASE_URL));
        }
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                name: ENV_BASE_URL,
                reason: format!("{:?} is not an http(s) URL", self.base_url),
            });
        }
        if self.token.is_empty() {
            return Err(ConfigError::Missing(ENV_TOKEN));
        }
        if self.delete_max_attempts == 0 {
            return Err(ConfigError::Invalid {
                name: ENV_DELETE_MAX_ATTEMPTS,
                reason: "must be at least 1".to_string(),
            });
        }
        if self.page_size == 0 {
            return Err(ConfigError::Invalid {
                name: ENV_PAGE_SIZE,
                reason: "must be at least 1".to_string(),
            });
        }
        if self.max_pages == 0 {
            return Err(ConfigError::Invalid {
                name: ENV_MAX_PAGES,
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Read a variable or return the default when unset or unparseable
fn var_or_default<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
