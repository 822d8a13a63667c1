//! Runtime configuration for ridechat clients.
//!
//! Values come from `RIDECHAT_*` variables. Front ends may layer their own
//! sources (a profile file, flags) underneath by supplying a custom lookup.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::sync::{PollConfig, DEFAULT_POLL_INTERVAL};
use crate::util::{normalize_base_url, normalize_text_option};

pub const API_AUTH_URL_VAR: &str = "RIDECHAT_API_AUTH_URL";
pub const API_BASE_URL_VAR: &str = "RIDECHAT_API_BASE_URL";
pub const POLL_INTERVAL_MS_VAR: &str = "RIDECHAT_POLL_INTERVAL_MS";
pub const MAX_POLL_BACKOFF_MS_VAR: &str = "RIDECHAT_MAX_POLL_BACKOFF_MS";
pub const REQUEST_TIMEOUT_SECS_VAR: &str = "RIDECHAT_REQUEST_TIMEOUT_SECS";
pub const CACHE_PATH_VAR: &str = "RIDECHAT_CACHE_PATH";

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required setting: {0}")]
    MissingVar(&'static str),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Endpoints and timing shared by the auth client, backend client and sync runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub api_auth_url: Option<String>,
    pub api_base_url: Option<String>,
    pub poll_interval: Duration,
    pub max_poll_backoff: Option<Duration>,
    pub request_timeout: Duration,
    /// Durable cache file; `None` lets the front end pick a platform default.
    pub cache_path: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_auth_url: None,
            api_base_url: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_poll_backoff: None,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            cache_path: None,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    /// Resolve every setting through `lookup`, falling back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_auth_url = optional_url(&lookup, API_AUTH_URL_VAR)?;
        let api_base_url = optional_url(&lookup, API_BASE_URL_VAR)?;

        let poll_interval = match optional_u64(&lookup, POLL_INTERVAL_MS_VAR)? {
            Some(0) => {
                return Err(ConfigError::Invalid(format!(
                    "{POLL_INTERVAL_MS_VAR} must be greater than 0"
                )))
            }
            Some(millis) => Duration::from_millis(millis),
            None => DEFAULT_POLL_INTERVAL,
        };

        let max_poll_backoff =
            optional_u64(&lookup, MAX_POLL_BACKOFF_MS_VAR)?.map(Duration::from_millis);
        if let Some(ceiling) = max_poll_backoff {
            if ceiling < poll_interval {
                return Err(ConfigError::Invalid(format!(
                    "{MAX_POLL_BACKOFF_MS_VAR} must not be below the poll interval"
                )));
            }
        }

        let request_timeout = match optional_u64(&lookup, REQUEST_TIMEOUT_SECS_VAR)? {
            Some(0) => {
                return Err(ConfigError::Invalid(format!(
                    "{REQUEST_TIMEOUT_SECS_VAR} must be greater than 0"
                )))
            }
            Some(secs) => Duration::from_secs(secs),
            None => Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        };

        let cache_path = normalize_text_option(lookup(CACHE_PATH_VAR)).map(PathBuf::from);

        Ok(Self {
            api_auth_url,
            api_base_url,
            poll_interval,
            max_poll_backoff,
            request_timeout,
            cache_path,
        })
    }

    pub fn require_auth_url(&self) -> Result<&str, ConfigError> {
        self.api_auth_url
            .as_deref()
            .ok_or(ConfigError::MissingVar(API_AUTH_URL_VAR))
    }

    pub fn require_base_url(&self) -> Result<&str, ConfigError> {
        self.api_base_url
            .as_deref()
            .ok_or(ConfigError::MissingVar(API_BASE_URL_VAR))
    }

    #[must_use]
    pub const fn poll_config(&self) -> PollConfig {
        PollConfig::new(self.poll_interval).with_max_backoff(self.max_poll_backoff)
    }
}

fn optional_url(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<String>, ConfigError> {
    let Some(raw) = normalize_text_option(lookup(name)) else {
        return Ok(None);
    };
    normalize_base_url(&raw)
        .map(Some)
        .ok_or_else(|| ConfigError::Invalid(format!("{name} must start with http:// or https://")))
}

fn optional_u64(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<u64>, ConfigError> {
    normalize_text_option(lookup(name))
        .map(|raw| {
            raw.parse::<u64>()
                .map_err(|_| ConfigError::Invalid(format!("{name} must be a whole number")))
        })
        .transpose()
}
