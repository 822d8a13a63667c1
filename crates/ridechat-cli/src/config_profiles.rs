//! Persistent CLI profile configuration.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use ridechat_core::config::{
    ClientConfig, ConfigError, API_AUTH_URL_VAR, API_BASE_URL_VAR, POLL_INTERVAL_MS_VAR,
};
use serde::{Deserialize, Serialize};

const CONFIG_FILE_NAME: &str = "config.json";
const PROFILE_ENV_VAR: &str = "RIDECHAT_PROFILE";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CliProfilesConfig {
    #[serde(default = "default_config_version")]
    pub version: u32,
    #[serde(default)]
    pub active_profile: Option<String>,
    #[serde(default)]
    pub profiles: BTreeMap<String, CliProfile>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CliProfile {
    #[serde(default)]
    pub api_auth_url: Option<String>,
    #[serde(default)]
    pub api_base_url: Option<String>,
    #[serde(default)]
    pub poll_interval_ms: Option<u64>,
}

const fn default_config_version() -> u32 {
    1
}

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ridechat")
        .join(CONFIG_FILE_NAME)
}

pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    ridechat_core::util::normalize_text_option(value)
}

pub fn normalize_profile_name(value: Option<&str>) -> Option<String> {
    let value = value?;
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

impl CliProfilesConfig {
    pub fn load() -> Result<Self, String> {
        Self::load_from_path(&default_config_path())
    }

    pub fn load_from_path(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|error| format!("Failed to read config at {}: {}", path.display(), error))?;
        let mut config = serde_json::from_str::<Self>(&raw)
            .map_err(|error| format!("Failed to parse config at {}: {}", path.display(), error))?;
        config.normalize();
        Ok(config)
    }

    pub fn save(&self) -> Result<PathBuf, String> {
        let path = default_config_path();
        self.save_to_path(&path)?;
        Ok(path)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|error| {
                format!(
                    "Failed to create config directory {}: {}",
                    parent.display(),
                    error
                )
            })?;
        }

        let mut normalized = self.clone();
        normalized.normalize();
        let serialized = serde_json::to_string_pretty(&normalized)
            .map_err(|error| format!("Failed to serialize config: {error}"))?;
        std::fs::write(path, serialized)
            .map_err(|error| format!("Failed to write config at {}: {}", path.display(), error))
    }

    /// Explicit flag, then `RIDECHAT_PROFILE`, then the active profile, then `default`.
    pub fn resolve_profile_name(&self, explicit: Option<&str>) -> String {
        if let Some(profile) = normalize_profile_name(explicit) {
            return profile;
        }
        if let Some(profile) =
            normalize_profile_name(std::env::var(PROFILE_ENV_VAR).ok().as_deref())
        {
            return profile;
        }
        if let Some(profile) = normalize_profile_name(self.active_profile.as_deref()) {
            return profile;
        }
        "default".to_string()
    }

    pub fn profile(&self, name: &str) -> Option<&CliProfile> {
        self.profiles.get(name)
    }

    pub fn profile_mut_or_default(&mut self, name: &str) -> &mut CliProfile {
        self.profiles.entry(name.to_string()).or_default()
    }

    fn normalize(&mut self) {
        self.active_profile = normalize_profile_name(self.active_profile.as_deref());
        for profile in self.profiles.values_mut() {
            profile.normalize();
        }
    }
}

impl CliProfile {
    /// Profile value for a `RIDECHAT_*` setting, if the profile stores one.
    pub fn lookup(&self, name: &str) -> Option<String> {
        match name {
            API_AUTH_URL_VAR => self.api_auth_url.clone(),
            API_BASE_URL_VAR => self.api_base_url.clone(),
            POLL_INTERVAL_MS_VAR => self.poll_interval_ms.map(|millis| millis.to_string()),
            _ => None,
        }
    }

    fn normalize(&mut self) {
        self.api_auth_url = normalize_text_option(self.api_auth_url.clone());
        self.api_base_url = normalize_text_option(self.api_base_url.clone());
    }
}

/// Build the client config with environment values taking precedence over the profile.
pub fn resolve_client_config(
    profile: Option<&CliProfile>,
    env_lookup: impl Fn(&str) -> Option<String>,
) -> Result<ClientConfig, ConfigError> {
    ClientConfig::from_lookup(|name| {
        normalize_text_option(env_lookup(name))
            .or_else(|| profile.and_then(|profile| profile.lookup(name)))
    })
}
