use std::io;

use ridechat_core::api::ApiError;
use ridechat_core::auth::AuthError;
use ridechat_core::cache::CacheError;
use ridechat_core::config::ConfigError;
use ridechat_core::models::ValidationError;
use ridechat_core::sync::SyncError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] ridechat_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("No message content provided")]
    EmptyContent,
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Authentication error: {0}")]
    Auth(String),
    #[error("Profile '{0}' is not signed in. Run `ridechat auth login` first.")]
    NotSignedIn(String),
}

macro_rules! core_error_from {
    ($($source:ty),+ $(,)?) => {
        $(
            impl From<$source> for CliError {
                fn from(value: $source) -> Self {
                    Self::Core(value.into())
                }
            }
        )+
    };
}

core_error_from!(ApiError, CacheError, ConfigError, SyncError, ValidationError);

impl From<AuthError> for CliError {
    fn from(value: AuthError) -> Self {
        Self::Auth(value.to_string())
    }
}
