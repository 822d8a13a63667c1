//! Error types for ridechat-core

use thiserror::Error;

use crate::api::ApiError;
use crate::auth::AuthError;
use crate::cache::CacheError;
use crate::config::ConfigError;
use crate::models::ValidationError;
use crate::sync::SyncError;

/// Result type alias using ridechat-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Umbrella error for callers that drive several ridechat-core components
#[derive(Error, Debug)]
pub enum Error {
    /// Conversation sync error
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// Backend API error
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Auth service error
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Durable cache error
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(#[from] ValidationError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
