//! Durable key-value cache for conversation mirrors.
//!
//! One entry per conversation, keyed by [`conversation_cache_key`], holding the
//! JSON-serialized message sequence. Access is synchronous and single-writer;
//! there are no transactions across entries.

mod migrations;
mod sqlite;

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use thiserror::Error;

use crate::models::ConversationId;

pub use sqlite::SqliteCache;

/// Key prefix shared by every conversation entry.
pub const CONVERSATION_KEY_PREFIX: &str = "conversation_";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("SQLite error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Cache unavailable: {0}")]
    Unavailable(String),
}

pub type CacheResult<T> = Result<T, CacheError>;

/// Synchronous persistent key-value store.
pub trait LocalDurableCache {
    fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Replace the value stored under `key` in a single write.
    fn set(&self, key: &str, value: &str) -> CacheResult<()>;

    fn remove(&self, key: &str) -> CacheResult<()>;

    /// Keys starting with `prefix`, in ascending order.
    fn keys_with_prefix(&self, prefix: &str) -> CacheResult<Vec<String>>;
}

impl<T: LocalDurableCache + ?Sized> LocalDurableCache for Box<T> {
    fn get(&self, key: &str) -> CacheResult<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> CacheResult<()> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> CacheResult<()> {
        (**self).remove(key)
    }

    fn keys_with_prefix(&self, prefix: &str) -> CacheResult<Vec<String>> {
        (**self).keys_with_prefix(prefix)
    }
}

/// Cache key for a conversation's message mirror.
#[must_use]
pub fn conversation_cache_key(conversation_id: &ConversationId) -> String {
    format!("{CONVERSATION_KEY_PREFIX}{conversation_id}")
}

/// Drop every conversation mirror, returning how many entries were removed.
///
/// Called on sign-out so the next user never sees another user's messages.
pub fn purge_conversations<C: LocalDurableCache + ?Sized>(cache: &C) -> CacheResult<usize> {
    let keys = cache.keys_with_prefix(CONVERSATION_KEY_PREFIX)?;
    for key in &keys {
        cache.remove(key)?;
    }
    tracing::info!("Purged {} cached conversations", keys.len());
    Ok(keys.len())
}

/// Process-local cache, shared between clones. Used by tests and ephemeral sessions.
#[derive(Debug, Clone, Default)]
pub struct MemoryCache {
    entries: Arc<Mutex<BTreeMap<String, String>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> CacheResult<std::sync::MutexGuard<'_, BTreeMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|error| CacheError::Unavailable(error.to_string()))
    }
}

impl LocalDurableCache for MemoryCache {
    fn get(&self, key: &str) -> CacheResult<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> CacheResult<()> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> CacheResult<()> {
        self.lock()?.remove(key);
        Ok(())
    }

    fn keys_with_prefix(&self, prefix: &str) -> CacheResult<Vec<String>> {
        Ok(self
            .lock()?
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }
}
