//! Embedded SQLite-backed durable cache

use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};

use super::{migrations, CacheResult, LocalDurableCache};

/// File-backed cache surviving process restarts.
pub struct SqliteCache {
    conn: Connection,
}

impl SqliteCache {
    /// Open a cache file at the given path, creating it if it doesn't exist
    ///
    /// Runs migrations automatically.
    pub fn open(path: impl AsRef<Path>) -> CacheResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        let cache = Self { conn };
        cache.configure();
        migrations::run(&cache.conn)?;
        tracing::debug!("Opened conversation cache at {}", path.display());
        Ok(cache)
    }

    /// Open an in-memory cache (useful for testing)
    pub fn open_in_memory() -> CacheResult<Self> {
        let conn = Connection::open_in_memory()?;
        let cache = Self { conn };
        migrations::run(&cache.conn)?;
        Ok(cache)
    }

    fn configure(&self) {
        // In-memory and read-only files reject WAL; the cache still works without it
        if let Err(error) = self
            .conn
            .execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;")
        {
            tracing::debug!("Skipping cache pragmas: {}", error);
        }
    }
}

impl LocalDurableCache for SqliteCache {
    fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM kv_entries WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> CacheResult<()> {
        let now = chrono::Utc::now().timestamp_millis();
        self.conn.execute(
            "INSERT INTO kv_entries (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, now],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> CacheResult<()> {
        self.conn
            .execute("DELETE FROM kv_entries WHERE key = ?1", params![key])?;
        Ok(())
    }

    fn keys_with_prefix(&self, prefix: &str) -> CacheResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT key FROM kv_entries WHERE substr(key, 1, length(?1)) = ?1 ORDER BY key",
        )?;
        let keys = stmt
            .query_map(params![prefix], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_set_get_remove() {
        let cache = SqliteCache::open_in_memory().unwrap();
        assert_eq!(cache.get("conversation_a").unwrap(), None);

        cache.set("conversation_a", "[1]").unwrap();
        cache.set("conversation_a", "[1,2]").unwrap();
        assert_eq!(cache.get("conversation_a").unwrap().as_deref(), Some("[1,2]"));

        cache.remove("conversation_a").unwrap();
        assert_eq!(cache.get("conversation_a").unwrap(), None);
    }

    #[test]
    fn test_keys_with_prefix_treats_wildcards_literally() {
        let cache = SqliteCache::open_in_memory().unwrap();
        cache.set("conversation_1", "[]").unwrap();
        cache.set("conversationX2", "[]").unwrap();
        cache.set("other", "[]").unwrap();

        assert_eq!(
            cache.keys_with_prefix("conversation_").unwrap(),
            vec!["conversation_1".to_string()]
        );
    }

    #[test]
    fn test_values_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("cache.db");

        {
            let cache = SqliteCache::open(&path).unwrap();
            cache.set("conversation_a", "persisted").unwrap();
        }

        let reopened = SqliteCache::open(&path).unwrap();
        assert_eq!(
            reopened.get("conversation_a").unwrap().as_deref(),
            Some("persisted")
        );
    }
}
