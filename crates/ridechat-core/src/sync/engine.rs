//! Conversation sync engine

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use super::merge::ConversationCache;
use super::store::{RemoteConversationStore, RemoteError, RemoteResult};
use crate::cache::{conversation_cache_key, CacheError, LocalDurableCache};
use crate::models::{ConversationId, Message, OutboundMessage, Timestamp, UserId, ValidationError};
use crate::state::{ConversationSnapshot, EnginePhase};

/// Recoverable failures reported at the engine boundary. None of them stop polling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error("Remote store unavailable: {0}")]
    RemoteUnavailable(String),
    #[error("Invalid message: {0}")]
    Validation(#[from] ValidationError),
    #[error("Failed to persist conversation cache: {0}")]
    Persistence(String),
    #[error("Unexpected response shape: {0}")]
    UnexpectedShape(String),
    #[error("Conversation sync has been shut down")]
    Closed,
}

impl From<RemoteError> for SyncError {
    fn from(value: RemoteError) -> Self {
        match value {
            RemoteError::UnexpectedShape(detail) => Self::UnexpectedShape(detail),
            other => Self::RemoteUnavailable(other.to_string()),
        }
    }
}

impl From<CacheError> for SyncError {
    fn from(value: CacheError) -> Self {
        Self::Persistence(value.to_string())
    }
}

/// Outcome of one successful poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollReport {
    /// Messages returned by the remote store
    pub fetched: usize,
    /// Messages that were not already cached
    pub added: usize,
    /// Durable write failure; the in-memory cache is still updated
    pub persist_error: Option<SyncError>,
}

/// Outcome of one successful send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReport {
    /// The message as stored by the backend
    pub message: Message,
    /// False when an overlapping poll had already merged it
    pub added: bool,
    pub persist_error: Option<SyncError>,
}

/// Keeps a local, durable mirror of one conversation consistent with the remote store.
///
/// The engine is the sole writer of its durable cache entry. Sent messages are
/// merged only from the backend's response, never as a local echo, so the
/// cache never holds a client-side timestamp.
pub struct ConversationSyncEngine<R, C> {
    conversation_id: ConversationId,
    identity: UserId,
    remote: R,
    store: C,
    cache_key: String,
    cache: ConversationCache,
    phase: EnginePhase,
    last_error: Option<SyncError>,
    call_timeout: Option<Duration>,
    /// Set when the durable copy is behind the in-memory cache
    dirty: bool,
    active: Arc<AtomicBool>,
}

impl<R, C> ConversationSyncEngine<R, C>
where
    R: RemoteConversationStore,
    C: LocalDurableCache,
{
    /// Bind an engine to a conversation and load its durable mirror.
    ///
    /// A missing entry starts an empty cache; an unreadable one is logged and
    /// replaced on the next successful merge.
    pub fn open(conversation_id: ConversationId, identity: UserId, remote: R, store: C) -> Self {
        let cache_key = conversation_cache_key(&conversation_id);
        let cache = load_cache(&store, &cache_key);
        tracing::debug!(
            "Opened conversation {} with {} cached messages",
            conversation_id,
            cache.len()
        );

        Self {
            conversation_id,
            identity,
            remote,
            store,
            cache_key,
            cache,
            phase: EnginePhase::Init,
            last_error: None,
            call_timeout: None,
            dirty: false,
            active: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Bound every remote call; an elapsed call counts as the remote being unavailable.
    #[must_use]
    pub const fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    /// Fetch messages newer than the last known timestamp and merge them.
    pub async fn poll(&mut self) -> Result<PollReport, SyncError> {
        self.ensure_active()?;
        self.phase = EnginePhase::Syncing;

        let since = self.cache.last_known_timestamp();
        let result = with_timeout(
            self.call_timeout,
            self.remote.fetch_messages_since(&self.conversation_id, since),
        )
        .await;

        if !self.is_active() {
            tracing::debug!(
                "Discarding poll result for closed conversation {}",
                self.conversation_id
            );
            return Err(SyncError::Closed);
        }
        self.phase = EnginePhase::Idle;

        match result {
            Ok(batch) => {
                let fetched = batch.len();
                let added = self.cache.merge(batch);
                let persist_error = if added > 0 || self.dirty {
                    self.persist().err()
                } else {
                    None
                };
                self.last_error.clone_from(&persist_error);

                if added > 0 {
                    tracing::debug!(
                        "Merged {} new messages into conversation {}",
                        added,
                        self.conversation_id
                    );
                }
                Ok(PollReport {
                    fetched,
                    added,
                    persist_error,
                })
            }
            Err(error) => {
                let error = SyncError::from(error);
                tracing::warn!(
                    "Failed to fetch messages for conversation {}: {}",
                    self.conversation_id,
                    error
                );
                self.last_error = Some(error.clone());
                Err(error)
            }
        }
    }

    /// Append a message remotely and merge the stored copy.
    ///
    /// Contents are trimmed; empty or over-length contents are rejected
    /// without a remote call. On any failure the cache is left untouched.
    pub async fn send_message(&mut self, contents: &str) -> Result<SendReport, SyncError> {
        self.ensure_active()?;
        let outbound = OutboundMessage::new(contents)?;
        self.phase = EnginePhase::Sending;

        let result = with_timeout(
            self.call_timeout,
            self.remote
                .append_message(&self.conversation_id, &self.identity, outbound.as_str()),
        )
        .await;

        if !self.is_active() {
            tracing::debug!(
                "Discarding send result for closed conversation {}",
                self.conversation_id
            );
            return Err(SyncError::Closed);
        }
        self.phase = EnginePhase::Idle;

        match result {
            Ok(message) => {
                let added = self.cache.merge([message.clone()]) == 1;
                let persist_error = if added || self.dirty {
                    self.persist().err()
                } else {
                    None
                };
                self.last_error.clone_from(&persist_error);
                Ok(SendReport {
                    message,
                    added,
                    persist_error,
                })
            }
            Err(error) => {
                let error = SyncError::from(error);
                tracing::warn!(
                    "Failed to send message to conversation {}: {}",
                    self.conversation_id,
                    error
                );
                self.last_error = Some(error.clone());
                Err(error)
            }
        }
    }

    /// Stop accepting work. Remote calls still in flight finish but are not merged.
    pub fn close(&mut self) {
        self.active.store(false, Ordering::SeqCst);
        self.phase = EnginePhase::Closed;
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub(crate) fn activity_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.active)
    }

    pub const fn conversation_id(&self) -> &ConversationId {
        &self.conversation_id
    }

    pub const fn identity(&self) -> &UserId {
        &self.identity
    }

    pub fn messages(&self) -> &[Message] {
        self.cache.messages()
    }

    pub const fn cache(&self) -> &ConversationCache {
        &self.cache
    }

    pub const fn last_known_timestamp(&self) -> Option<Timestamp> {
        self.cache.last_known_timestamp()
    }

    pub const fn phase(&self) -> EnginePhase {
        self.phase
    }

    pub const fn last_error(&self) -> Option<&SyncError> {
        self.last_error.as_ref()
    }

    pub fn snapshot(&self) -> ConversationSnapshot {
        ConversationSnapshot {
            phase: self.phase,
            messages: self.cache.messages().to_vec(),
            last_known_timestamp: self.cache.last_known_timestamp(),
            last_error: self.last_error.as_ref().map(ToString::to_string),
        }
    }

    fn ensure_active(&self) -> Result<(), SyncError> {
        if self.is_active() {
            Ok(())
        } else {
            Err(SyncError::Closed)
        }
    }

    fn persist(&mut self) -> Result<(), SyncError> {
        let result = self
            .cache
            .to_json()
            .map_err(CacheError::from)
            .and_then(|raw| self.store.set(&self.cache_key, &raw));

        match result {
            Ok(()) => {
                self.dirty = false;
                Ok(())
            }
            Err(error) => {
                self.dirty = true;
                tracing::warn!(
                    "Keeping conversation {} in memory only; durable write failed: {}",
                    self.conversation_id,
                    error
                );
                Err(SyncError::from(error))
            }
        }
    }
}

fn load_cache<C: LocalDurableCache>(store: &C, key: &str) -> ConversationCache {
    match store.get(key) {
        Ok(Some(raw)) => ConversationCache::from_json(&raw).unwrap_or_else(|error| {
            tracing::warn!("Ignoring unreadable cache entry {}: {}", key, error);
            ConversationCache::new()
        }),
        Ok(None) => ConversationCache::new(),
        Err(error) => {
            tracing::warn!("Failed to read cache entry {}: {}", key, error);
            ConversationCache::new()
        }
    }
}

async fn with_timeout<T>(
    timeout: Option<Duration>,
    call: impl Future<Output = RemoteResult<T>>,
) -> RemoteResult<T> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, call)
            .await
            .unwrap_or(Err(RemoteError::Timeout(limit))),
        None => call.await,
    }
}
