//! In-process doubles for the remote store and the durable cache.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;

use super::store::{RemoteConversationStore, RemoteError, RemoteResult};
use crate::cache::{CacheError, CacheResult, LocalDurableCache, MemoryCache};
use crate::models::{ConversationId, Message, Timestamp, UserId};

pub fn msg(sender: &str, contents: &str, timestamp: &str) -> Message {
    Message::new(UserId::new(sender), contents, timestamp.parse().unwrap())
}

#[derive(Default)]
struct FakeState {
    log: Vec<Message>,
    overlap: bool,
    next_append_timestamp: Option<Timestamp>,
    fetch_failures: usize,
    fetch_error: Option<RemoteError>,
    fail_appends: bool,
    stall: Option<Duration>,
    fetch_since: Vec<Option<Timestamp>>,
    fetch_calls: usize,
    append_calls: usize,
    appended: Vec<String>,
}

/// Remote store backed by a shared in-memory log.
///
/// By default a fetch returns messages strictly newer than `since`. With
/// overlap enabled it also returns messages at exactly `since`, the way the
/// backend redelivers the boundary message.
#[derive(Clone, Default)]
pub struct FakeRemote {
    state: Arc<Mutex<FakeState>>,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn push_remote(&self, message: Message) {
        self.state().log.push(message);
    }

    pub fn set_overlap(&self, overlap: bool) {
        self.state().overlap = overlap;
    }

    pub fn set_next_append_timestamp(&self, timestamp: &str) {
        self.state().next_append_timestamp = Some(timestamp.parse().unwrap());
    }

    /// Fail the next `count` fetches with a transport error.
    pub fn fail_fetches(&self, count: usize) {
        let mut state = self.state();
        state.fetch_failures = count;
        state.fetch_error = None;
    }

    /// Fail every fetch with `error` until reset with `fail_fetches(0)`.
    pub fn fail_fetches_with(&self, error: RemoteError) {
        let mut state = self.state();
        state.fetch_failures = usize::MAX;
        state.fetch_error = Some(error);
    }

    pub fn fail_appends(&self, fail: bool) {
        self.state().fail_appends = fail;
    }

    pub fn stall_fetches(&self, delay: Duration) {
        self.state().stall = Some(delay);
    }

    pub fn fetch_since_log(&self) -> Vec<Option<Timestamp>> {
        self.state().fetch_since.clone()
    }

    pub fn fetch_calls(&self) -> usize {
        self.state().fetch_calls
    }

    pub fn append_calls(&self) -> usize {
        self.state().append_calls
    }

    pub fn appended_contents(&self) -> Vec<String> {
        self.state().appended.clone()
    }
}

impl RemoteConversationStore for FakeRemote {
    async fn fetch_messages_since(
        &self,
        _conversation_id: &ConversationId,
        since: Option<Timestamp>,
    ) -> RemoteResult<Vec<Message>> {
        let stall = {
            let mut state = self.state();
            state.fetch_calls += 1;
            state.fetch_since.push(since);
            state.stall
        };
        if let Some(delay) = stall {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state();
        if state.fetch_failures > 0 {
            state.fetch_failures = state.fetch_failures.saturating_sub(1);
            return Err(state
                .fetch_error
                .clone()
                .unwrap_or_else(|| RemoteError::Transport("connection refused".into())));
        }

        let overlap = state.overlap;
        Ok(state
            .log
            .iter()
            .filter(|message| match since {
                None => true,
                Some(since) if overlap => message.timestamp >= since,
                Some(since) => message.timestamp > since,
            })
            .cloned()
            .collect())
    }

    async fn append_message(
        &self,
        _conversation_id: &ConversationId,
        sender_id: &UserId,
        contents: &str,
    ) -> RemoteResult<Message> {
        let mut state = self.state();
        state.append_calls += 1;
        if state.fail_appends {
            return Err(RemoteError::Api("Failed to post message".into()));
        }

        let timestamp = state
            .next_append_timestamp
            .take()
            .unwrap_or_else(|| Timestamp::from_datetime(Utc::now()));
        let message = Message::new(sender_id.clone(), contents, timestamp);
        state.log.push(message.clone());
        state.appended.push(contents.to_string());
        Ok(message)
    }
}

/// Durable cache whose writes can be switched to fail.
#[derive(Clone, Default)]
pub struct FailingCache {
    inner: MemoryCache,
    fail_writes: Arc<AtomicBool>,
}

impl FailingCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn stored(&self, key: &str) -> Option<String> {
        self.inner.get(key).unwrap()
    }
}

impl LocalDurableCache for FailingCache {
    fn get(&self, key: &str) -> CacheResult<Option<String>> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> CacheResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(CacheError::Unavailable("disk full".into()));
        }
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> CacheResult<()> {
        self.inner.remove(key)
    }

    fn keys_with_prefix(&self, prefix: &str) -> CacheResult<Vec<String>> {
        self.inner.keys_with_prefix(prefix)
    }
}
