//! Remote source of truth for conversation messages.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

use crate::models::{ConversationId, Message, Timestamp, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("backend error: {0}")]
    Api(String),
    #[error("unexpected response: {0}")]
    UnexpectedShape(String),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Fallible remote store holding the authoritative message log.
///
/// Latency, retries at the transport level and authentication are the
/// implementation's concern; the sync engine only sees success or a
/// [`RemoteError`].
pub trait RemoteConversationStore {
    /// Messages appended after `since`, or the whole log when `since` is `None`.
    ///
    /// Batches may arrive in any order and may overlap earlier batches.
    fn fetch_messages_since(
        &self,
        conversation_id: &ConversationId,
        since: Option<Timestamp>,
    ) -> impl Future<Output = RemoteResult<Vec<Message>>> + Send;

    /// Append a message and return it as stored, with the backend's timestamp.
    fn append_message(
        &self,
        conversation_id: &ConversationId,
        sender_id: &UserId,
        contents: &str,
    ) -> impl Future<Output = RemoteResult<Message>> + Send;
}
