//! Incremental sync of a remote, append-only conversation log into the durable cache.
//!
//! [`ConversationSyncEngine`] owns one conversation's in-memory mirror and its
//! durable entry. [`spawn_sync`] drives it on a fixed-interval timer and
//! serializes sends with polls on a single task.

mod engine;
mod merge;
mod runner;
mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use engine::{ConversationSyncEngine, PollReport, SendReport, SyncError};
pub use merge::ConversationCache;
pub use runner::{spawn_sync, PollConfig, SyncHandle, DEFAULT_POLL_INTERVAL};
pub use store::{RemoteConversationStore, RemoteError, RemoteResult};
