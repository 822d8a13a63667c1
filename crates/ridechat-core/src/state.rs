//! Shared state types observed by front ends.

use std::fmt;

use crate::models::{Message, Timestamp};

/// Lifecycle phase of a conversation sync engine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EnginePhase {
    /// Constructed and loaded from the durable cache; no poll issued yet.
    #[default]
    Init,
    Syncing,
    Idle,
    Sending,
    /// Torn down; late remote results are discarded.
    Closed,
}

impl fmt::Display for EnginePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Init => "init",
            Self::Syncing => "syncing",
            Self::Idle => "idle",
            Self::Sending => "sending",
            Self::Closed => "closed",
        };
        f.write_str(label)
    }
}

/// Point-in-time view of one conversation, published to the presentation layer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConversationSnapshot {
    pub phase: EnginePhase,
    pub messages: Vec<Message>,
    pub last_known_timestamp: Option<Timestamp>,
    /// Rendered error of the most recent failed poll or send, cleared by the next success.
    pub last_error: Option<String>,
}
