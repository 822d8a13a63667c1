//! Data models for ridechat

mod conversation;
mod message;
mod post;
mod profile;

pub use conversation::{
    find_conversation_with, ConversationPeer, ConversationSummary, LAST_MESSAGE_PREVIEW_CHARS,
};
pub use message::{
    ConversationId, Message, MessageKey, OutboundMessage, Timestamp, UserId, ValidationError,
    MAX_MESSAGE_CHARS,
};
pub use post::{NewRidePost, RidePost};
pub use profile::UserProfile;
