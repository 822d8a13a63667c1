//! Conversation listing model

use serde::{Deserialize, Serialize};

use super::{ConversationId, Message, UserId};
use crate::util::truncate_with_ellipsis;

/// Preview length used when listing conversations.
pub const LAST_MESSAGE_PREVIEW_CHARS: usize = 50;

/// The other participant of a conversation, as seen by the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationPeer {
    pub user_id: UserId,
    pub name: String,
    #[serde(default, alias = "Profile")]
    pub photo: Option<String>,
}

/// One entry of the conversation listing endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub conversation_id: ConversationId,
    pub user: ConversationPeer,
    /// Ride post the conversation was started from
    #[serde(default)]
    pub post_id: Option<String>,
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl ConversationSummary {
    /// Most recent message by timestamp, regardless of listing order.
    #[must_use]
    pub fn last_message(&self) -> Option<&Message> {
        self.messages.iter().max_by_key(|message| message.timestamp)
    }

    /// Contents of the most recent message, shortened to `max_chars`.
    #[must_use]
    pub fn last_message_preview(&self, max_chars: usize) -> Option<String> {
        self.last_message()
            .map(|message| truncate_with_ellipsis(&message.contents, max_chars))
    }
}

/// Find an existing conversation with `peer`, if the listing contains one.
pub fn find_conversation_with<'a>(
    conversations: &'a [ConversationSummary],
    peer: &UserId,
) -> Option<&'a ConversationSummary> {
    conversations
        .iter()
        .find(|conversation| &conversation.user.user_id == peer)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"
    [
      {
        "conversationId": "ccccc-cccccccccc-ccccc",
        "user": { "userId": "bbbbb", "name": "Bob", "Profile": "url/to/bob.jpg" },
        "postId": "aaaaa-aaaaaaaaaa-aaaaa",
        "messages": [
          { "timeStamp": "2024-10-16T09:55:00Z", "senderId": "me", "contents": "Yes, it's at 3 PM. See you there!" },
          { "timeStamp": "2024-10-16T09:50:00Z", "senderId": "bbbbb", "contents": "Is the meeting still on for today?" }
        ]
      },
      {
        "conversationId": "ddddd",
        "user": { "userId": "ccccc", "name": "Alice", "photo": "url/to/alice.jpg" },
        "messages": []
      }
    ]
    "#;

    fn listing() -> Vec<ConversationSummary> {
        serde_json::from_str(LISTING).unwrap()
    }

    #[test]
    fn test_listing_parses_legacy_fields() {
        let conversations = listing();
        assert_eq!(conversations.len(), 2);
        assert_eq!(
            conversations[0].user.photo.as_deref(),
            Some("url/to/bob.jpg")
        );
        assert_eq!(conversations[1].post_id, None);
    }

    #[test]
    fn test_last_message_uses_latest_timestamp() {
        let conversations = listing();
        let last = conversations[0].last_message().unwrap();
        assert_eq!(last.contents, "Yes, it's at 3 PM. See you there!");
        assert!(conversations[1].last_message().is_none());
    }

    #[test]
    fn test_last_message_preview_truncates() {
        let conversations = listing();
        assert_eq!(
            conversations[0].last_message_preview(10).as_deref(),
            Some("Yes, it's ...")
        );
    }

    #[test]
    fn test_find_conversation_with_peer() {
        let conversations = listing();
        let found = find_conversation_with(&conversations, &UserId::new("ccccc")).unwrap();
        assert_eq!(found.conversation_id.as_str(), "ddddd");
        assert!(find_conversation_with(&conversations, &UserId::new("nobody")).is_none());
    }
}
