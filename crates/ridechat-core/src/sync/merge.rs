//! Deduplicating, timestamp-ordered message log

use std::collections::HashSet;

use crate::models::{Message, MessageKey, Timestamp};

/// In-memory mirror of one conversation.
///
/// Invariants: `messages` is sorted ascending by timestamp and holds at most
/// one message per `(timestamp, sender_id, contents)` key;
/// `last_known_timestamp` is the greatest timestamp present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationCache {
    messages: Vec<Message>,
    last_known_timestamp: Option<Timestamp>,
}

impl ConversationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a cache from an arbitrary sequence, restoring the invariants.
    pub fn from_messages(messages: impl IntoIterator<Item = Message>) -> Self {
        let mut cache = Self::new();
        cache.merge(messages);
        cache
    }

    /// Restore a cache from its persisted JSON form.
    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        let messages: Vec<Message> = serde_json::from_str(raw)?;
        Ok(Self::from_messages(messages))
    }

    /// Serialize the ordered message sequence for the durable cache.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.messages)
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub const fn last_known_timestamp(&self) -> Option<Timestamp> {
        self.last_known_timestamp
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Merge a batch into the log and return how many messages were new.
    ///
    /// Messages whose key is already present (or repeated within the batch)
    /// are dropped; survivors are appended after the existing entries and the
    /// whole log is stably re-sorted by timestamp. Merging the same batch
    /// twice leaves the cache unchanged the second time.
    pub fn merge(&mut self, batch: impl IntoIterator<Item = Message>) -> usize {
        let batch: Vec<Message> = batch.into_iter().collect();
        if batch.is_empty() {
            return 0;
        }

        let keep = {
            let mut seen: HashSet<MessageKey<'_>> =
                self.messages.iter().map(Message::key).collect();
            batch
                .iter()
                .map(|message| seen.insert(message.key()))
                .collect::<Vec<bool>>()
        };

        let survivors = batch
            .into_iter()
            .zip(keep)
            .filter_map(|(message, keep)| keep.then_some(message))
            .collect::<Vec<Message>>();

        let added = survivors.len();
        if added == 0 {
            return 0;
        }

        self.messages.extend(survivors);
        self.messages.sort_by_key(|message| message.timestamp);
        self.last_known_timestamp = self.messages.last().map(|message| message.timestamp);
        added
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::models::UserId;

    fn msg(sender: &str, contents: &str, timestamp: &str) -> Message {
        Message::new(UserId::new(sender), contents, timestamp.parse().unwrap())
    }

    fn assert_invariants(cache: &ConversationCache) {
        let messages = cache.messages();
        assert!(messages
            .windows(2)
            .all(|pair| pair[0].timestamp <= pair[1].timestamp));

        let keys = messages.iter().map(Message::key).collect::<HashSet<_>>();
        assert_eq!(keys.len(), messages.len());

        assert_eq!(
            cache.last_known_timestamp(),
            messages.iter().map(|message| message.timestamp).max()
        );
    }

    #[test]
    fn test_merge_into_empty_cache() {
        let mut cache = ConversationCache::new();
        let added = cache.merge(vec![msg("u1", "hi", "2024-01-01T00:00:00Z")]);

        assert_eq!(added, 1);
        assert_eq!(cache.messages(), &[msg("u1", "hi", "2024-01-01T00:00:00Z")]);
        assert_eq!(
            cache.last_known_timestamp().map(|ts| ts.to_string()).as_deref(),
            Some("2024-01-01T00:00:00Z")
        );
    }

    #[test]
    fn test_redelivered_message_is_suppressed() {
        let mut cache = ConversationCache::from_messages(vec![msg("u1", "hi", "2024-01-01T00:00:00Z")]);
        let added = cache.merge(vec![msg("u1", "hi", "2024-01-01T00:00:00Z")]);

        assert_eq!(added, 0);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let base = ConversationCache::from_messages(vec![
            msg("u1", "first", "2024-01-01T00:00:00Z"),
            msg("u2", "second", "2024-01-01T00:01:00Z"),
        ]);
        let batch = vec![
            msg("u2", "third", "2024-01-01T00:03:00Z"),
            msg("u1", "first", "2024-01-01T00:00:00Z"),
            msg("u1", "between", "2024-01-01T00:00:30Z"),
        ];

        let mut once = base.clone();
        once.merge(batch.clone());
        let mut twice = once.clone();
        assert_eq!(twice.merge(batch), 0);

        assert_eq!(once, twice);
        assert_invariants(&once);
    }

    #[test]
    fn test_unordered_batch_is_sorted() {
        let mut cache = ConversationCache::new();
        cache.merge(vec![
            msg("u1", "c", "2024-01-01T00:02:00Z"),
            msg("u1", "a", "2024-01-01T00:00:00Z"),
            msg("u2", "b", "2024-01-01T00:01:00Z"),
        ]);

        let contents = cache
            .messages()
            .iter()
            .map(|message| message.contents.as_str())
            .collect::<Vec<_>>();
        assert_eq!(contents, vec!["a", "b", "c"]);
        assert_invariants(&cache);
    }

    #[test]
    fn test_duplicates_within_one_batch_are_collapsed() {
        let mut cache = ConversationCache::new();
        let added = cache.merge(vec![
            msg("u1", "same", "2024-01-01T00:00:00Z"),
            msg("u1", "same", "2024-01-01T00:00:00.000Z"),
        ]);
        assert_eq!(added, 1);
        assert_invariants(&cache);
    }

    #[test]
    fn test_same_timestamp_different_contents_are_both_kept() {
        let mut cache = ConversationCache::new();
        cache.merge(vec![msg("u1", "one", "2024-01-01T00:00:00Z")]);
        cache.merge(vec![msg("u1", "two", "2024-01-01T00:00:00Z")]);

        let contents = cache
            .messages()
            .iter()
            .map(|message| message.contents.as_str())
            .collect::<Vec<_>>();
        assert_eq!(contents, vec!["one", "two"]);
    }

    #[test]
    fn test_overlapping_batches_commute() {
        let shared = msg("u2", "M", "2024-01-01T00:02:00Z");
        let first = vec![msg("u1", "a", "2024-01-01T00:01:00Z"), shared.clone()];
        let second = vec![shared, msg("u2", "b", "2024-01-01T00:03:00Z")];

        let mut forward = ConversationCache::new();
        forward.merge(first.clone());
        forward.merge(second.clone());

        let mut backward = ConversationCache::new();
        backward.merge(second);
        backward.merge(first);

        assert_eq!(forward, backward);
        assert_eq!(
            forward
                .messages()
                .iter()
                .filter(|message| message.contents == "M")
                .count(),
            1
        );
    }

    #[test]
    fn test_json_accepts_timestamps_without_offset() {
        let raw = r#"[
            {"senderId":"u1","contents":"hi","timestamp":"2024-01-01T00:00:00"},
            {"senderId":"u2","contents":"hello","timeStamp":"2024-01-01T00:01:00Z"}
        ]"#;
        let mut cache = ConversationCache::from_json(raw).unwrap();

        assert_eq!(cache.len(), 2);
        assert_eq!(
            cache.last_known_timestamp().map(|ts| ts.to_string()).as_deref(),
            Some("2024-01-01T00:01:00Z")
        );
        assert_eq!(cache.merge(vec![msg("u1", "hi", "2024-01-01T00:00:00Z")]), 0);
        assert_invariants(&cache);
    }

    #[test]
    fn test_json_restores_invariants() {
        let raw = r#"[
            {"senderId":"u1","contents":"late","timestamp":"2024-01-01T00:05:00Z"},
            {"senderId":"u1","contents":"early","timeStamp":"2024-01-01T00:00:00Z"},
            {"senderId":"u1","contents":"late","timestamp":"2024-01-01T00:05:00Z"}
        ]"#;
        let cache = ConversationCache::from_json(raw).unwrap();
        assert_eq!(cache.len(), 2);
        assert_invariants(&cache);

        let restored = ConversationCache::from_json(&cache.to_json().unwrap()).unwrap();
        assert_eq!(restored, cache);
    }
}
