//! Message model

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Upper bound on outbound message length, in characters.
pub const MAX_MESSAGE_CHARS: usize = 500;

/// Rejections raised before any network call is made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("message must not be empty")]
    Empty,
    #[error("message is {len} characters; the limit is {max}")]
    TooLong { len: usize, max: usize },
    #[error("{0} must not be empty")]
    EmptyIdentifier(&'static str),
    #[error("{0}")]
    InvalidField(&'static str),
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an identifier issued by the backend as-is.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    Err(ValidationError::EmptyIdentifier($label))
                } else {
                    Ok(Self(trimmed.to_string()))
                }
            }
        }
    };
}

string_id!(
    /// Opaque identity of a marketplace user (rider or poster).
    UserId,
    "user id"
);

string_id!(
    /// Identifier of a two-party conversation.
    ConversationId,
    "conversation id"
);

/// Instant assigned by the backend when a message is appended.
///
/// Parsed from RFC 3339 and compared by instant, so `...00Z` and
/// `...00.000Z` denote the same timestamp. Rendered with a `Z` suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    #[must_use]
    pub const fn from_datetime(value: DateTime<Utc>) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Unix timestamp in milliseconds.
    #[must_use]
    pub fn timestamp_millis(&self) -> i64 {
        self.0.timestamp_millis()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }
}

impl FromStr for Timestamp {
    type Err = chrono::ParseError;

    /// RFC 3339, or ISO 8601 without an offset, which is read as UTC.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match DateTime::parse_from_rfc3339(s) {
            Ok(parsed) => Ok(Self(parsed.with_timezone(&Utc))),
            Err(error) => NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                .map(|naive| Self(naive.and_utc()))
                .map_err(|_| error),
        }
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A single authored, timestamped message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub sender_id: UserId,
    pub contents: String,
    #[serde(alias = "timeStamp")]
    pub timestamp: Timestamp,
}

/// Duplicate-suppression key: two messages with equal keys are the same message.
pub type MessageKey<'a> = (Timestamp, &'a str, &'a str);

impl Message {
    pub fn new(sender_id: UserId, contents: impl Into<String>, timestamp: Timestamp) -> Self {
        Self {
            sender_id,
            contents: contents.into(),
            timestamp,
        }
    }

    #[must_use]
    pub fn key(&self) -> MessageKey<'_> {
        (self.timestamp, self.sender_id.as_str(), self.contents.as_str())
    }

    #[must_use]
    pub fn is_from(&self, user: &UserId) -> bool {
        &self.sender_id == user
    }
}

/// Outbound text that passed validation: trimmed, non-empty, within the limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage(String);

impl OutboundMessage {
    pub fn new(raw: &str) -> Result<Self, ValidationError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::Empty);
        }

        let len = trimmed.chars().count();
        if len > MAX_MESSAGE_CHARS {
            return Err(ValidationError::TooLong {
                len,
                max: MAX_MESSAGE_CHARS,
            });
        }

        Ok(Self(trimmed.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}
