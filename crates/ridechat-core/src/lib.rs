//! ridechat-core - Core library for ridechat
//!
//! This crate contains the message models, the durable conversation cache,
//! the marketplace backend client, and the conversation sync engine used by
//! every ridechat front end.

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod state;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{ConversationId, Message, Timestamp, UserId};
