pub mod auth_cmd;
pub mod chat;
pub mod common;
pub mod completions;
pub mod config;
pub mod conversations;
pub mod history;
pub mod posts;
pub mod profile;
pub mod send;
