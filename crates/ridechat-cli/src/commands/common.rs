use std::path::{Path, PathBuf};

use ridechat_core::api::ApiClient;
use ridechat_core::cache::SqliteCache;
use ridechat_core::config::ClientConfig;
use ridechat_core::models::{ConversationSummary, LAST_MESSAGE_PREVIEW_CHARS};
use ridechat_core::sync::ConversationSyncEngine;
use ridechat_core::{ConversationId, Message, Timestamp, UserId};
use serde::Serialize;

use crate::config_profiles::{normalize_text_option, resolve_client_config, CliProfilesConfig};
use crate::error::CliError;
use crate::session::{load_stored_credentials, Credentials};

pub type ChatEngine = ConversationSyncEngine<ApiClient, SqliteCache>;

/// Profile, resolved settings and the collaborators built from them.
pub struct CommandContext {
    pub profile_name: String,
    pub config: ClientConfig,
}

impl CommandContext {
    pub fn load(global_profile: Option<&str>, cache_override: Option<&Path>) -> Result<Self, CliError> {
        let profiles = CliProfilesConfig::load().map_err(CliError::Config)?;
        let profile_name = profiles.resolve_profile_name(global_profile);
        let mut config = resolve_client_config(profiles.profile(&profile_name), |name| {
            std::env::var(name).ok()
        })?;
        if let Some(path) = cache_override {
            config.cache_path = Some(path.to_path_buf());
        }

        Ok(Self {
            profile_name,
            config,
        })
    }

    pub fn cache_path(&self) -> PathBuf {
        self.config
            .cache_path
            .clone()
            .unwrap_or_else(default_cache_path)
    }

    pub fn open_cache(&self) -> Result<SqliteCache, CliError> {
        Ok(SqliteCache::open(self.cache_path())?)
    }

    pub fn credentials(&self) -> Result<Credentials, CliError> {
        load_stored_credentials(&self.profile_name)?
            .ok_or_else(|| CliError::NotSignedIn(self.profile_name.clone()))
    }

    pub fn api_client(&self) -> Result<ApiClient, CliError> {
        let base_url = self.config.require_base_url()?;
        Ok(ApiClient::new(
            base_url,
            self.credentials()?,
            self.config.request_timeout,
        )?)
    }

    pub fn open_engine(&self, conversation_id: ConversationId) -> Result<ChatEngine, CliError> {
        let api = self.api_client()?;
        let identity = api.identity().clone();
        let cache = self.open_cache()?;
        Ok(ConversationSyncEngine::open(conversation_id, identity, api, cache)
            .with_call_timeout(self.config.request_timeout))
    }
}

pub fn default_cache_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ridechat")
        .join("cache.db")
}

pub fn parse_conversation_id(raw: &str) -> Result<ConversationId, CliError> {
    Ok(raw.parse::<ConversationId>()?)
}

/// Join trailing words into one message, rejecting blank input.
pub fn resolve_message_content(parts: &[String]) -> Result<String, CliError> {
    normalize_text_option(Some(parts.join(" "))).ok_or(CliError::EmptyContent)
}

pub fn format_timestamp(timestamp: Timestamp) -> String {
    timestamp
        .as_datetime()
        .format("%Y-%m-%d %H:%M UTC")
        .to_string()
}

pub fn format_message_line(message: &Message, me: &UserId) -> String {
    let author = if message.is_from(me) {
        "you"
    } else {
        message.sender_id.as_str()
    };
    format!(
        "[{}] {}: {}",
        format_timestamp(message.timestamp),
        author,
        message.contents
    )
}

#[derive(Debug, Serialize)]
pub struct ConversationListItem {
    pub conversation_id: String,
    pub peer_id: String,
    pub peer_name: String,
    pub post_id: Option<String>,
    pub last_message: Option<String>,
    pub last_message_at: Option<String>,
}

pub fn conversation_to_list_item(conversation: &ConversationSummary) -> ConversationListItem {
    let last = conversation.last_message();
    ConversationListItem {
        conversation_id: conversation.conversation_id.to_string(),
        peer_id: conversation.user.user_id.to_string(),
        peer_name: conversation.user.name.clone(),
        post_id: conversation.post_id.clone(),
        last_message: last.map(|message| message.contents.clone()),
        last_message_at: last.map(|message| message.timestamp.to_string()),
    }
}

pub fn format_conversation_lines(conversations: &[ConversationSummary]) -> Vec<String> {
    conversations
        .iter()
        .map(|conversation| {
            let preview = conversation
                .last_message_preview(LAST_MESSAGE_PREVIEW_CHARS)
                .unwrap_or_else(|| "(no messages yet)".to_string());
            format!(
                "{}  {}  {}",
                conversation.conversation_id, conversation.user.name, preview
            )
        })
        .collect()
}
