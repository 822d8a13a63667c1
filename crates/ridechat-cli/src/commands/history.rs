use ridechat_core::cache::{conversation_cache_key, LocalDurableCache};
use ridechat_core::sync::ConversationCache;
use ridechat_core::{ConversationId, UserId};

use crate::commands::common::{format_message_line, parse_conversation_id, CommandContext};
use crate::error::CliError;
use crate::session::load_stored_credentials;

/// Print the durable mirror of a conversation without contacting the backend.
pub fn run_history(
    conversation_id: &str,
    as_json: bool,
    context: &CommandContext,
) -> Result<(), CliError> {
    let conversation_id = parse_conversation_id(conversation_id)?;
    let cache = context.open_cache()?;
    let cached = load_cached_conversation(&cache, &conversation_id)?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(cached.messages())?);
        return Ok(());
    }

    if cached.is_empty() {
        println!("No cached messages for {conversation_id}.");
        return Ok(());
    }

    let me = load_stored_credentials(&context.profile_name)?
        .map(|credentials| credentials.user_id)
        .unwrap_or_else(|| UserId::new(""));
    for message in cached.messages() {
        println!("{}", format_message_line(message, &me));
    }
    Ok(())
}

pub fn load_cached_conversation<C: LocalDurableCache>(
    cache: &C,
    conversation_id: &ConversationId,
) -> Result<ConversationCache, CliError> {
    match cache.get(&conversation_cache_key(conversation_id))? {
        Some(raw) => Ok(ConversationCache::from_json(&raw)?),
        None => Ok(ConversationCache::new()),
    }
}
