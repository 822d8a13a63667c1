use ridechat_core::models::find_conversation_with;
use ridechat_core::UserId;

use crate::cli::ConversationCommands;
use crate::commands::common::{
    conversation_to_list_item, format_conversation_lines, format_message_line,
    resolve_message_content, CommandContext, ConversationListItem,
};
use crate::error::CliError;

pub async fn run_conversations(
    command: ConversationCommands,
    context: &CommandContext,
) -> Result<(), CliError> {
    match command {
        ConversationCommands::List { json } => run_list(context, json).await,
        ConversationCommands::Start { user, message } => {
            let peer = user.parse::<UserId>()?;
            let contents = resolve_message_content(&message)?;
            run_start(context, &peer, &contents).await
        }
    }
}

async fn run_list(context: &CommandContext, as_json: bool) -> Result<(), CliError> {
    let api = context.api_client()?;
    let conversations = api.list_conversations().await?;

    if as_json {
        let items = conversations
            .iter()
            .map(conversation_to_list_item)
            .collect::<Vec<ConversationListItem>>();
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else if conversations.is_empty() {
        println!("No conversations yet.");
    } else {
        for line in format_conversation_lines(&conversations) {
            println!("{line}");
        }
    }

    Ok(())
}

/// Send into the existing conversation with `peer`, or create one seeded with the message.
async fn run_start(context: &CommandContext, peer: &UserId, contents: &str) -> Result<(), CliError> {
    let api = context.api_client()?;
    let conversations = api.list_conversations().await?;

    if let Some(existing) = find_conversation_with(&conversations, peer) {
        let conversation_id = existing.conversation_id.clone();
        let mut engine = context.open_engine(conversation_id.clone())?;
        if let Err(error) = engine.poll().await {
            tracing::warn!("Continuing without a fresh poll: {}", error);
        }
        let report = engine.send_message(contents).await?;
        println!("{conversation_id}");
        println!("{}", format_message_line(&report.message, engine.identity()));
        return Ok(());
    }

    let conversation_id = api.create_conversation(peer, contents).await?;
    tracing::info!("Started conversation {} with {}", conversation_id, peer);
    println!("{conversation_id}");
    Ok(())
}
