use crate::commands::common::{
    format_message_line, parse_conversation_id, resolve_message_content, CommandContext,
};
use crate::error::CliError;

pub async fn run_send(
    conversation_id: &str,
    message: &[String],
    context: &CommandContext,
) -> Result<(), CliError> {
    let conversation_id = parse_conversation_id(conversation_id)?;
    let contents = resolve_message_content(message)?;
    let mut engine = context.open_engine(conversation_id)?;

    if let Err(error) = engine.poll().await {
        tracing::warn!("Sending without a fresh poll: {}", error);
    }
    let report = engine.send_message(&contents).await?;
    if let Some(error) = report.persist_error.as_ref() {
        eprintln!("Warning: {error}");
    }

    println!("{}", format_message_line(&report.message, engine.identity()));
    Ok(())
}
