use std::collections::HashSet;

use ridechat_core::sync::spawn_sync;
use ridechat_core::{Message, Timestamp, UserId};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::commands::common::{format_message_line, parse_conversation_id, CommandContext};
use crate::error::CliError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatInput {
    Empty,
    Quit,
    Message(String),
}

impl ChatInput {
    pub fn parse(line: &str) -> Self {
        match line.trim() {
            "" => Self::Empty,
            "/quit" | "/exit" => Self::Quit,
            text => Self::Message(text.to_string()),
        }
    }
}

/// Renders each message once, however many snapshots repeat it.
pub struct MessagePrinter {
    me: UserId,
    printed: HashSet<(Timestamp, String, String)>,
    last_error: Option<String>,
}

impl MessagePrinter {
    pub fn new(me: UserId) -> Self {
        Self {
            me,
            printed: HashSet::new(),
            last_error: None,
        }
    }

    pub fn take_new(&mut self, messages: &[Message]) -> Vec<String> {
        messages
            .iter()
            .filter(|message| {
                self.printed.insert((
                    message.timestamp,
                    message.sender_id.to_string(),
                    message.contents.clone(),
                ))
            })
            .map(|message| format_message_line(message, &self.me))
            .collect()
    }

    /// The error to show, if it differs from the last one shown.
    pub fn error_update(&mut self, error: Option<&str>) -> Option<String> {
        if self.last_error.as_deref() == error {
            return None;
        }
        self.last_error = error.map(ToString::to_string);
        self.last_error.clone()
    }
}

pub async fn run_chat(conversation_id: &str, context: &CommandContext) -> Result<(), CliError> {
    let conversation_id = parse_conversation_id(conversation_id)?;
    let engine = context.open_engine(conversation_id.clone())?;

    let mut printer = MessagePrinter::new(engine.identity().clone());
    for line in printer.take_new(engine.messages()) {
        println!("{line}");
    }

    let handle = spawn_sync(engine, context.config.poll_config());
    let mut snapshots = handle.subscribe();
    let mut input = BufReader::new(tokio::io::stdin()).lines();
    eprintln!("Chatting in {conversation_id}. Type a message and press Enter; /quit to leave.");

    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                for line in printer.take_new(&snapshot.messages) {
                    println!("{line}");
                }
                if let Some(error) = printer.error_update(snapshot.last_error.as_deref()) {
                    eprintln!("Warning: {error}");
                }
            }
            line = input.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                match ChatInput::parse(&line) {
                    ChatInput::Empty => {}
                    ChatInput::Quit => break,
                    ChatInput::Message(text) => match handle.send_message(text).await {
                        Ok(report) => {
                            for line in printer.take_new(std::slice::from_ref(&report.message)) {
                                println!("{line}");
                            }
                        }
                        Err(error) => eprintln!("Error: {error}"),
                    },
                }
            }
        }
    }

    handle.shutdown().await;
    Ok(())
}
