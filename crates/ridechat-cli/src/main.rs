//! ridechat CLI - Chat with riders and drivers from the terminal
//!
//! Conversations are mirrored into a local cache so history stays readable offline.

mod cli;
mod commands;
mod config_profiles;
mod error;
mod session;


use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::auth_cmd::run_auth;
use crate::commands::chat::run_chat;
use crate::commands::common::CommandContext;
use crate::commands::completions::run_completions;
use crate::commands::config::run_config;
use crate::commands::conversations::run_conversations;
use crate::commands::history::run_history;
use crate::commands::posts::run_posts;
use crate::commands::profile::run_profile;
use crate::commands::send::run_send;
use crate::error::CliError;

const DEFAULT_LOG_FILTER: &str = "ridechat=info,ridechat_core=info";

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let profile = cli.profile.as_deref();
    let cache_path = cli.cache_path.as_deref();

    match cli.command {
        Commands::Config { command } => run_config(command, profile, cache_path)?,
        Commands::Completions { shell, output } => run_completions(shell, output.as_deref())?,
        Commands::Auth { command } => {
            let context = CommandContext::load(profile, cache_path)?;
            run_auth(command, &context).await?;
        }
        Commands::Conversations { command } => {
            let context = CommandContext::load(profile, cache_path)?;
            run_conversations(command, &context).await?;
        }
        Commands::Profile { command } => {
            let context = CommandContext::load(profile, cache_path)?;
            run_profile(command, &context).await?;
        }
        Commands::Posts { command } => {
            let context = CommandContext::load(profile, cache_path)?;
            run_posts(command, &context).await?;
        }
        Commands::Chat { conversation_id } => {
            let context = CommandContext::load(profile, cache_path)?;
            run_chat(&conversation_id, &context).await?;
        }
        Commands::Send {
            conversation_id,
            message,
        } => {
            let context = CommandContext::load(profile, cache_path)?;
            run_send(&conversation_id, &message, &context).await?;
        }
        Commands::History {
            conversation_id,
            json,
        } => {
            let context = CommandContext::load(profile, cache_path)?;
            run_history(&conversation_id, json, &context)?;
        }
    }

    Ok(())
}
