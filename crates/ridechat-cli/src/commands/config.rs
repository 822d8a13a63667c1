use std::path::Path;

use ridechat_core::util::normalize_base_url;

use crate::cli::ConfigCommands;
use crate::commands::common::CommandContext;
use crate::config_profiles::{normalize_text_option, CliProfilesConfig};
use crate::error::CliError;

pub fn run_config(
    command: ConfigCommands,
    global_profile: Option<&str>,
    cache_override: Option<&Path>,
) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            profile,
            auth_url,
            base_url,
            poll_interval_ms,
            no_activate,
        } => run_config_init(
            profile.as_deref().or(global_profile),
            auth_url,
            base_url,
            poll_interval_ms,
            no_activate,
        ),
        ConfigCommands::Show => {
            let context = CommandContext::load(global_profile, cache_override)?;
            run_config_show(&context);
            Ok(())
        }
    }
}

pub fn run_config_init(
    profile_name: Option<&str>,
    auth_url: Option<String>,
    base_url: Option<String>,
    poll_interval_ms: Option<u64>,
    no_activate: bool,
) -> Result<(), CliError> {
    let mut config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(profile_name);

    let auth_url = normalize_profile_url(auth_url, "--auth-url")?;
    let base_url = normalize_profile_url(base_url, "--base-url")?;
    if poll_interval_ms == Some(0) {
        return Err(CliError::Config(
            "--poll-interval-ms must be greater than 0".to_string(),
        ));
    }

    let profile = config.profile_mut_or_default(&profile_name);
    if auth_url.is_some() {
        profile.api_auth_url = auth_url;
    }
    if base_url.is_some() {
        profile.api_base_url = base_url;
    }
    if poll_interval_ms.is_some() {
        profile.poll_interval_ms = poll_interval_ms;
    }

    if profile.api_auth_url.is_none() || profile.api_base_url.is_none() {
        println!(
            "Profile '{profile_name}' is missing endpoints; set --auth-url and --base-url or RIDECHAT_API_AUTH_URL/RIDECHAT_API_BASE_URL."
        );
    }

    if !no_activate {
        config.active_profile = Some(profile_name.clone());
    }

    let path = config.save().map_err(CliError::Config)?;
    println!("Saved profile '{profile_name}' to {}", path.display());
    Ok(())
}

fn run_config_show(context: &CommandContext) {
    let config = &context.config;
    let unset = || "(unset)".to_string();
    println!("profile: {}", context.profile_name);
    println!(
        "auth url: {}",
        config.api_auth_url.clone().unwrap_or_else(unset)
    );
    println!(
        "base url: {}",
        config.api_base_url.clone().unwrap_or_else(unset)
    );
    println!("poll interval: {:?}", config.poll_interval);
    println!(
        "max poll backoff: {}",
        config
            .max_poll_backoff
            .map_or_else(unset, |ceiling| format!("{ceiling:?}"))
    );
    println!("request timeout: {:?}", config.request_timeout);
    println!("cache: {}", context.cache_path().display());
}

pub fn normalize_profile_url(value: Option<String>, flag: &str) -> Result<Option<String>, CliError> {
    let Some(value) = normalize_text_option(value) else {
        return Ok(None);
    };
    normalize_base_url(&value)
        .map(Some)
        .ok_or_else(|| CliError::Config(format!("{flag} must include http:// or https://")))
}
