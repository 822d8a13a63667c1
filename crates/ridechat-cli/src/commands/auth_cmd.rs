use ridechat_core::auth::{AuthClient, SignUpRequest};
use ridechat_core::cache::purge_conversations;

use crate::cli::AuthCommands;
use crate::commands::common::CommandContext;
use crate::config_profiles::normalize_text_option;
use crate::error::CliError;
use crate::session::{
    auth_client, clear_stored_credentials, load_stored_credentials, SessionStore,
};

pub async fn run_auth(command: AuthCommands, context: &CommandContext) -> Result<(), CliError> {
    let profile_name = context.profile_name.as_str();
    match command {
        AuthCommands::Signup {
            name,
            email,
            password,
            bio,
            phone,
        } => {
            let auth = configured_auth_client(context)?;
            let request = SignUpRequest {
                name: name.trim().to_string(),
                email: email.trim().to_string(),
                password,
                bio: normalize_text_option(bio),
                phone: normalize_text_option(phone),
            };
            let credentials = auth.sign_up(&request).await?;
            println!(
                "Created account and signed in profile '{profile_name}' as {}",
                credentials.user_id
            );
            Ok(())
        }
        AuthCommands::Login { email, password } => {
            let auth = configured_auth_client(context)?;
            let credentials = auth.login(&email, &password).await?;
            println!(
                "Signed in profile '{profile_name}' as {}",
                credentials.user_id
            );
            Ok(())
        }
        AuthCommands::Status => {
            if let Some(credentials) = load_stored_credentials(profile_name)? {
                println!(
                    "Profile '{profile_name}' is signed in as {}",
                    credentials.user_id
                );
            } else {
                println!("Profile '{profile_name}' is not signed in.");
            }
            Ok(())
        }
        AuthCommands::Logout => {
            clear_stored_credentials(profile_name)?;
            let cache = context.open_cache()?;
            let purged = purge_conversations(&cache)?;
            println!("Signed out profile '{profile_name}' and removed {purged} cached conversations");
            Ok(())
        }
    }
}

fn configured_auth_client(context: &CommandContext) -> Result<AuthClient<SessionStore>, CliError> {
    auth_client(&context.profile_name, &context.config).map_err(|error| {
        CliError::Config(format!(
            "{error} Run `ridechat config init --auth-url <URL>` or set RIDECHAT_API_AUTH_URL."
        ))
    })
}
