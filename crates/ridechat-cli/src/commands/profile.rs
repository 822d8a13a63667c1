use ridechat_core::models::UserProfile;

use crate::cli::ProfileCommands;
use crate::commands::common::CommandContext;
use crate::config_profiles::normalize_text_option;
use crate::error::CliError;

/// Field changes requested on the command line. `None` leaves a field as it is.
#[derive(Debug, Default)]
pub struct ProfileEdits {
    pub name: Option<String>,
    pub email: Option<String>,
    pub bio: Option<String>,
    pub phone: Option<String>,
}

impl ProfileEdits {
    pub const fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.bio.is_none() && self.phone.is_none()
    }

    /// Apply the edits to a fetched profile. Blank bio or phone clears the field.
    pub fn apply(self, mut profile: UserProfile) -> UserProfile {
        if let Some(name) = self.name {
            profile.name = name.trim().to_string();
        }
        if let Some(email) = self.email {
            profile.email = email.trim().to_string();
        }
        if let Some(bio) = self.bio {
            profile.bio = normalize_text_option(Some(bio));
        }
        if let Some(phone) = self.phone {
            profile.phone = normalize_text_option(Some(phone));
        }
        profile
    }
}

pub fn format_profile_lines(profile: &UserProfile) -> Vec<String> {
    let or_unset = |value: Option<&str>| value.unwrap_or("(not set)").to_string();
    vec![
        format!("name:  {}", profile.name),
        format!("email: {}", profile.email),
        format!("bio:   {}", or_unset(profile.bio.as_deref())),
        format!("phone: {}", or_unset(profile.phone.as_deref())),
    ]
}

pub async fn run_profile(command: ProfileCommands, context: &CommandContext) -> Result<(), CliError> {
    let api = context.api_client()?;
    match command {
        ProfileCommands::Show { json } => {
            let profile = api.get_user().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&profile)?);
            } else {
                for line in format_profile_lines(&profile) {
                    println!("{line}");
                }
            }
        }
        ProfileCommands::Edit {
            name,
            email,
            bio,
            phone,
        } => {
            let edits = ProfileEdits {
                name,
                email,
                bio,
                phone,
            };
            if edits.is_empty() {
                return Err(CliError::Config(
                    "Nothing to change; pass --name, --email, --bio or --phone".to_string(),
                ));
            }

            let updated = edits.apply(api.get_user().await?);
            api.edit_user(&updated).await?;
            tracing::info!("Updated profile for {}", api.identity());

            println!("Profile updated.");
            for line in format_profile_lines(&api.get_user().await?) {
                println!("{line}");
            }
        }
    }
    Ok(())
}
