use ridechat_core::models::{NewRidePost, RidePost};
use ridechat_core::UserId;

use crate::cli::PostCommands;
use crate::commands::common::{format_timestamp, CommandContext};
use crate::error::CliError;

pub async fn run_posts(command: PostCommands, context: &CommandContext) -> Result<(), CliError> {
    let api = context.api_client()?;
    match command {
        PostCommands::Create {
            name,
            description,
            from,
            from_lat,
            from_lng,
            to,
            to_lat,
            to_lng,
            departure,
            price,
            seats,
        } => {
            let post = NewRidePost {
                name: name.trim().to_string(),
                description: description.trim().to_string(),
                origin_name: from.trim().to_string(),
                origin_lat: from_lat,
                origin_lng: from_lng,
                destination_name: to.trim().to_string(),
                destination_lat: to_lat,
                destination_lng: to_lng,
                departure_date: departure,
                price,
                seats_available: seats,
            };
            match api.save_post(&post).await? {
                Some(id) => println!("{id}"),
                None => println!("Saved ride post '{}'", post.name),
            }
        }
        PostCommands::List { user, json } => {
            let poster = match user {
                Some(user) => user.parse::<UserId>()?,
                None => api.identity().clone(),
            };
            let mut posts = api.list_posts(&poster).await?;
            sort_newest_first(&mut posts);

            if json {
                println!("{}", serde_json::to_string_pretty(&posts)?);
            } else if posts.is_empty() {
                println!("No ride posts from {poster}.");
            } else {
                for post in &posts {
                    println!("{}", format_post_line(post));
                }
            }
        }
    }
    Ok(())
}

/// Newest posts first; posts without a creation time go last.
pub fn sort_newest_first(posts: &mut [RidePost]) {
    posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

pub fn format_post_line(post: &RidePost) -> String {
    format!(
        "{}  {}  {} -> {}  {}  ${:.2}  {} seats",
        post.post_id.as_deref().unwrap_or("-"),
        post.name,
        post.origin_name,
        post.destination_name,
        format_timestamp(post.departure_date),
        post.price,
        post.seats_available
    )
}
