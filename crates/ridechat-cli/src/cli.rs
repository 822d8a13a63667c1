use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use ridechat_core::Timestamp;

#[derive(Parser)]
#[command(name = "ridechat")]
#[command(about = "Chat with riders and drivers from the command line")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// CLI profile name for endpoint and session configuration
    #[arg(long, global = true, value_name = "NAME")]
    pub profile: Option<String>,

    /// Optional path to the local conversation cache
    #[arg(long, global = true, value_name = "PATH")]
    pub cache_path: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Configure CLI profiles
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Create an account, sign in or sign out
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },
    /// List or start conversations
    #[command(alias = "convos")]
    Conversations {
        #[command(subcommand)]
        command: ConversationCommands,
    },
    /// Show or edit your account profile
    Profile {
        #[command(subcommand)]
        command: ProfileCommands,
    },
    /// Publish or list ride posts
    Posts {
        #[command(subcommand)]
        command: PostCommands,
    },
    /// Open a live chat: new messages are printed, typed lines are sent
    Chat {
        /// Conversation ID
        conversation_id: String,
    },
    /// Send one message to a conversation
    Send {
        /// Conversation ID
        conversation_id: String,
        /// Message text
        #[arg(trailing_var_arg = true)]
        message: Vec<String>,
    },
    /// Print the locally cached messages of a conversation
    History {
        /// Conversation ID
        conversation_id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Initialize or update profile config
    Init {
        /// Profile name to initialize
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
        /// Auth service base URL
        #[arg(long, value_name = "URL")]
        auth_url: Option<String>,
        /// Chat backend base URL
        #[arg(long, value_name = "URL")]
        base_url: Option<String>,
        /// Poll period in milliseconds
        #[arg(long, value_name = "MS")]
        poll_interval_ms: Option<u64>,
        /// Keep current active profile instead of activating this one
        #[arg(long)]
        no_activate: bool,
    },
    /// Print the resolved configuration for a profile
    Show,
}

#[derive(Subcommand)]
pub enum AuthCommands {
    /// Create an account and store the session in the keychain
    Signup {
        /// Display name
        #[arg(long)]
        name: String,
        /// Account email
        #[arg(long, value_name = "EMAIL")]
        email: String,
        /// Account password (at least 8 characters)
        #[arg(long, value_name = "PASSWORD")]
        password: String,
        /// Short bio shown to other riders
        #[arg(long)]
        bio: Option<String>,
        /// 10-digit phone number
        #[arg(long)]
        phone: Option<String>,
    },
    /// Login with email/password and store the session in the keychain
    Login {
        /// Account email
        #[arg(long, value_name = "EMAIL")]
        email: String,
        /// Account password
        #[arg(long, value_name = "PASSWORD")]
        password: String,
    },
    /// Show auth status for profile
    Status,
    /// Logout, clear the stored session and drop cached conversations
    Logout,
}

#[derive(Subcommand)]
pub enum ConversationCommands {
    /// List conversations with the last message of each
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Message a user, reusing an existing conversation with them if there is one
    Start {
        /// User ID of the other participant
        #[arg(long, value_name = "USER_ID")]
        user: String,
        /// First message
        #[arg(trailing_var_arg = true)]
        message: Vec<String>,
    },
}

#[derive(Subcommand)]
pub enum ProfileCommands {
    /// Print the signed-in user's profile
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change profile fields; an empty value clears bio or phone
    Edit {
        /// Display name
        #[arg(long)]
        name: Option<String>,
        /// Account email
        #[arg(long, value_name = "EMAIL")]
        email: Option<String>,
        /// Short bio shown to other riders
        #[arg(long)]
        bio: Option<String>,
        /// 10-digit phone number
        #[arg(long)]
        phone: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum PostCommands {
    /// Offer a ride
    Create {
        /// Post title
        #[arg(long)]
        name: String,
        /// Details for riders
        #[arg(long)]
        description: String,
        /// Pickup place name
        #[arg(long, value_name = "PLACE")]
        from: String,
        #[arg(long, value_name = "LAT", allow_negative_numbers = true)]
        from_lat: f64,
        #[arg(long, value_name = "LNG", allow_negative_numbers = true)]
        from_lng: f64,
        /// Drop-off place name
        #[arg(long, value_name = "PLACE")]
        to: String,
        #[arg(long, value_name = "LAT", allow_negative_numbers = true)]
        to_lat: f64,
        #[arg(long, value_name = "LNG", allow_negative_numbers = true)]
        to_lng: f64,
        /// Departure time, e.g. 2024-11-01T15:00:00Z
        #[arg(long, value_name = "TIME")]
        departure: Timestamp,
        /// Price per seat
        #[arg(long)]
        price: f64,
        /// Seats offered
        #[arg(long)]
        seats: u32,
    },
    /// List ride posts of a user (yourself by default)
    List {
        /// Poster user ID
        #[arg(long, value_name = "USER_ID")]
        user: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
