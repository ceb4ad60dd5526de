//! Palaver - local-first terminal chat
//!
//! Every command works against a shared on-disk store; run several
//! profiles against the same store to chat between terminals.

mod api;
mod auth;
mod config;
mod models;
mod store;
mod sync;
mod tui;
mod util;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api::ClientOpts;
use config::Config;
use store::{seed, Store};

#[derive(Parser)]
#[command(name = "palaver")]
#[command(about = "Local-first terminal chat client over a shared on-disk store", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Profile to run as (its own sign-in, shared store)
    #[arg(short, long, global = true, default_value = "default")]
    profile: String,

    /// Override the store directory (shared by everyone chatting)
    #[arg(long, global = true, value_name = "DIR")]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account and sign this profile in
    Register {
        /// Display name
        name: String,
        email: String,
        password: String,
    },

    /// Sign in to an existing account
    Login {
        email: String,
        password: String,
    },

    /// Sign out and mark the account offline
    Logout,

    /// Show session and store status for this profile
    Status,

    /// Show the signed-in user
    Whoami,

    /// List all registered users
    Users,

    /// List your friends
    Friends,

    /// Send a friend request
    Request {
        /// Recipient, by name fragment, email, or id
        user: String,
    },

    /// List pending friend requests
    Requests {
        /// Only show one direction: incoming or outgoing
        #[arg(short, long)]
        direction: Option<String>,
    },

    /// Accept a friend request
    Accept {
        /// Request id (from `requests` output) or sender name
        request: String,
    },

    /// Decline a friend request
    Decline {
        /// Request id (from `requests` output) or sender name
        request: String,
    },

    /// List your chats
    Chats {
        /// Maximum number of chats to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Open (or create) a direct chat with a friend
    Dm {
        /// Friend, by name fragment, email, or id
        user: String,
    },

    /// Create a group chat with friends
    CreateGroup {
        /// Group name
        name: String,
        /// Members, by name fragment, email, or id
        #[arg(required = true)]
        members: Vec<String>,
    },

    /// Read messages from a chat and mark them read
    Read {
        /// Chat id or name fragment
        chat: String,

        /// Maximum number of messages to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Send a message
    Send {
        /// Chat id or name fragment
        #[arg(short, long)]
        to: String,

        /// Message content
        message: String,
    },

    /// Toggle a reaction on a message
    React {
        /// Message id (from `read` output)
        message: String,
        /// Reaction label, e.g. +1
        emoji: String,
    },

    /// Pin or unpin a message
    Pin {
        /// Message id (from `read` output)
        message: String,
    },

    /// Edit one of your messages
    Edit {
        /// Message id (from `read` output)
        message: String,
        /// New content
        content: String,
    },

    /// Forward a message to another chat
    Forward {
        /// Message id (from `read` output)
        message: String,

        /// Destination chat id or name fragment
        #[arg(short, long)]
        to: String,
    },

    /// List pinned messages in a chat
    Pinned {
        /// Chat id or name fragment
        chat: String,
    },

    /// Get or set presence status
    Presence {
        /// New status: online, away, offline
        #[arg(short, long)]
        set: Option<String>,
    },

    /// Populate the store with demo accounts and chats
    Seed {
        /// Reseed even if demo data already exists
        #[arg(long)]
        force: bool,
    },

    /// Watch the store and print changes as they happen
    Watch,

    /// Launch the terminal user interface
    Tui,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| filter.into());

    // The TUI owns the terminal, so its logs go to an in-memory buffer
    // shown on F12 instead of stderr.
    if matches!(cli.command, Commands::Tui) {
        let buffer = tui::LogBuffer::new();
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(buffer.clone()),
            )
            .init();

        let opts = ClientOpts {
            profile: cli.profile,
            data_dir: cli.data_dir,
        };
        return tui::run(&opts, buffer).await;
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let opts = ClientOpts {
        profile: cli.profile.clone(),
        data_dir: cli.data_dir.clone(),
    };

    match cli.command {
        Commands::Register {
            name,
            email,
            password,
        } => {
            auth::register(&cli.profile, cli.data_dir.as_deref(), &name, &email, &password)?;
        }
        Commands::Login { email, password } => {
            auth::login(&cli.profile, cli.data_dir.as_deref(), &email, &password)?;
        }
        Commands::Logout => {
            auth::logout(&cli.profile, cli.data_dir.as_deref())?;
        }
        Commands::Status => {
            auth::status(&cli.profile, cli.data_dir.as_deref())?;
        }
        Commands::Whoami => {
            api::whoami(&opts)?;
        }
        Commands::Users => {
            api::list_users(&opts)?;
        }
        Commands::Friends => {
            api::list_friends(&opts)?;
        }
        Commands::Request { user } => {
            api::send_friend_request(&opts, &user)?;
        }
        Commands::Requests { direction } => {
            api::list_requests(&opts, direction.as_deref())?;
        }
        Commands::Accept { request } => {
            api::accept_friend_request(&opts, &request)?;
        }
        Commands::Decline { request } => {
            api::decline_friend_request(&opts, &request)?;
        }
        Commands::Chats { limit } => {
            api::list_chats(&opts, limit)?;
        }
        Commands::Dm { user } => {
            api::open_direct_chat(&opts, &user)?;
        }
        Commands::CreateGroup { name, members } => {
            api::create_group_chat(&opts, &name, &members)?;
        }
        Commands::Read { chat, limit } => {
            api::read_chat(&opts, &chat, limit)?;
        }
        Commands::Send { to, message } => {
            api::send_message(&opts, &to, &message)?;
        }
        Commands::React { message, emoji } => {
            api::toggle_reaction(&opts, &message, &emoji)?;
        }
        Commands::Pin { message } => {
            api::toggle_pin(&opts, &message)?;
        }
        Commands::Edit { message, content } => {
            api::edit_message(&opts, &message, &content)?;
        }
        Commands::Forward { message, to } => {
            api::forward_message(&opts, &message, &to)?;
        }
        Commands::Pinned { chat } => {
            api::list_pinned(&opts, &chat)?;
        }
        Commands::Presence { set } => {
            api::presence(&opts, set.as_deref())?;
        }
        Commands::Seed { force } => {
            let config = Config::load(&cli.profile)?;
            let root = config.store_root(cli.data_dir.as_deref())?;
            let store = Store::open(root)?;
            if seed::seed(&store, force)? {
                println!("Demo data seeded.");
            } else {
                println!("Store already seeded (use --force to reseed).");
            }
        }
        Commands::Watch => {
            sync::watch(&opts).await?;
        }
        Commands::Tui => unreachable!("handled before logging setup"),
    }

    Ok(())
}
