//! Feature operations over the shared store
//!
//! Each submodule pairs printing command fronts with `*_data` functions
//! that return rows for the TUI. Every operation reads whole blobs from
//! the store and writes them back whole; that read-modify-write cycle is
//! the entire persistence model, so anything here may race against other
//! processes and the last writer wins.

pub mod chats;
pub mod client;
pub mod friends;
pub mod messages;
pub mod users;

pub use chats::{ChatInfo, MessageInfo};
pub use client::{ChatClient, ClientOpts};
pub use friends::{FriendInfo, RequestDirection, RequestInfo};
pub use users::UserInfo;

use anyhow::Result;

/// List registered users
pub fn list_users(opts: &ClientOpts) -> Result<()> {
    users::list_users(opts)
}

/// Show current user info
pub fn whoami(opts: &ClientOpts) -> Result<()> {
    users::whoami(opts)
}

/// Get or set presence status
pub fn presence(opts: &ClientOpts, status: Option<&str>) -> Result<()> {
    match status {
        Some(status) => users::set_presence(opts, status),
        None => users::get_presence(opts),
    }
}

/// Send a friend request by email or user id
pub fn send_friend_request(opts: &ClientOpts, target: &str) -> Result<()> {
    friends::send_friend_request(opts, target)
}

/// List pending friend requests
pub fn list_requests(opts: &ClientOpts, direction: Option<&str>) -> Result<()> {
    friends::list_requests(opts, direction)
}

/// Accept a pending friend request
pub fn accept_friend_request(opts: &ClientOpts, request: &str) -> Result<()> {
    friends::accept_friend_request(opts, request)
}

/// Decline a pending friend request
pub fn decline_friend_request(opts: &ClientOpts, request: &str) -> Result<()> {
    friends::decline_friend_request(opts, request)
}

/// List friends
pub fn list_friends(opts: &ClientOpts) -> Result<()> {
    friends::list_friends(opts)
}

/// List my chats
pub fn list_chats(opts: &ClientOpts, limit: usize) -> Result<()> {
    chats::list_chats(opts, limit)
}

/// Open (or find) a direct chat with a friend
pub fn open_direct_chat(opts: &ClientOpts, target: &str) -> Result<()> {
    chats::open_direct_chat(opts, target)
}

/// Create a group chat
pub fn create_group_chat(opts: &ClientOpts, name: &str, members: &[String]) -> Result<()> {
    chats::create_group_chat(opts, name, members)
}

/// Read a chat's messages and mark it read
pub fn read_chat(opts: &ClientOpts, chat: &str, limit: usize) -> Result<()> {
    chats::read_chat(opts, chat, limit)
}

/// Send a message to a chat
pub fn send_message(opts: &ClientOpts, to: &str, content: &str) -> Result<()> {
    messages::send_message(opts, to, content)
}

/// Toggle a reaction on a message
pub fn toggle_reaction(opts: &ClientOpts, message: &str, emoji: &str) -> Result<()> {
    messages::toggle_reaction(opts, message, emoji)
}

/// Toggle the pin flag on a message
pub fn toggle_pin(opts: &ClientOpts, message: &str) -> Result<()> {
    messages::toggle_pin(opts, message)
}

/// Edit one of my messages
pub fn edit_message(opts: &ClientOpts, message: &str, content: &str) -> Result<()> {
    messages::edit_message(opts, message, content)
}

/// Forward a message to another chat
pub fn forward_message(opts: &ClientOpts, message: &str, to: &str) -> Result<()> {
    messages::forward_message(opts, message, to)
}

/// List pinned messages in a chat
pub fn list_pinned(opts: &ClientOpts, chat: &str) -> Result<()> {
    messages::list_pinned(opts, chat)
}

#[cfg(test)]
pub(crate) mod testutil {
    use tempfile::TempDir;

    use super::client::ChatClient;
    use super::friends::{accept_friend_request_data, send_friend_request_data};
    use crate::auth::{register_user, Session};
    use crate::store::Store;

    /// One shared store with a signed-in client per name. Emails derive
    /// from the lowercased name: "Ada" -> ada@example.com, password
    /// "secret99" everywhere. No demo seed rows.
    pub fn clients_for(names: &[&str]) -> (TempDir, Vec<ChatClient>) {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let clients = names
            .iter()
            .map(|name| {
                let email = format!("{}@example.com", name.to_lowercase());
                let user = register_user(&store, name, &email, "secret99").unwrap();
                let session = Session {
                    user_id: user.id.clone(),
                    email: user.email,
                    logged_in_at: 0,
                };
                ChatClient::with_session(store.clone(), session).unwrap()
            })
            .collect();
        (dir, clients)
    }

    /// Run the full request/accept flow between two clients.
    pub fn befriend(a: &ChatClient, b: &ChatClient) {
        let request = send_friend_request_data(a, b.user_id()).unwrap();
        accept_friend_request_data(b, &request.id).unwrap();
    }
}
