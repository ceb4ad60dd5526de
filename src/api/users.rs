//! User listing and presence

use anyhow::{bail, Result};

use super::client::{ChatClient, ClientOpts};
use crate::models::{Friendship, User, UserStatus};
use crate::store::keys;
use crate::util::{fmt_ago, fmt_time, now_ms};

/// A user row for display
#[derive(Debug, Clone)]
pub struct UserInfo {
    pub id: String,
    pub name: String,
    pub email: String,
    pub avatar: String,
    pub status: UserStatus,
    pub last_seen_at: i64,
    pub is_friend: bool,
    pub is_self: bool,
}

/// Find a user by id or email.
pub(crate) fn find_user<'a>(users: &'a [User], needle: &str) -> Option<&'a User> {
    users
        .iter()
        .find(|u| u.id == needle || u.email.eq_ignore_ascii_case(needle))
}

/// Display name for a user id; dangling references render as a
/// placeholder instead of failing.
pub(crate) fn display_name(users: &[User], user_id: &str) -> String {
    users
        .iter()
        .find(|u| u.id == user_id)
        .map(|u| u.name.clone())
        .unwrap_or_else(|| "(unknown)".to_string())
}

/// Everyone registered in the store, sorted by name.
pub fn list_users_data(client: &ChatClient) -> Result<Vec<UserInfo>> {
    let users: Vec<User> = client.store().read(keys::USERS);
    let friendships: Vec<Friendship> = client.store().read(keys::FRIENDSHIPS);
    let me = client.user_id();

    let mut rows: Vec<UserInfo> = users
        .into_iter()
        .map(|u| UserInfo {
            is_friend: friendships.iter().any(|f| f.links(me, &u.id)),
            is_self: u.id == me,
            last_seen_at: u.last_seen_at,
            status: u.status,
            avatar: u.avatar,
            email: u.email,
            name: u.name,
            id: u.id,
        })
        .collect();
    rows.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
    Ok(rows)
}

/// The signed-in user's own row.
pub fn whoami_data(client: &ChatClient) -> UserInfo {
    let u = client.current_user().clone();
    UserInfo {
        id: u.id,
        name: u.name,
        email: u.email,
        avatar: u.avatar,
        status: u.status,
        last_seen_at: u.last_seen_at,
        is_friend: false,
        is_self: true,
    }
}

/// Update the signed-in user's presence in the store.
pub fn set_presence_data(client: &ChatClient, status: UserStatus) -> Result<()> {
    let mut users: Vec<User> = client.store().read(keys::USERS);
    let Some(user) = users.iter_mut().find(|u| u.id == client.user_id()) else {
        bail!("Your account is missing from the store. Run `palaver logout`.");
    };
    user.status = status;
    user.last_seen_at = now_ms();
    client.store().write(keys::USERS, &users)?;
    Ok(())
}

/// List registered users (prints to stdout).
pub fn list_users(opts: &ClientOpts) -> Result<()> {
    let client = ChatClient::new(opts)?;
    let users = list_users_data(&client)?;

    println!("\nUsers:");
    println!("{:-<60}", "");
    for u in &users {
        let marker = if u.is_self {
            " (you)"
        } else if u.is_friend {
            " [friend]"
        } else {
            ""
        };
        println!("{:2} [{}] {}{}", u.avatar, u.status.as_str(), u.name, marker);
        println!("   {}  last seen {}", u.email, fmt_ago(u.last_seen_at));
        println!("   ID: {}", u.id);
        println!();
    }
    Ok(())
}

/// Show current user info (prints to stdout).
pub fn whoami(opts: &ClientOpts) -> Result<()> {
    let client = ChatClient::new(opts)?;
    let me = whoami_data(&client);

    println!("Name:    {}", me.name);
    println!("Email:   {}", me.email);
    println!("ID:      {}", me.id);
    println!("Status:  {}", me.status.as_str());
    println!("Joined:  {}", fmt_time(client.current_user().created_at));
    Ok(())
}

/// Show current presence (prints to stdout).
pub fn get_presence(opts: &ClientOpts) -> Result<()> {
    let client = ChatClient::new(opts)?;
    println!("Presence: {}", client.current_user().status.as_str());
    Ok(())
}

/// Set presence (prints to stdout).
pub fn set_presence(opts: &ClientOpts, status: &str) -> Result<()> {
    let Some(status) = UserStatus::parse(status) else {
        bail!("Unknown status '{}'. Use: online, away, offline", status);
    };
    let client = ChatClient::new(opts)?;
    set_presence_data(&client, status)?;
    println!("Presence set to: {}", status.as_str());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testutil::clients_for;
    use crate::models::Friendship;

    #[test]
    fn test_list_users_marks_self_and_friends() {
        let (_dir, clients) = clients_for(&["Ada", "Bob", "Cleo"]);
        let ada = &clients[0];

        let friendship = Friendship {
            id: "f1".to_string(),
            user_a_id: ada.user_id().to_string(),
            user_b_id: clients[1].user_id().to_string(),
            created_at: 0,
        };
        ada.store()
            .write(crate::store::keys::FRIENDSHIPS, &vec![friendship])
            .unwrap();

        let rows = list_users_data(ada).unwrap();
        assert_eq!(rows.len(), 3);
        // Sorted by name.
        assert_eq!(rows[0].name, "Ada");
        assert!(rows[0].is_self);
        assert!(rows[1].is_friend);
        assert!(!rows[2].is_friend);
    }

    #[test]
    fn test_set_presence_updates_store() {
        let (_dir, clients) = clients_for(&["Ada"]);
        set_presence_data(&clients[0], UserStatus::Away).unwrap();

        let users: Vec<User> = clients[0].store().read(keys::USERS);
        assert_eq!(users[0].status, UserStatus::Away);
    }

    #[test]
    fn test_display_name_falls_back() {
        assert_eq!(display_name(&[], "ghost"), "(unknown)");
    }
}
