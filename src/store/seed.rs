//! Demo data seeding
//!
//! A fresh store gets a small cast of demo accounts so the app has
//! something to show before anyone registers. Seeding runs once, guarded
//! by a version flag in the meta blob, and uses fixed row ids so a forced
//! re-seed refreshes the demo rows instead of duplicating them.

use serde::{Deserialize, Serialize};

use super::{keys, Store, StoreError};
use crate::auth::session::password_digest;
use crate::models::{
    Chat, ChatType, Friendship, LastMessage, Message, MessageStatus, User, UserStatus,
};
use crate::util::now_ms;

/// Bumped whenever the seed set changes shape.
const SEED_VERSION: u32 = 1;

/// Every demo account signs in with this password.
pub const SEED_PASSWORD: &str = "password";

/// Store metadata blob
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meta {
    #[serde(default)]
    pub seed_version: u32,
}

struct SeedUser {
    id: &'static str,
    name: &'static str,
    email: &'static str,
    status: UserStatus,
    last_seen_mins_ago: i64,
}

const SEED_USERS: [SeedUser; 4] = [
    SeedUser {
        id: "u-sarah",
        name: "Sarah Chen",
        email: "sarah@example.com",
        status: UserStatus::Online,
        last_seen_mins_ago: 0,
    },
    SeedUser {
        id: "u-alex",
        name: "Alex Rivera",
        email: "alex@example.com",
        status: UserStatus::Away,
        last_seen_mins_ago: 25,
    },
    SeedUser {
        id: "u-jordan",
        name: "Jordan Lee",
        email: "jordan@example.com",
        status: UserStatus::Offline,
        last_seen_mins_ago: 60 * 14,
    },
    SeedUser {
        id: "u-priya",
        name: "Priya Patel",
        email: "priya@example.com",
        status: UserStatus::Online,
        last_seen_mins_ago: 2,
    },
];

// Jordan and Priya are deliberately not friends, so the request flow can
// be demoed between seed accounts.
const SEED_FRIEND_PAIRS: [(&str, &str); 5] = [
    ("u-sarah", "u-alex"),
    ("u-sarah", "u-jordan"),
    ("u-sarah", "u-priya"),
    ("u-alex", "u-jordan"),
    ("u-alex", "u-priya"),
];

const GROUP_CHAT_ID: &str = "c-design-crit";

struct SeedMessage {
    id: &'static str,
    sender_id: &'static str,
    content: &'static str,
    mins_ago: i64,
}

const SEED_MESSAGES: [SeedMessage; 3] = [
    SeedMessage {
        id: "m-seed-1",
        sender_id: "u-sarah",
        content: "Pushed the new sidebar mockups, take a look when you can.",
        mins_ago: 45,
    },
    SeedMessage {
        id: "m-seed-2",
        sender_id: "u-alex",
        content: "Nice. The unread badges read much better on dark backgrounds now.",
        mins_ago: 32,
    },
    SeedMessage {
        id: "m-seed-3",
        sender_id: "u-priya",
        content: "Agreed. Can we talk spacing tomorrow morning?",
        mins_ago: 30,
    },
];

/// Seed unless the meta flag says this store is already current.
pub fn ensure(store: &Store) -> Result<bool, StoreError> {
    seed(store, false)
}

/// Merge the demo rows into the store. Returns false when the seed flag is
/// current and `force` is not set. Registered (non-seed) rows are never
/// touched.
pub fn seed(store: &Store, force: bool) -> Result<bool, StoreError> {
    let meta: Meta = store.read(keys::META);
    if meta.seed_version >= SEED_VERSION && !force {
        return Ok(false);
    }

    let now = now_ms();
    let week_ago = now - 7 * 24 * 60 * 60 * 1000;
    let digest = password_digest(SEED_PASSWORD);

    let mut users: Vec<User> = store.read(keys::USERS);
    for s in &SEED_USERS {
        let row = User {
            id: s.id.to_string(),
            name: s.name.to_string(),
            email: s.email.to_string(),
            avatar: User::initials(s.name),
            status: s.status,
            password_digest: digest.clone(),
            created_at: week_ago,
            last_seen_at: now - s.last_seen_mins_ago * 60 * 1000,
        };
        match users.iter_mut().find(|u| u.id == s.id) {
            Some(existing) => *existing = row,
            None => users.push(row),
        }
    }
    store.write(keys::USERS, &users)?;

    let mut friendships: Vec<Friendship> = store.read(keys::FRIENDSHIPS);
    for (a, b) in SEED_FRIEND_PAIRS {
        if !friendships.iter().any(|f| f.links(a, b)) {
            friendships.push(Friendship {
                id: format!("fs-{}-{}", &a[2..], &b[2..]),
                user_a_id: a.to_string(),
                user_b_id: b.to_string(),
                created_at: week_ago,
            });
        }
    }
    store.write(keys::FRIENDSHIPS, &friendships)?;

    let mut messages: Vec<Message> = store.read(keys::MESSAGES);
    for m in &SEED_MESSAGES {
        if messages.iter().any(|existing| existing.id == m.id) {
            continue;
        }
        messages.push(Message {
            id: m.id.to_string(),
            chat_id: GROUP_CHAT_ID.to_string(),
            sender_id: m.sender_id.to_string(),
            content: m.content.to_string(),
            timestamp: now - m.mins_ago * 60 * 1000,
            status: MessageStatus::Delivered,
            reactions: Vec::new(),
            pinned: false,
            edited: false,
            edited_at: None,
            forwarded: false,
        });
    }
    store.write(keys::MESSAGES, &messages)?;

    let mut chats: Vec<Chat> = store.read(keys::CHATS);
    if !chats.iter().any(|c| c.id == GROUP_CHAT_ID) {
        let newest = SEED_MESSAGES.last();
        chats.push(Chat {
            id: GROUP_CHAT_ID.to_string(),
            chat_type: ChatType::Group,
            name: Some("design-crit".to_string()),
            participants: SEED_USERS.iter().map(|s| s.id.to_string()).collect(),
            created_by: "u-sarah".to_string(),
            created_at: week_ago,
            last_message: newest.map(|m| LastMessage {
                sender_id: m.sender_id.to_string(),
                preview: m.content.to_string(),
                timestamp: now - m.mins_ago * 60 * 1000,
            }),
            last_read: Default::default(),
        });
    }
    store.write(keys::CHATS, &chats)?;

    store.write(
        keys::META,
        &Meta {
            seed_version: SEED_VERSION,
        },
    )?;
    tracing::info!("seeded demo data (version {})", SEED_VERSION);
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_temp() -> (TempDir, Store) {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn test_seed_runs_once() {
        let (_dir, store) = open_temp();
        assert!(seed(&store, false).unwrap());
        assert!(!seed(&store, false).unwrap());

        let users: Vec<User> = store.read(keys::USERS);
        assert_eq!(users.len(), 4);
        let chats: Vec<Chat> = store.read(keys::CHATS);
        assert_eq!(chats.len(), 1);
        assert_eq!(chats[0].name.as_deref(), Some("design-crit"));
    }

    #[test]
    fn test_force_reseed_does_not_duplicate() {
        let (_dir, store) = open_temp();
        seed(&store, false).unwrap();
        assert!(seed(&store, true).unwrap());

        let users: Vec<User> = store.read(keys::USERS);
        assert_eq!(users.len(), 4);
        let friendships: Vec<Friendship> = store.read(keys::FRIENDSHIPS);
        assert_eq!(friendships.len(), 5);
        let messages: Vec<Message> = store.read(keys::MESSAGES);
        assert_eq!(messages.len(), 3);
    }

    #[test]
    fn test_reseed_keeps_registered_users() {
        let (_dir, store) = open_temp();
        seed(&store, false).unwrap();

        let mut users: Vec<User> = store.read(keys::USERS);
        users.push(User {
            id: "u-real".to_string(),
            name: "Real Person".to_string(),
            email: "real@example.com".to_string(),
            avatar: "RP".to_string(),
            status: UserStatus::Online,
            password_digest: "x".to_string(),
            created_at: 1,
            last_seen_at: 1,
        });
        store.write(keys::USERS, &users).unwrap();

        seed(&store, true).unwrap();
        let users: Vec<User> = store.read(keys::USERS);
        assert_eq!(users.len(), 5);
        assert!(users.iter().any(|u| u.id == "u-real"));
    }

    #[test]
    fn test_seeded_friend_graph() {
        let (_dir, store) = open_temp();
        seed(&store, false).unwrap();
        let friendships: Vec<Friendship> = store.read(keys::FRIENDSHIPS);
        assert!(friendships.iter().any(|f| f.links("u-sarah", "u-alex")));
        // Left open so the request flow can be demoed.
        assert!(!friendships.iter().any(|f| f.links("u-jordan", "u-priya")));
    }
}
