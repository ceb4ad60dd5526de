//! Fixed blob keys, one per entity collection

pub const USERS: &str = "users";
pub const CHATS: &str = "chats";
pub const MESSAGES: &str = "messages";
pub const FRIEND_REQUESTS: &str = "friend_requests";
pub const FRIENDSHIPS: &str = "friendships";
pub const TYPING: &str = "typing";
/// Store metadata; currently just the seed flag.
pub const META: &str = "meta";

/// Every key the polling watcher fingerprints.
pub const ALL: [&str; 7] = [
    USERS,
    CHATS,
    MESSAGES,
    FRIEND_REQUESTS,
    FRIENDSHIPS,
    TYPING,
    META,
];
