//! Friend request and friendship models

use serde::{Deserialize, Serialize};

/// Lifecycle of a friend request. Resolved rows stay in the store with the
/// status flipped; only pending rows gate new requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FriendRequestStatus {
    Pending,
    Accepted,
    Declined,
}

impl FriendRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FriendRequestStatus::Pending => "pending",
            FriendRequestStatus::Accepted => "accepted",
            FriendRequestStatus::Declined => "declined",
        }
    }
}

/// Friend request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendRequest {
    pub id: String,
    pub from_user_id: String,
    pub to_user_id: String,
    pub status: FriendRequestStatus,
    pub created_at: i64,
}

/// Pairwise relationship record; gates direct chat creation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Friendship {
    pub id: String,
    pub user_a_id: String,
    pub user_b_id: String,
    pub created_at: i64,
}

impl Friendship {
    /// True when this row connects `x` and `y` in either orientation.
    pub fn links(&self, x: &str, y: &str) -> bool {
        (self.user_a_id == x && self.user_b_id == y)
            || (self.user_a_id == y && self.user_b_id == x)
    }

    /// The other end of the friendship, from `me`'s point of view.
    pub fn other(&self, me: &str) -> &str {
        if self.user_a_id == me {
            &self.user_b_id
        } else {
            &self.user_a_id
        }
    }

    pub fn involves(&self, user_id: &str) -> bool {
        self.user_a_id == user_id || self.user_b_id == user_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn friendship(a: &str, b: &str) -> Friendship {
        Friendship {
            id: "f1".to_string(),
            user_a_id: a.to_string(),
            user_b_id: b.to_string(),
            created_at: 0,
        }
    }

    #[test]
    fn test_links_both_orientations() {
        let f = friendship("u1", "u2");
        assert!(f.links("u1", "u2"));
        assert!(f.links("u2", "u1"));
        assert!(!f.links("u1", "u3"));
    }

    #[test]
    fn test_other_end() {
        let f = friendship("u1", "u2");
        assert_eq!(f.other("u1"), "u2");
        assert_eq!(f.other("u2"), "u1");
    }

    #[test]
    fn test_involves() {
        let f = friendship("u1", "u2");
        assert!(f.involves("u1"));
        assert!(f.involves("u2"));
        assert!(!f.involves("u3"));
    }
}
