//! Message-related models

use serde::{Deserialize, Serialize};

/// Delivery state, flipped in place on the stored row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MessageStatus {
    Sent,
    Delivered,
    Read,
}

/// One emoji label with the users who reacted with it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reaction {
    pub emoji: String,
    pub user_ids: Vec<String>,
}

/// Chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub chat_id: String,
    pub sender_id: String,
    pub content: String,
    pub timestamp: i64,
    pub status: MessageStatus,
    #[serde(default)]
    pub reactions: Vec<Reaction>,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default)]
    pub edited: bool,
    #[serde(default)]
    pub edited_at: Option<i64>,
    #[serde(default)]
    pub forwarded: bool,
}

impl Message {
    /// Toggle `user_id` under `emoji`: add when absent, remove when
    /// present. Returns true when the reaction is present afterwards.
    pub fn toggle_reaction(&mut self, emoji: &str, user_id: &str) -> bool {
        let added = match self.reactions.iter_mut().find(|r| r.emoji == emoji) {
            Some(reaction) => {
                if let Some(pos) = reaction.user_ids.iter().position(|u| u == user_id) {
                    reaction.user_ids.remove(pos);
                    false
                } else {
                    reaction.user_ids.push(user_id.to_string());
                    true
                }
            }
            None => {
                self.reactions.push(Reaction {
                    emoji: emoji.to_string(),
                    user_ids: vec![user_id.to_string()],
                });
                true
            }
        };
        // Rows with no users left are dropped, not kept empty.
        self.reactions.retain(|r| !r.user_ids.is_empty());
        added
    }

    /// Total reaction count across all emoji.
    pub fn reaction_count(&self) -> usize {
        self.reactions.iter().map(|r| r.user_ids.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message() -> Message {
        Message {
            id: "m1".to_string(),
            chat_id: "c1".to_string(),
            sender_id: "u1".to_string(),
            content: "hello".to_string(),
            timestamp: 1000,
            status: MessageStatus::Sent,
            reactions: Vec::new(),
            pinned: false,
            edited: false,
            edited_at: None,
            forwarded: false,
        }
    }

    #[test]
    fn test_toggle_reaction_adds_then_removes() {
        let mut msg = message();
        assert!(msg.toggle_reaction("+1", "u2"));
        assert_eq!(msg.reactions.len(), 1);
        assert_eq!(msg.reactions[0].user_ids, vec!["u2"]);

        assert!(!msg.toggle_reaction("+1", "u2"));
        assert!(msg.reactions.is_empty());
    }

    #[test]
    fn test_toggle_reaction_groups_users_under_emoji() {
        let mut msg = message();
        msg.toggle_reaction("+1", "u2");
        msg.toggle_reaction("+1", "u3");
        msg.toggle_reaction("<3", "u2");

        assert_eq!(msg.reactions.len(), 2);
        assert_eq!(msg.reaction_count(), 3);

        // Removing one user keeps the row for the other.
        msg.toggle_reaction("+1", "u2");
        assert_eq!(msg.reactions.len(), 2);
        assert_eq!(msg.reactions[0].user_ids, vec!["u3"]);
    }

    #[test]
    fn test_optional_flags_default_in_old_blobs() {
        let json = r#"{
            "id": "m1",
            "chatId": "c1",
            "senderId": "u1",
            "content": "hi",
            "timestamp": 5,
            "status": "sent"
        }"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert!(!msg.pinned);
        assert!(!msg.edited);
        assert!(!msg.forwarded);
        assert!(msg.reactions.is_empty());
        assert_eq!(msg.edited_at, None);
    }
}
