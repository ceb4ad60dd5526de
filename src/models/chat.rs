//! Chat-related models

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Chat type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChatType {
    Direct,
    Group,
}

/// Denormalized snapshot of the newest message, kept on the chat row so
/// list previews never scan the messages blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastMessage {
    pub sender_id: String,
    pub preview: String,
    pub timestamp: i64,
}

/// A conversation: direct (two participants) or group
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub id: String,
    pub chat_type: ChatType,
    /// Group name; None for direct chats, which render as the other
    /// participant's name.
    pub name: Option<String>,
    pub participants: Vec<String>,
    pub created_by: String,
    pub created_at: i64,
    pub last_message: Option<LastMessage>,
    /// Per-participant timestamp of the newest message they have read.
    #[serde(default)]
    pub last_read: HashMap<String, i64>,
}

impl Chat {
    pub fn is_participant(&self, user_id: &str) -> bool {
        self.participants.iter().any(|p| p == user_id)
    }

    /// For a direct chat, the participant that isn't `me`.
    pub fn other_participant(&self, me: &str) -> Option<&str> {
        if self.chat_type != ChatType::Direct {
            return None;
        }
        self.participants
            .iter()
            .map(String::as_str)
            .find(|p| *p != me)
    }

    /// Newest read timestamp for `user_id`; 0 means never read.
    pub fn read_up_to(&self, user_id: &str) -> i64 {
        self.last_read.get(user_id).copied().unwrap_or(0)
    }
}

/// Ephemeral typing indicator row; live while `updated_at` is fresh
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingEvent {
    pub chat_id: String,
    pub user_id: String,
    pub updated_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn direct(a: &str, b: &str) -> Chat {
        Chat {
            id: "c1".to_string(),
            chat_type: ChatType::Direct,
            name: None,
            participants: vec![a.to_string(), b.to_string()],
            created_by: a.to_string(),
            created_at: 0,
            last_message: None,
            last_read: HashMap::new(),
        }
    }

    #[test]
    fn test_other_participant() {
        let chat = direct("u1", "u2");
        assert_eq!(chat.other_participant("u1"), Some("u2"));
        assert_eq!(chat.other_participant("u2"), Some("u1"));
    }

    #[test]
    fn test_other_participant_none_for_groups() {
        let mut chat = direct("u1", "u2");
        chat.chat_type = ChatType::Group;
        assert_eq!(chat.other_participant("u1"), None);
    }

    #[test]
    fn test_read_up_to_defaults_to_zero() {
        let mut chat = direct("u1", "u2");
        assert_eq!(chat.read_up_to("u1"), 0);
        chat.last_read.insert("u1".to_string(), 42);
        assert_eq!(chat.read_up_to("u1"), 42);
        assert_eq!(chat.read_up_to("u2"), 0);
    }

    #[test]
    fn test_last_read_missing_in_old_blobs() {
        // Rows written before read tracking existed parse with an empty map.
        let json = r#"{
            "id": "c1",
            "chatType": "direct",
            "name": null,
            "participants": ["u1", "u2"],
            "createdBy": "u1",
            "createdAt": 100,
            "lastMessage": null
        }"#;
        let chat: Chat = serde_json::from_str(json).unwrap();
        assert!(chat.last_read.is_empty());
    }
}
