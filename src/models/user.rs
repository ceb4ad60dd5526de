//! User-related models

use serde::{Deserialize, Serialize};

/// Presence status shown next to a user everywhere in the UI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UserStatus {
    Online,
    Away,
    Offline,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Online => "online",
            UserStatus::Away => "away",
            UserStatus::Offline => "offline",
        }
    }

    /// Parse a user-supplied status name.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "online" => Some(UserStatus::Online),
            "away" => Some(UserStatus::Away),
            "offline" => Some(UserStatus::Offline),
            _ => None,
        }
    }
}

/// A registered account
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    /// Initials shown in lists, the stand-in for an avatar image.
    pub avatar: String,
    pub status: UserStatus,
    /// SHA-256 of the password, base64-encoded.
    pub password_digest: String,
    pub created_at: i64,
    pub last_seen_at: i64,
}

impl User {
    /// Up to two initials for the avatar glyph ("Sarah Chen" -> "SC").
    pub fn initials(name: &str) -> String {
        name.split_whitespace()
            .filter_map(|w| w.chars().next())
            .take(2)
            .collect::<String>()
            .to_uppercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initials_two_words() {
        assert_eq!(User::initials("Sarah Chen"), "SC");
    }

    #[test]
    fn test_initials_single_word() {
        assert_eq!(User::initials("sarah"), "S");
    }

    #[test]
    fn test_initials_many_words_takes_two() {
        assert_eq!(User::initials("Ana Maria del Rio"), "AM");
    }

    #[test]
    fn test_initials_empty() {
        assert_eq!(User::initials("   "), "");
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(UserStatus::parse("Online"), Some(UserStatus::Online));
        assert_eq!(UserStatus::parse(" away "), Some(UserStatus::Away));
        assert_eq!(UserStatus::parse("busy"), None);
    }

    #[test]
    fn test_status_serde_camel_case() {
        let json = serde_json::to_string(&UserStatus::Online).unwrap();
        assert_eq!(json, "\"online\"");
        let back: UserStatus = serde_json::from_str("\"away\"").unwrap();
        assert_eq!(back, UserStatus::Away);
    }
}
