//! Session storage and password digests

use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Signed-in session, persisted in the profile config
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    pub email: String,
    pub logged_in_at: i64,
}

/// Session store trait for different storage backends
pub trait SessionStore {
    fn get_session(&self) -> Option<Session>;
    fn set_session(&mut self, session: Session);
    fn clear_session(&mut self);
}

/// SHA-256 of the password, base64-encoded. Keeps raw passwords out of the
/// store blob; not a substitute for a real KDF.
pub fn password_digest(password: &str) -> String {
    let digest = Sha256::digest(password.as_bytes());
    base64::engine::general_purpose::STANDARD.encode(digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_digest_known_vector() {
        // SHA-256("password"), base64 of the raw digest bytes.
        assert_eq!(
            password_digest("password"),
            "XohImNooBHFR0OVvjcYpJ3NgPQ1qq73WKhHvch0VQtg="
        );
    }

    #[test]
    fn test_password_digest_differs_per_input() {
        assert_ne!(password_digest("password"), password_digest("passwore"));
        assert_eq!(password_digest("hunter22"), password_digest("hunter22"));
    }
}
