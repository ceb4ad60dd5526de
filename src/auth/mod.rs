//! Account registration and sign-in
//!
//! Accounts live in the shared store next to every other entity; the only
//! per-profile state is the session in the config file. Validation matches
//! what the UI promises: non-empty name, an email with an '@', a password
//! of at least six characters, and one account per email.

pub mod session;

pub use session::{Session, SessionStore};

use std::path::Path;

use anyhow::{bail, Result};

use crate::config::Config;
use crate::models::{User, UserStatus};
use crate::store::{keys, seed, Store};
use crate::util::now_ms;

pub const MIN_PASSWORD_LEN: usize = 6;

/// Validate a password the same way everywhere it is checked.
pub fn validate_password(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        bail!("Password must be at least {} characters", MIN_PASSWORD_LEN);
    }
    Ok(())
}

/// Validate inputs and create an account in the store.
pub fn register_user(store: &Store, name: &str, email: &str, password: &str) -> Result<User> {
    let name = name.trim();
    let email = email.trim().to_lowercase();

    if name.is_empty() {
        bail!("Name cannot be empty");
    }
    if !email.contains('@') {
        bail!("Enter a valid email address");
    }
    validate_password(password)?;

    let mut users: Vec<User> = store.read(keys::USERS);
    if users.iter().any(|u| u.email == email) {
        bail!("An account with this email already exists");
    }

    let now = now_ms();
    let user = User {
        id: uuid::Uuid::new_v4().to_string(),
        name: name.to_string(),
        email,
        avatar: User::initials(name),
        status: UserStatus::Online,
        password_digest: session::password_digest(password),
        created_at: now,
        last_seen_at: now,
    };
    users.push(user.clone());
    store.write(keys::USERS, &users)?;
    tracing::info!("registered account for {}", user.email);
    Ok(user)
}

/// Check credentials and mark the user online. Short passwords fail
/// validation before any lookup; past that, the error is the same for an
/// unknown email and a wrong password.
pub fn login_user(store: &Store, email: &str, password: &str) -> Result<User> {
    let email = email.trim().to_lowercase();
    validate_password(password)?;
    let digest = session::password_digest(password);

    let mut users: Vec<User> = store.read(keys::USERS);
    let Some(user) = users
        .iter_mut()
        .find(|u| u.email == email && u.password_digest == digest)
    else {
        bail!("Invalid email or password");
    };

    user.status = UserStatus::Online;
    user.last_seen_at = now_ms();
    let snapshot = user.clone();
    store.write(keys::USERS, &users)?;
    Ok(snapshot)
}

/// Mark the user offline in the store. Missing users are ignored; the
/// session is being dropped either way.
pub fn logout_user(store: &Store, user_id: &str) -> Result<()> {
    let mut users: Vec<User> = store.read(keys::USERS);
    if let Some(user) = users.iter_mut().find(|u| u.id == user_id) {
        user.status = UserStatus::Offline;
        user.last_seen_at = now_ms();
        store.write(keys::USERS, &users)?;
    }
    Ok(())
}

fn open_store(config: &Config, data_dir: Option<&Path>) -> Result<Store> {
    let store = Store::open(config.store_root(data_dir)?)?;
    seed::ensure(&store)?;
    Ok(store)
}

/// `register` command: create the account and sign this profile in.
pub fn register(
    profile: &str,
    data_dir: Option<&Path>,
    name: &str,
    email: &str,
    password: &str,
) -> Result<()> {
    let mut config = Config::load(profile)?;
    let store = open_store(&config, data_dir)?;

    let user = register_user(&store, name, email, password)?;
    config.set_session(Session {
        user_id: user.id.clone(),
        email: user.email.clone(),
        logged_in_at: now_ms(),
    });
    config.save(profile)?;

    println!("Account created for {} <{}>.", user.name, user.email);
    println!("Signed in on profile '{profile}'.");
    Ok(())
}

/// `login` command: sign in and persist the session for this profile.
pub fn login(profile: &str, data_dir: Option<&Path>, email: &str, password: &str) -> Result<()> {
    let mut config = Config::load(profile)?;
    let store = open_store(&config, data_dir)?;

    let user = login_user(&store, email, password)?;
    config.set_session(Session {
        user_id: user.id.clone(),
        email: user.email.clone(),
        logged_in_at: now_ms(),
    });
    config.save(profile)?;

    println!("Signed in as {} <{}>.", user.name, user.email);
    Ok(())
}

/// `logout` command: clear the session and mark the account offline.
pub fn logout(profile: &str, data_dir: Option<&Path>) -> Result<()> {
    let mut config = Config::load(profile)?;

    if let Some(session) = config.get_session() {
        // Offline marking is best effort; a missing store should not trap
        // the user in a signed-in profile.
        match open_store(&config, data_dir) {
            Ok(store) => logout_user(&store, &session.user_id)?,
            Err(e) => tracing::warn!("could not mark user offline: {}", e),
        }
    }

    config.clear_session();
    config.save(profile)?;
    println!("Logged out.");
    Ok(())
}

/// `status` command: session and store summary for this profile.
pub fn status(profile: &str, data_dir: Option<&Path>) -> Result<()> {
    let config = Config::load(profile)?;

    println!("Profile:  {profile}");
    match config.get_session() {
        Some(session) => {
            println!("Session:  signed in as {}", session.email);
        }
        None => {
            println!("Session:  none (run `palaver login <email> <password>`)");
        }
    }

    let root = config.store_root(data_dir)?;
    println!("Store:    {}", root.display());
    match Store::open(&root) {
        Ok(store) => {
            // The strict read distinguishes a corrupt blob from an empty
            // store, which `status` exists to surface.
            match store.try_read::<Vec<User>>(keys::USERS) {
                Ok(Some(users)) => println!("Accounts: {} registered", users.len()),
                Ok(None) => println!("Accounts: none yet"),
                Err(e) => println!("Accounts: blob unreadable ({e})"),
            }
            let meta: seed::Meta = store.read(keys::META);
            if meta.seed_version > 0 {
                println!("Seeded:   yes (v{})", meta.seed_version);
            } else {
                println!("Seeded:   no");
            }
        }
        Err(e) => {
            println!("Accounts: store unreadable ({e})");
        }
    }
    println!("Polling:  {} ms", config.poll_interval().as_millis());
    Ok(())
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
    fn test_register_then_login() {
        let (_dir, store) = open_temp();
        let user = register_user(&store, "Sarah Chen", "Sarah@Example.com", "secret99").unwrap();
        assert_eq!(user.email, "sarah@example.com");
        assert_eq!(user.avatar, "SC");
        assert_eq!(user.status, UserStatus::Online);

        let back = login_user(&store, "sarah@example.com", "secret99").unwrap();
        assert_eq!(back.id, user.id);
    }

    #[test]
    fn test_register_rejects_short_password() {
        let (_dir, store) = open_temp();
        let err = register_user(&store, "Sarah", "s@example.com", "12345").unwrap_err();
        assert_eq!(err.to_string(), "Password must be at least 6 characters");
        // Exactly six characters passes.
        assert!(register_user(&store, "Sarah", "s@example.com", "123456").is_ok());
    }

    #[test]
    fn test_register_rejects_bad_inputs() {
        let (_dir, store) = open_temp();
        assert!(register_user(&store, "   ", "a@example.com", "secret99").is_err());
        assert!(register_user(&store, "Al", "not-an-email", "secret99").is_err());
    }

    #[test]
    fn test_register_rejects_duplicate_email() {
        let (_dir, store) = open_temp();
        register_user(&store, "Sarah", "s@example.com", "secret99").unwrap();
        let err = register_user(&store, "Other", "S@EXAMPLE.COM", "different1").unwrap_err();
        assert_eq!(err.to_string(), "An account with this email already exists");
    }

    #[test]
    fn test_login_same_error_for_unknown_and_wrong() {
        let (_dir, store) = open_temp();
        register_user(&store, "Sarah", "s@example.com", "secret99").unwrap();

        let unknown = login_user(&store, "nobody@example.com", "secret99").unwrap_err();
        let wrong = login_user(&store, "s@example.com", "nope99").unwrap_err();
        assert_eq!(unknown.to_string(), wrong.to_string());
        assert_eq!(unknown.to_string(), "Invalid email or password");
    }

    #[test]
    fn test_login_short_password_is_a_validation_error() {
        let (_dir, store) = open_temp();
        register_user(&store, "Sarah", "s@example.com", "secret99").unwrap();

        let err = login_user(&store, "s@example.com", "nope").unwrap_err();
        assert_eq!(err.to_string(), "Password must be at least 6 characters");
    }

    #[test]
    fn test_logout_marks_offline() {
        let (_dir, store) = open_temp();
        let user = register_user(&store, "Sarah", "s@example.com", "secret99").unwrap();
        logout_user(&store, &user.id).unwrap();

        let users: Vec<User> = store.read(keys::USERS);
        assert_eq!(users[0].status, UserStatus::Offline);
    }
}
