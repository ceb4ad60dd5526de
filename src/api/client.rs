//! Signed-in client context shared by every operation

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use crate::auth::{Session, SessionStore};
use crate::config::Config;
use crate::models::User;
use crate::store::{keys, seed, Store};

/// Where to find the profile config and the shared store
#[derive(Debug, Clone)]
pub struct ClientOpts {
    pub profile: String,
    pub data_dir: Option<PathBuf>,
}

/// Store handle plus the resolved signed-in user. Commands construct one
/// of these up front so the "not signed in" failure happens before any
/// work.
pub struct ChatClient {
    store: Store,
    user: User,
}

impl ChatClient {
    /// Load the profile config and open the shared store.
    pub fn new(opts: &ClientOpts) -> Result<Self> {
        let config = Config::load(&opts.profile)?;
        let Some(session) = config.get_session() else {
            bail!("Not signed in. Run `palaver login <email> <password>` first.");
        };

        let store = Store::open(config.store_root(opts.data_dir.as_deref())?)?;
        seed::ensure(&store)?;
        Self::with_session(store, session)
    }

    /// Build a client around an already-open store and session.
    pub fn with_session(store: Store, session: Session) -> Result<Self> {
        let users: Vec<User> = store.read(keys::USERS);
        let user = users
            .into_iter()
            .find(|u| u.id == session.user_id)
            .with_context(|| {
                format!(
                    "Account '{}' no longer exists in this store. Run `palaver logout`.",
                    session.email
                )
            })?;

        Ok(Self { store, user })
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn user_id(&self) -> &str {
        &self.user.id
    }

    pub fn current_user(&self) -> &User {
        &self.user
    }
}
