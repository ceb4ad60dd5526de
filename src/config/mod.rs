//! Configuration and session storage
//!
//! One TOML file per profile. A profile is an independent sign-in, so two
//! terminals running different profiles against the same store behave like
//! two users with the app open side by side. The store directory itself is
//! shared between profiles unless overridden.

use anyhow::{bail, Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::auth::{Session, SessionStore};

/// Poll interval bounds; configured values outside are clamped.
const MIN_POLL_MS: u64 = 200;
const MAX_POLL_MS: u64 = 10_000;
const DEFAULT_POLL_MS: u64 = 1_000;

/// Application configuration (per profile)
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Signed-in session, if any
    pub session: Option<Session>,
    /// Override for the shared store directory
    pub data_dir: Option<PathBuf>,
    /// Sync watcher poll interval in milliseconds
    pub poll_interval_ms: Option<u64>,
}

impl Config {
    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("com", "palaver", "palaver")
            .context("Could not determine config directory")
    }

    /// Get config file path for a profile
    fn config_path(profile: &str) -> Result<PathBuf> {
        if profile.is_empty() || profile.contains(['/', '\\']) {
            bail!("Invalid profile name: '{profile}'");
        }
        Ok(Self::project_dirs()?
            .config_dir()
            .join(format!("{profile}.toml")))
    }

    /// Load configuration from disk
    pub fn load(profile: &str) -> Result<Self> {
        let path = Self::config_path(profile)?;

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        toml::from_str(&content).context("Failed to parse config file")
    }

    /// Save configuration to disk
    pub fn save(&self, profile: &str) -> Result<()> {
        let path = Self::config_path(profile)?;
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&path, content).context("Failed to write config file")?;

        // Set restrictive permissions on config file (contains the session)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            fs::set_permissions(&path, perms).context("Failed to set config permissions")?;
        }

        Ok(())
    }

    /// Resolve the store root. A command-line override wins over the
    /// configured directory, which wins over the platform default. All
    /// profiles share the default root on purpose.
    pub fn store_root(&self, override_dir: Option<&Path>) -> Result<PathBuf> {
        if let Some(dir) = override_dir {
            return Ok(dir.join("store"));
        }
        if let Some(dir) = &self.data_dir {
            return Ok(dir.join("store"));
        }
        Ok(Self::project_dirs()?.data_dir().join("store"))
    }

    pub fn poll_interval(&self) -> Duration {
        let ms = self
            .poll_interval_ms
            .unwrap_or(DEFAULT_POLL_MS)
            .clamp(MIN_POLL_MS, MAX_POLL_MS);
        Duration::from_millis(ms)
    }
}

impl SessionStore for Config {
    fn get_session(&self) -> Option<Session> {
        self.session.clone()
    }

    fn set_session(&mut self, session: Session) {
        self.session = Some(session);
    }

    fn clear_session(&mut self) {
        self.session = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_interval_default_and_clamp() {
        let mut config = Config::default();
        assert_eq!(config.poll_interval(), Duration::from_millis(1_000));

        config.poll_interval_ms = Some(50);
        assert_eq!(config.poll_interval(), Duration::from_millis(200));

        config.poll_interval_ms = Some(60_000);
        assert_eq!(config.poll_interval(), Duration::from_millis(10_000));

        config.poll_interval_ms = Some(2_500);
        assert_eq!(config.poll_interval(), Duration::from_millis(2_500));
    }

    #[test]
    fn test_store_root_precedence() {
        let config = Config {
            data_dir: Some(PathBuf::from("/tmp/configured")),
            ..Default::default()
        };
        let flag = PathBuf::from("/tmp/flagged");

        let root = config.store_root(Some(&flag)).unwrap();
        assert_eq!(root, PathBuf::from("/tmp/flagged/store"));

        let root = config.store_root(None).unwrap();
        assert_eq!(root, PathBuf::from("/tmp/configured/store"));
    }

    #[test]
    fn test_invalid_profile_name_rejected() {
        assert!(Config::config_path("../evil").is_err());
        assert!(Config::config_path("").is_err());
        assert!(Config::config_path("work").is_ok());
    }

    #[test]
    fn test_config_toml_roundtrip() {
        let config = Config {
            session: Some(Session {
                user_id: "u1".to_string(),
                email: "me@example.com".to_string(),
                logged_in_at: 123,
            }),
            data_dir: None,
            poll_interval_ms: Some(500),
        };
        let text = toml::to_string_pretty(&config).unwrap();
        let back: Config = toml::from_str(&text).unwrap();
        assert_eq!(back.get_session().unwrap().user_id, "u1");
        assert_eq!(back.poll_interval_ms, Some(500));
    }
}
