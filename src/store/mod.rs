//! On-disk key-value blob store
//!
//! The stand-in for the browser storage namespace the app's data model was
//! built around: every collection is one JSON array stored whole under a
//! fixed key, and every key maps to one `<key>.json` file under the store
//! root. Writes go through a temp file plus rename, so a concurrent reader
//! sees either the old blob or the new one, never a torn one. That is the
//! entire consistency story: per-key atomicity, last write wins, and
//! read-modify-write cycles between processes can race.

pub mod keys;
pub mod seed;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error on key '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize key '{key}': {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to parse key '{key}': {source}")]
    Deserialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Counter for unique temp file names within one process.
static WRITE_SEQ: AtomicU64 = AtomicU64::new(0);

/// Handle to a store directory. Cheap to clone; all state is on disk.
#[derive(Debug, Clone)]
pub struct Store {
    root: PathBuf,
}

impl Store {
    /// Open (creating if needed) the store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| StoreError::Io {
            key: "<root>".to_string(),
            source: e,
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }

    /// Read a blob, falling back to `T::default()` when the key is missing
    /// or does not parse. A corrupt blob is logged and swallowed so feature
    /// code always gets a usable (possibly empty) collection; the file
    /// itself is left in place for inspection.
    pub fn read<T: DeserializeOwned + Default>(&self, key: &str) -> T {
        match self.try_read(key) {
            Ok(Some(value)) => value,
            Ok(None) => T::default(),
            Err(e) => {
                tracing::warn!("dropping unreadable blob '{}': {}", key, e);
                T::default()
            }
        }
    }

    /// Strict read: Ok(None) for a missing key, Err for an unreadable or
    /// corrupt one.
    pub fn try_read<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        let path = self.path_for(key);
        let raw = match fs::read_to_string(&path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StoreError::Io {
                    key: key.to_string(),
                    source: e,
                })
            }
        };
        let value = serde_json::from_str(&raw).map_err(|e| StoreError::Deserialize {
            key: key.to_string(),
            source: e,
        })?;
        Ok(Some(value))
    }

    /// Replace the blob under `key` atomically: serialize, write a uniquely
    /// named temp file in the store directory, rename over the target.
    pub fn write<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(value).map_err(|e| StoreError::Serialize {
            key: key.to_string(),
            source: e,
        })?;
        // Unique temp name: concurrent writers must not truncate each
        // other's in-flight file.
        let seq = WRITE_SEQ.fetch_add(1, Ordering::Relaxed);
        let tmp = self
            .root
            .join(format!(".{key}.{}.{}.tmp", std::process::id(), seq));
        fs::write(&tmp, json).map_err(|e| StoreError::Io {
            key: key.to_string(),
            source: e,
        })?;
        fs::rename(&tmp, self.path_for(key)).map_err(|e| StoreError::Io {
            key: key.to_string(),
            source: e,
        })?;
        Ok(())
    }

    /// Snapshot of every known key's (size, mtime) for cheap polling.
    pub fn fingerprint(&self) -> Fingerprint {
        let entries = keys::ALL
            .iter()
            .map(|&key| {
                let stamp = fs::metadata(self.path_for(key))
                    .ok()
                    .map(|m| (m.len(), m.modified().unwrap_or(SystemTime::UNIX_EPOCH)));
                (key, stamp)
            })
            .collect();
        Fingerprint { entries }
    }
}

/// Per-key (size, mtime) stamps taken by [`Store::fingerprint`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fingerprint {
    entries: Vec<(&'static str, Option<(u64, SystemTime)>)>,
}

impl Fingerprint {
    /// Keys whose stamp differs from `earlier`. Keys absent from `earlier`
    /// count as changed.
    pub fn changed_keys(&self, earlier: &Fingerprint) -> Vec<&'static str> {
        self.entries
            .iter()
            .filter(|(key, stamp)| {
                earlier
                    .entries
                    .iter()
                    .find(|(k, _)| k == key)
                    .map_or(true, |(_, old)| old != stamp)
            })
            .map(|(key, _)| *key)
            .collect()
    }
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
    fn test_missing_key_reads_default() {
        let (_dir, store) = open_temp();
        let rows: Vec<String> = store.read("users");
        assert!(rows.is_empty());
        assert!(store.try_read::<Vec<String>>("users").unwrap().is_none());
    }

    #[test]
    fn test_write_then_read_roundtrip() {
        let (_dir, store) = open_temp();
        store.write("users", &vec!["a".to_string(), "b".to_string()]).unwrap();
        let rows: Vec<String> = store.read("users");
        assert_eq!(rows, vec!["a", "b"]);
    }

    #[test]
    fn test_corrupt_blob_swallowed_on_read() {
        let (dir, store) = open_temp();
        std::fs::write(dir.path().join("users.json"), "{not json").unwrap();

        let rows: Vec<String> = store.read("users");
        assert!(rows.is_empty());
        // Strict read surfaces the parse error.
        assert!(matches!(
            store.try_read::<Vec<String>>("users"),
            Err(StoreError::Deserialize { .. })
        ));
        // The corrupt file is left on disk untouched.
        let raw = std::fs::read_to_string(dir.path().join("users.json")).unwrap();
        assert_eq!(raw, "{not json");
    }

    #[test]
    fn test_write_replaces_whole_blob() {
        let (_dir, store) = open_temp();
        store.write("chats", &vec![1, 2, 3]).unwrap();
        store.write("chats", &vec![9]).unwrap();
        let rows: Vec<i32> = store.read("chats");
        assert_eq!(rows, vec![9]);
    }

    #[test]
    fn test_write_leaves_no_temp_files() {
        let (dir, store) = open_temp();
        store.write("meta", &42).unwrap();
        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["meta.json"]);
    }

    #[test]
    fn test_fingerprint_detects_writes() {
        let (_dir, store) = open_temp();
        let before = store.fingerprint();
        store.write("messages", &vec!["hi".to_string()]).unwrap();
        let after = store.fingerprint();

        let changed = after.changed_keys(&before);
        assert_eq!(changed, vec![keys::MESSAGES]);
        assert!(after.changed_keys(&after).is_empty());
    }
}
